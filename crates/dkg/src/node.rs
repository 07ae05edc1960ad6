use crate::error::{Error, Result};
use crate::pre_dkg::PreDkgGate;
use crate::rpc::RpcHandlerTable;
use crate::service::BeaconService;
use beacon_config::BeaconSettings;
use beacon_logging::info;
use beacon_networking::{
    ConnectionManager, LocalNetwork, LocalNode, ReliableBroadcast, RpcTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bring the cabinet up, then produce entropy until `shutdown` fires.
pub async fn run_beacon<N, T>(
    gate: &PreDkgGate<N>,
    service: &BeaconService<T>,
    ready_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<()>
where
    N: ReliableBroadcast + ConnectionManager,
    T: RpcTransport,
{
    gate.connect().await?;
    if !gate.wait_until_ready(ready_timeout).await {
        return Err(Error::ReadinessTimeout(ready_timeout));
    }

    info!("{} cabinet ready", gate.address());
    service.run(shutdown).await;
    Ok(())
}

/// A beacon node wired onto a [`LocalNetwork`].
pub struct LocalBeaconNode {
    pub gate: Arc<PreDkgGate<LocalNode>>,
    pub service: Arc<BeaconService<LocalNode>>,
    rpc: Arc<RpcHandlerTable<BeaconService<LocalNode>>>,
}

impl LocalBeaconNode {
    /// Join `network` as `settings.address`, subscribe the readiness gate to
    /// broadcasts and expose the RPC table.
    pub fn join(network: &LocalNetwork, settings: BeaconSettings) -> Result<Self> {
        let node = network.join(settings.address.clone());

        let gate = Arc::new(PreDkgGate::new(node.clone(), &settings));
        network.subscribe(&settings.address, &gate);

        let address = settings.address.clone();
        let service = Arc::new(BeaconService::new(settings, node)?);
        let rpc = Arc::new(RpcHandlerTable::new(Arc::clone(&service)));
        network.expose(&address, &rpc);

        Ok(Self { gate, service, rpc })
    }

    #[must_use]
    pub fn rpc(&self) -> &Arc<RpcHandlerTable<BeaconService<LocalNode>>> {
        &self.rpc
    }

    pub async fn run(&self, ready_timeout: Duration, shutdown: CancellationToken) -> Result<()> {
        run_beacon(&self.gate, &self.service, ready_timeout, shutdown).await
    }
}
