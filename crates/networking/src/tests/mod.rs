use crate::{BroadcastHandler, LocalNetwork, MemberAddress, Result, RpcEndpoint};
use parking_lot::Mutex;
use std::collections::BTreeSet;

mod local_network;

fn init_tracing() {
    beacon_logging::setup_log();
}

fn addr(s: &str) -> MemberAddress {
    MemberAddress::new(s)
}

fn cabinet(addresses: &[&str]) -> BTreeSet<MemberAddress> {
    addresses.iter().map(|a| addr(a)).collect()
}

/// Endpoint that echoes the payload back with the op code prepended.
struct EchoEndpoint;

impl RpcEndpoint for EchoEndpoint {
    fn handle(&self, _from: &MemberAddress, op: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let mut response = vec![op];
        response.extend_from_slice(payload);
        Ok(response)
    }
}

/// Endpoint that always fails.
struct FailingEndpoint;

impl RpcEndpoint for FailingEndpoint {
    fn handle(&self, _from: &MemberAddress, _op: u8, _payload: &[u8]) -> Result<Vec<u8>> {
        Err(crate::Error::Other("rejected".to_string()))
    }
}

/// Broadcast handler recording every delivery.
#[derive(Default)]
struct Recorder {
    received: Mutex<Vec<(MemberAddress, Vec<u8>)>>,
}

impl BroadcastHandler for Recorder {
    fn on_broadcast(&self, from: &MemberAddress, payload: &[u8]) {
        self.received.lock().push((from.clone(), payload.to_vec()));
    }
}

fn network_with(addresses: &[&str]) -> (LocalNetwork, Vec<crate::LocalNode>) {
    init_tracing();
    let network = LocalNetwork::new();
    let nodes = addresses.iter().map(|a| network.join(*a)).collect();
    (network, nodes)
}
