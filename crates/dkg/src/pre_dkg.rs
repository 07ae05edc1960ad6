//! Connectivity gate run before key distribution.
//!
//! Every member opens direct connections to every other member, then
//! broadcasts the set of peers it is connected to. The gate is ready once
//! this node has sent its own announcement and accepted exactly one
//! acknowledgement from every other member.

use beacon_config::BeaconSettings;
use beacon_logging::{debug, info, warn};
use beacon_networking::{
    types::{deserialize, serialize},
    BroadcastHandler, ConnectionManager, MemberAddress, ReliableBroadcast,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Announcement from unknown peer {0}")]
    UnknownPeer(MemberAddress),
    #[error("{from} announced connections outside the cabinet: {unknown:?}")]
    UnrecognizedConnections {
        from: MemberAddress,
        unknown: Vec<MemberAddress>,
    },
    #[error("Duplicate acknowledgement from {0}")]
    DuplicateAcknowledgement(MemberAddress),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Timed out connecting: {connected} of {expected} peers")]
    ConnectTimeout { connected: usize, expected: usize },
    #[error("Broadcast failed: {0}")]
    Broadcast(String),
}

#[derive(Debug, Default)]
struct GateState {
    peers: BTreeSet<MemberAddress>,
    acknowledged: BTreeSet<MemberAddress>,
    sent: bool,
}

impl GateState {
    fn others<'a>(&'a self, me: &'a MemberAddress) -> impl Iterator<Item = &'a MemberAddress> {
        self.peers.iter().filter(move |peer| *peer != me)
    }

    fn is_ready(&self, me: &MemberAddress) -> bool {
        self.sent && self.others(me).all(|peer| self.acknowledged.contains(peer))
    }
}

pub struct PreDkgGate<N> {
    address: MemberAddress,
    network: N,
    state: Mutex<GateState>,
    poll_interval: Duration,
    max_polls: u32,
    changed: Notify,
}

impl<N: ReliableBroadcast + ConnectionManager> PreDkgGate<N> {
    pub fn new(network: N, settings: &BeaconSettings) -> Self {
        let gate = Self {
            address: settings.address.clone(),
            network,
            state: Mutex::new(GateState::default()),
            poll_interval: settings.connect_poll_interval,
            max_polls: settings.connect_max_polls,
            changed: Notify::new(),
        };
        gate.reset_cabinet(settings.cabinet.clone());
        gate
    }

    #[must_use]
    pub fn address(&self) -> &MemberAddress {
        &self.address
    }

    /// Replace the working peer set and start over.
    pub fn reset_cabinet(&self, peers: BTreeSet<MemberAddress>) {
        {
            let mut state = self.state.lock();
            state.peers.clone_from(&peers);
            state.acknowledged.clear();
            state.sent = false;
        }
        self.network.reset_cabinet(peers);
    }

    #[must_use]
    pub fn peers(&self) -> BTreeSet<MemberAddress> {
        self.state.lock().peers.clone()
    }

    /// Open connections to every peer, wait until all of them are up, then
    /// announce the observed connection set to the cabinet.
    pub async fn connect(&self) -> Result<(), GateError> {
        let others: BTreeSet<MemberAddress> = {
            let state = self.state.lock();
            state.others(&self.address).cloned().collect()
        };
        let expected = others.len();
        self.network.connect(&others);

        let mut polls = 0;
        let observed = loop {
            let observed = self.network.direct_connections();
            let connected = observed.intersection(&others).count();
            if connected >= expected {
                break observed;
            }

            polls += 1;
            if polls >= self.max_polls {
                warn!(
                    "{} gave up connecting after {} polls ({}/{})",
                    self.address, polls, connected, expected
                );
                return Err(GateError::ConnectTimeout {
                    connected,
                    expected,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        let payload = serialize(&observed).map_err(|e| GateError::Codec(e.to_string()))?;
        self.network
            .broadcast(payload)
            .map_err(|e| GateError::Broadcast(e.to_string()))?;

        self.state.lock().sent = true;
        debug!("{} announced {} connections", self.address, observed.len());
        self.changed.notify_waiters();
        Ok(())
    }

    /// Non-blocking readiness check.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.state.lock().is_ready(&self.address)
    }

    /// Accept or reject one connection announcement.
    pub fn handle_broadcast(&self, from: &MemberAddress, payload: &[u8]) -> Result<(), GateError> {
        let announced: BTreeSet<MemberAddress> =
            deserialize(payload).map_err(|e| GateError::Codec(e.to_string()))?;

        let ready = {
            let mut state = self.state.lock();
            if *from == self.address || !state.peers.contains(from) {
                return Err(GateError::UnknownPeer(from.clone()));
            }

            let unknown: Vec<MemberAddress> =
                announced.difference(&state.peers).cloned().collect();
            if !unknown.is_empty() {
                return Err(GateError::UnrecognizedConnections {
                    from: from.clone(),
                    unknown,
                });
            }

            if !state.acknowledged.insert(from.clone()) {
                return Err(GateError::DuplicateAcknowledgement(from.clone()));
            }
            state.is_ready(&self.address)
        };

        debug!("{} accepted acknowledgement from {}", self.address, from);
        if ready {
            info!("{} is ready", self.address);
        }
        self.changed.notify_waiters();
        Ok(())
    }

    /// Wait for [`Self::ready`], giving up after `timeout`.
    pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let changed = self.changed.notified();
                if self.ready() {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl<N: ReliableBroadcast + ConnectionManager> BroadcastHandler for PreDkgGate<N> {
    fn on_broadcast(&self, from: &MemberAddress, payload: &[u8]) {
        if let Err(e) = self.handle_broadcast(from, payload) {
            warn!("{} dropped announcement: {}", self.address, e);
        }
    }
}
