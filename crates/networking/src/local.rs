//! An in-process network hub.
//!
//! Every node obtains a [`LocalNode`] handle that implements the transport
//! contracts. Delivery is inline: an RPC is handed to the remote endpoint and
//! its promise resolved before `call_specific_address` returns, and a
//! broadcast is handed to each recipient's handler before `broadcast`
//! returns. Endpoints and handlers are held weakly so that services may own
//! their node handle without forming a cycle.

use crate::error::{Error, Result};
use crate::promise::{promise, PendingPromise, PromiseResolver};
use crate::transport::{
    BroadcastHandler, ConnectionManager, ReliableBroadcast, RpcEndpoint, RpcTransport,
};
use crate::types::MemberAddress;
use beacon_logging::{debug, trace};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Default)]
struct Hub {
    online: BTreeSet<MemberAddress>,
    endpoints: HashMap<MemberAddress, Weak<dyn RpcEndpoint>>,
    handlers: HashMap<MemberAddress, Weak<dyn BroadcastHandler>>,
    cabinets: HashMap<MemberAddress, BTreeSet<MemberAddress>>,
    dialed: HashMap<MemberAddress, BTreeSet<MemberAddress>>,
    unresponsive: HashSet<MemberAddress>,
    parked: Vec<PromiseResolver<Vec<u8>>>,
    requests: HashMap<(MemberAddress, u8), usize>,
}

/// Shared in-process network. Cheap to clone.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl LocalNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring `address` online and return its handle.
    #[must_use]
    pub fn join(&self, address: impl Into<MemberAddress>) -> LocalNode {
        let address = address.into();
        self.hub.lock().online.insert(address.clone());
        debug!("{} joined the local network", address);
        LocalNode {
            address,
            network: self.clone(),
        }
    }

    /// Take `address` offline. Its connections drop and requests to it fail.
    pub fn disconnect(&self, address: &MemberAddress) {
        self.hub.lock().online.remove(address);
    }

    /// Bring a previously disconnected address back online.
    pub fn reconnect(&self, address: &MemberAddress) {
        self.hub.lock().online.insert(address.clone());
    }

    /// Serve RPCs addressed to `address` with `endpoint`.
    pub fn expose<E: RpcEndpoint + 'static>(&self, address: &MemberAddress, endpoint: &Arc<E>) {
        let weak = Arc::downgrade(endpoint);
        let weak: Weak<dyn RpcEndpoint> = weak;
        self.hub.lock().endpoints.insert(address.clone(), weak);
    }

    /// Deliver broadcasts addressed to `address` to `handler`.
    pub fn subscribe<H: BroadcastHandler + 'static>(&self, address: &MemberAddress, handler: &Arc<H>) {
        let weak = Arc::downgrade(handler);
        let weak: Weak<dyn BroadcastHandler> = weak;
        self.hub.lock().handlers.insert(address.clone(), weak);
    }

    /// When set, requests to `address` are accepted but never answered.
    pub fn set_unresponsive(&self, address: &MemberAddress, unresponsive: bool) {
        let mut hub = self.hub.lock();
        if unresponsive {
            hub.unresponsive.insert(address.clone());
        } else {
            hub.unresponsive.remove(address);
        }
    }

    /// Number of `op` requests that were addressed to `address`.
    #[must_use]
    pub fn request_count(&self, address: &MemberAddress, op: u8) -> usize {
        self.hub
            .lock()
            .requests
            .get(&(address.clone(), op))
            .copied()
            .unwrap_or_default()
    }

    fn call(
        &self,
        from: &MemberAddress,
        to: &MemberAddress,
        op: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> PendingPromise<Vec<u8>> {
        let (pending, resolver) = promise(timeout);

        let endpoint = {
            let mut hub = self.hub.lock();
            *hub.requests.entry((to.clone(), op)).or_default() += 1;
            hub.parked.retain(|r| !r.is_abandoned());

            if !hub.online.contains(from) || !hub.online.contains(to) {
                None
            } else if hub.unresponsive.contains(to) {
                trace!("Parking op {} from {} to unresponsive {}", op, from, to);
                hub.parked.push(resolver);
                return pending;
            } else {
                hub.endpoints.get(to).and_then(Weak::upgrade)
            }
        };

        match endpoint {
            Some(endpoint) => match endpoint.handle(from, op, payload) {
                Ok(response) => {
                    resolver.fulfill(response);
                }
                Err(e) => {
                    resolver.fail(e.to_string());
                }
            },
            None => {
                resolver.fail(Error::Unreachable(to.clone()).to_string());
            }
        }

        pending
    }

    fn broadcast_from(&self, from: &MemberAddress, payload: &[u8]) -> Result<()> {
        let recipients: Vec<(MemberAddress, Arc<dyn BroadcastHandler>)> = {
            let hub = self.hub.lock();
            if !hub.online.contains(from) {
                return Err(Error::Unreachable(from.clone()));
            }
            let Some(cabinet) = hub.cabinets.get(from) else {
                return Err(Error::UnknownPeer(from.clone()));
            };
            cabinet
                .iter()
                .filter(|member| *member != from && hub.online.contains(*member))
                .filter_map(|member| {
                    hub.handlers
                        .get(member)
                        .and_then(Weak::upgrade)
                        .map(|handler| (member.clone(), handler))
                })
                .collect()
        };

        for (member, handler) in recipients {
            trace!("Delivering broadcast from {} to {}", from, member);
            handler.on_broadcast(from, payload);
        }

        Ok(())
    }
}

/// One node's view of a [`LocalNetwork`].
#[derive(Clone)]
pub struct LocalNode {
    address: MemberAddress,
    network: LocalNetwork,
}

impl LocalNode {
    #[must_use]
    pub fn address(&self) -> &MemberAddress {
        &self.address
    }

    #[must_use]
    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }
}

impl RpcTransport for LocalNode {
    fn call_specific_address(
        &self,
        address: &MemberAddress,
        op: u8,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> PendingPromise<Vec<u8>> {
        self.network
            .call(&self.address, address, op, &payload, timeout)
    }
}

impl ReliableBroadcast for LocalNode {
    fn broadcast(&self, payload: Vec<u8>) -> Result<()> {
        self.network.broadcast_from(&self.address, &payload)
    }

    fn reset_cabinet(&self, members: BTreeSet<MemberAddress>) {
        self.network
            .hub
            .lock()
            .cabinets
            .insert(self.address.clone(), members);
    }
}

impl ConnectionManager for LocalNode {
    fn connect(&self, peers: &BTreeSet<MemberAddress>) {
        let mut hub = self.network.hub.lock();
        let dialed = hub.dialed.entry(self.address.clone()).or_default();
        dialed.extend(peers.iter().filter(|p| **p != self.address).cloned());
    }

    fn direct_connections(&self) -> BTreeSet<MemberAddress> {
        let hub = self.network.hub.lock();
        if !hub.online.contains(&self.address) {
            return BTreeSet::new();
        }

        let empty = BTreeSet::new();
        let mine = hub.dialed.get(&self.address).unwrap_or(&empty);
        hub.online
            .iter()
            .filter(|peer| **peer != self.address)
            .filter(|peer| {
                mine.contains(*peer)
                    || hub
                        .dialed
                        .get(*peer)
                        .is_some_and(|theirs| theirs.contains(&self.address))
            })
            .cloned()
            .collect()
    }
}
