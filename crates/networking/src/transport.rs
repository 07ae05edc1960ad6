//! Contracts the beacon expects from the surrounding network stack.

use crate::error::Result;
use crate::promise::PendingPromise;
use crate::types::MemberAddress;
use std::collections::BTreeSet;
use std::time::Duration;

/// Client side of the request/response transport.
pub trait RpcTransport: Send + Sync {
    /// Issue `op` with an encoded `payload` to one peer. Never blocks; the
    /// returned promise settles later (or times out after `timeout`).
    fn call_specific_address(
        &self,
        address: &MemberAddress,
        op: u8,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> PendingPromise<Vec<u8>>;
}

/// Server side of the request/response transport.
pub trait RpcEndpoint: Send + Sync {
    /// Handle one request from `from`, returning the encoded response.
    fn handle(&self, from: &MemberAddress, op: u8, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Cabinet-scoped reliable broadcast with sender authentication.
pub trait ReliableBroadcast: Send + Sync {
    /// Deliver `payload` at least once to every other cabinet member.
    fn broadcast(&self, payload: Vec<u8>) -> Result<()>;

    /// Replace the set of members this channel delivers to.
    fn reset_cabinet(&self, members: BTreeSet<MemberAddress>);
}

/// Receiver of broadcast deliveries. May be invoked from any thread.
pub trait BroadcastHandler: Send + Sync {
    fn on_broadcast(&self, from: &MemberAddress, payload: &[u8]);
}

/// Direct peer connectivity.
pub trait ConnectionManager: Send + Sync {
    /// Open (or keep open) connections to every address in `peers`.
    fn connect(&self, peers: &BTreeSet<MemberAddress>);

    /// Peers this node currently holds a direct connection with.
    fn direct_connections(&self) -> BTreeSet<MemberAddress>;
}
