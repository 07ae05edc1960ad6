#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Transport contracts consumed by the beacon, plus an in-process
//! implementation of all of them.

pub mod error;
pub mod local;
pub mod promise;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use local::{LocalNetwork, LocalNode};
pub use promise::{promise, PendingPromise, PromiseResolver, PromiseState};
pub use transport::{
    BroadcastHandler, ConnectionManager, ReliableBroadcast, RpcEndpoint, RpcTransport,
};
pub use types::MemberAddress;
