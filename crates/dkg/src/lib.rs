#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! A threshold-BLS entropy beacon.
//!
//! A static dealer hands every cabinet member a share of one group key. Each
//! round, members sign the previous round's entropy with their share; any
//! `t` valid shares recover the group signature, whose hash is the next
//! entropy value.

pub mod cabinet;
pub mod entropy;
pub mod error;
pub mod node;
pub mod pre_dkg;
pub mod round;
pub mod rpc;
pub mod service;

#[cfg(test)]
mod tests;

pub use cabinet::{derive_member_id, Cabinet, CabinetError, CabinetMember};
pub use entropy::{EntropyError, EntropyGenerator};
pub use error::{Error, Result};
pub use node::{run_beacon, LocalBeaconNode};
pub use pre_dkg::{GateError, PreDkgGate};
pub use round::{Entropy, Round, RoundError, RoundStore, GENESIS_PAYLOAD};
pub use rpc::{BeaconRpc, RpcError, RpcHandlerTable, RpcOp, SignatureSubmission};
pub use service::{BeaconAlarm, BeaconService, BeaconState, Transition, Wake};
