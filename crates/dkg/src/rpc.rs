//! The beacon's request/response surface.
//!
//! Requests and responses are bincode-encoded structs. Each [`RpcOp`] maps to
//! one typed handler over [`BeaconRpc`]; the table is fixed at construction.

use beacon_crypto::{MemberId, PublicKey, SecretShare, Signature};
use beacon_networking::{
    types::{deserialize, serialize},
    MemberAddress, RpcEndpoint,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("Unknown op code {0}")]
    UnknownOp(u8),
    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<beacon_networking::Error> for RpcError {
    fn from(error: beacon_networking::Error) -> Self {
        RpcError::Codec(error.to_string())
    }
}

impl From<RpcError> for beacon_networking::Error {
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::Codec(reason) => beacon_networking::Error::Codec(reason),
            other @ RpcError::UnknownOp(_) => beacon_networking::Error::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RpcOp {
    Register = 1,
    RequestSecret = 2,
    SubmitSignature = 3,
}

impl RpcOp {
    pub const ALL: [RpcOp; 3] = [RpcOp::Register, RpcOp::RequestSecret, RpcOp::SubmitSignature];
}

impl From<RpcOp> for u8 {
    fn from(op: RpcOp) -> Self {
        op as u8
    }
}

impl TryFrom<u8> for RpcOp {
    type Error = RpcError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RpcOp::Register),
            2 => Ok(RpcOp::RequestSecret),
            3 => Ok(RpcOp::SubmitSignature),
            other => Err(RpcError::UnknownOp(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub address: MemberAddress,
    pub id: MemberId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRequest {
    pub address: MemberAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretResponse {
    pub success: bool,
    pub secret_share: Option<SecretShare>,
    pub shared_public_key: Option<PublicKey>,
}

impl SecretResponse {
    #[must_use]
    pub fn rejected() -> Self {
        Self {
            success: false,
            secret_share: None,
            shared_public_key: None,
        }
    }
}

/// One member's signature share for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSubmission {
    pub round: u64,
    pub member_id: MemberId,
    pub share_public_key: PublicKey,
    pub signature: Signature,
}

/// Server-side operations a beacon node exposes to its peers.
pub trait BeaconRpc: Send + Sync {
    fn register(&self, from: &MemberAddress, request: RegisterRequest) -> RegisterResponse;

    fn request_secret(&self, from: &MemberAddress, request: SecretRequest) -> SecretResponse;

    fn submit_signature(&self, from: &MemberAddress, submission: SignatureSubmission);
}

type Handler<S> = fn(&S, &MemberAddress, &[u8]) -> Result<Vec<u8>, RpcError>;

fn handle_register<S: BeaconRpc>(
    service: &S,
    from: &MemberAddress,
    payload: &[u8],
) -> Result<Vec<u8>, RpcError> {
    let request = deserialize(payload)?;
    Ok(serialize(&service.register(from, request))?)
}

fn handle_request_secret<S: BeaconRpc>(
    service: &S,
    from: &MemberAddress,
    payload: &[u8],
) -> Result<Vec<u8>, RpcError> {
    let request = deserialize(payload)?;
    Ok(serialize(&service.request_secret(from, request))?)
}

fn handle_submit_signature<S: BeaconRpc>(
    service: &S,
    from: &MemberAddress,
    payload: &[u8],
) -> Result<Vec<u8>, RpcError> {
    let submission = deserialize(payload)?;
    service.submit_signature(from, submission);
    Ok(Vec::new())
}

/// Dispatches incoming requests to a [`BeaconRpc`] implementation.
pub struct RpcHandlerTable<S> {
    service: Arc<S>,
    handlers: BTreeMap<RpcOp, Handler<S>>,
}

impl<S: BeaconRpc> RpcHandlerTable<S> {
    pub fn new(service: Arc<S>) -> Self {
        let mut handlers: BTreeMap<RpcOp, Handler<S>> = BTreeMap::new();
        handlers.insert(RpcOp::Register, handle_register::<S>);
        handlers.insert(RpcOp::RequestSecret, handle_request_secret::<S>);
        handlers.insert(RpcOp::SubmitSignature, handle_submit_signature::<S>);
        Self { service, handlers }
    }

    #[must_use]
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn dispatch(
        &self,
        from: &MemberAddress,
        op: u8,
        payload: &[u8],
    ) -> Result<Vec<u8>, RpcError> {
        let op = RpcOp::try_from(op)?;
        let handler = self.handlers.get(&op).ok_or(RpcError::UnknownOp(op.into()))?;
        handler(self.service.as_ref(), from, payload)
    }
}

impl<S: BeaconRpc> RpcEndpoint for RpcHandlerTable<S> {
    fn handle(
        &self,
        from: &MemberAddress,
        op: u8,
        payload: &[u8],
    ) -> beacon_networking::Result<Vec<u8>> {
        Ok(self.dispatch(from, op, payload)?)
    }
}
