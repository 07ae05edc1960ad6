use crate::cabinet::CabinetError;
use crate::pre_dkg::GateError;
use crate::round::RoundError;
use crate::rpc::RpcError;
use beacon_crypto::CryptoError;
use std::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cabinet(#[from] CabinetError),
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Networking(#[from] beacon_networking::Error),
    #[error(transparent)]
    Config(#[from] beacon_config::Error),
    #[error("Cabinet not ready after {0:?}")]
    ReadinessTimeout(Duration),
}
