use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(usize),
    #[error("Insufficient shares: need {required}, got {got}")]
    InsufficientShares { required: usize, got: usize },
    #[error("Duplicate share id")]
    DuplicateShareId,
    #[error("Member id hashes to zero")]
    ZeroMemberId,
    #[error("Lagrange interpolation failed")]
    LagrangeInterpolationFailed,
    #[error("Signature not in subgroup")]
    SignatureNotInSubgroup,
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<ark_serialize::SerializationError> for CryptoError {
    fn from(error: ark_serialize::SerializationError) -> Self {
        CryptoError::Serialization(error.to_string())
    }
}

pub type Result<T> = core::result::Result<T, CryptoError>;
