use crate::types::MemberAddress;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown peer: {0}")]
    UnknownPeer(MemberAddress),

    #[error("Peer unreachable: {0}")]
    Unreachable(MemberAddress),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Other error: {0}")]
    Other(String),
}

impl From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Codec(error.to_string())
    }
}
