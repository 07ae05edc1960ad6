use crate::error::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;

/// Maximum allowed size for an encoded message.
pub const MAX_MESSAGE_SIZE: u64 = 16 * 1024 * 1024;

/// Stable network address of a cabinet member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberAddress(String);

impl MemberAddress {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for MemberAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for MemberAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl FromStr for MemberAddress {
    type Err = Infallible;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Encode a message for the wire.
pub fn serialize<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(message)?)
}

/// Decode a message from the wire, refusing anything larger than [`MAX_MESSAGE_SIZE`].
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    use bincode::Options;

    Ok(bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_MESSAGE_SIZE)
        .deserialize(bytes)?)
}
