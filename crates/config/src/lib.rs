use beacon_networking::MemberAddress;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

pub mod context_config;


pub use context_config::BeaconConfig;

/// Errors that can occur while loading and validating the beacon configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The cabinet has no members.
    #[error("Cabinet is empty")]
    EmptyCabinet,
    /// The same address appears twice in the cabinet.
    #[error("Duplicate cabinet member: {0}")]
    DuplicateMember(String),
    /// The threshold is outside `1..=|cabinet|`.
    #[error("Invalid threshold {threshold} for a cabinet of {cabinet}")]
    InvalidThreshold { threshold: usize, cabinet: usize },
    /// The dealer is not a cabinet member.
    #[error("Dealer {0} is not a cabinet member")]
    UnknownDealer(String),
    /// This node is not a cabinet member.
    #[error("Own address {0} is not a cabinet member")]
    UnknownSelf(String),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Validated runtime settings derived from a [`BeaconConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconSettings {
    pub address: MemberAddress,
    pub cabinet: BTreeSet<MemberAddress>,
    pub threshold: usize,
    pub dealer: MemberAddress,
    /// Re-entry delay for the waiting and collecting states
    pub poll_interval: Duration,
    /// Delay before a failed secret request or recovery is retried
    pub retry_delay: Duration,
    pub rpc_timeout: Duration,
    pub read_ahead: u64,
    pub retention_window: u64,
    pub connect_poll_interval: Duration,
    pub connect_max_polls: u32,
}

impl BeaconSettings {
    /// Settings with default tunables. The cabinet invariants are not checked here.
    #[must_use]
    pub fn new(
        address: impl Into<MemberAddress>,
        cabinet: impl IntoIterator<Item = impl Into<MemberAddress>>,
        threshold: usize,
        dealer: impl Into<MemberAddress>,
    ) -> Self {
        use context_config::{
            DEFAULT_CONNECT_MAX_POLLS, DEFAULT_CONNECT_POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS,
            DEFAULT_READ_AHEAD, DEFAULT_RETENTION_WINDOW, DEFAULT_RETRY_DELAY_MS,
            DEFAULT_RPC_TIMEOUT_MS,
        };

        Self {
            address: address.into(),
            cabinet: cabinet.into_iter().map(Into::into).collect(),
            threshold,
            dealer: dealer.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            rpc_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            read_ahead: DEFAULT_READ_AHEAD,
            retention_window: DEFAULT_RETENTION_WINDOW,
            connect_poll_interval: Duration::from_millis(DEFAULT_CONNECT_POLL_INTERVAL_MS),
            connect_max_polls: DEFAULT_CONNECT_MAX_POLLS,
        }
    }

    /// Whether this node deals the key shares.
    #[must_use]
    pub fn is_dealer(&self) -> bool {
        self.address == self.dealer
    }
}
