use super::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_READ_AHEAD: u64 = 3;
pub const DEFAULT_RETENTION_WINDOW: u64 = 16;
pub const DEFAULT_CONNECT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_CONNECT_MAX_POLLS: u32 = 600;

/// Node configuration, loadable from the command line, the environment, or TOML.
#[derive(Debug, Clone, PartialEq, Eq, clap::Parser, Serialize, Deserialize)]
#[command(name = "beacon", about = "Threshold entropy beacon node")]
pub struct BeaconConfig {
    /// This node's stable network address
    #[arg(long, env = "BEACON_ADDRESS")]
    pub address: String,
    /// Every cabinet member's address, this node included
    #[arg(long, env = "BEACON_CABINET", value_delimiter = ',', required = true)]
    pub cabinet: Vec<String>,
    /// Number of signature shares needed to recover a round
    #[arg(long, env = "BEACON_THRESHOLD")]
    pub threshold: usize,
    /// Address of the member that deals the key shares this epoch
    #[arg(long, env = "BEACON_DEALER")]
    pub dealer: String,
    #[arg(long, env = "BEACON_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[arg(long, env = "BEACON_RETRY_DELAY_MS", default_value_t = DEFAULT_RETRY_DELAY_MS)]
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[arg(long, env = "BEACON_RPC_TIMEOUT_MS", default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Maximum number of rounds produced ahead of consumption
    #[arg(long, env = "BEACON_READ_AHEAD", default_value_t = DEFAULT_READ_AHEAD)]
    #[serde(default = "default_read_ahead")]
    pub read_ahead: u64,
    /// Rounds retained behind the consumption pointer
    #[arg(long, env = "BEACON_RETENTION_WINDOW", default_value_t = DEFAULT_RETENTION_WINDOW)]
    #[serde(default = "default_retention_window")]
    pub retention_window: u64,
    #[arg(long, env = "BEACON_CONNECT_POLL_INTERVAL_MS", default_value_t = DEFAULT_CONNECT_POLL_INTERVAL_MS)]
    #[serde(default = "default_connect_poll_interval_ms")]
    pub connect_poll_interval_ms: u64,
    #[arg(long, env = "BEACON_CONNECT_MAX_POLLS", default_value_t = DEFAULT_CONNECT_MAX_POLLS)]
    #[serde(default = "default_connect_max_polls")]
    pub connect_max_polls: u32,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_rpc_timeout_ms() -> u64 {
    DEFAULT_RPC_TIMEOUT_MS
}

fn default_read_ahead() -> u64 {
    DEFAULT_READ_AHEAD
}

fn default_retention_window() -> u64 {
    DEFAULT_RETENTION_WINDOW
}

fn default_connect_poll_interval_ms() -> u64 {
    DEFAULT_CONNECT_POLL_INTERVAL_MS
}

fn default_connect_max_polls() -> u32 {
    DEFAULT_CONNECT_MAX_POLLS
}

impl BeaconConfig {
    /// A configuration with every tunable at its default.
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        cabinet: impl IntoIterator<Item = impl Into<String>>,
        threshold: usize,
        dealer: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            cabinet: cabinet.into_iter().map(Into::into).collect(),
            threshold,
            dealer: dealer.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            read_ahead: DEFAULT_READ_AHEAD,
            retention_window: DEFAULT_RETENTION_WINDOW,
            connect_poll_interval_ms: DEFAULT_CONNECT_POLL_INTERVAL_MS,
            connect_max_polls: DEFAULT_CONNECT_MAX_POLLS,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check the cabinet invariants and that every tunable is usable.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cabinet.is_empty() {
            return Err(Error::EmptyCabinet);
        }

        let mut seen = BTreeSet::new();
        for member in &self.cabinet {
            if !seen.insert(member.as_str()) {
                return Err(Error::DuplicateMember(member.clone()));
            }
        }

        if self.threshold == 0 || self.threshold > self.cabinet.len() {
            return Err(Error::InvalidThreshold {
                threshold: self.threshold,
                cabinet: self.cabinet.len(),
            });
        }
        if !seen.contains(self.dealer.as_str()) {
            return Err(Error::UnknownDealer(self.dealer.clone()));
        }
        if !seen.contains(self.address.as_str()) {
            return Err(Error::UnknownSelf(self.address.clone()));
        }

        let nonzero = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("retry_delay_ms", self.retry_delay_ms),
            ("rpc_timeout_ms", self.rpc_timeout_ms),
            ("read_ahead", self.read_ahead),
            ("retention_window", self.retention_window),
            ("connect_poll_interval_ms", self.connect_poll_interval_ms),
            ("connect_max_polls", u64::from(self.connect_max_polls)),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(Error::InvalidSetting(format!("{name} must be non-zero")));
            }
        }

        Ok(())
    }

    /// Validate and convert into the runtime settings.
    pub fn settings(&self) -> Result<BeaconSettings, Error> {
        self.validate()?;
        beacon_logging::debug!(
            address = %self.address,
            threshold = self.threshold,
            cabinet = self.cabinet.len(),
            "Loaded beacon configuration"
        );

        Ok(BeaconSettings {
            address: MemberAddress::new(self.address.clone()),
            cabinet: self.cabinet.iter().cloned().map(MemberAddress::from).collect(),
            threshold: self.threshold,
            dealer: MemberAddress::new(self.dealer.clone()),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms),
            read_ahead: self.read_ahead,
            retention_window: self.retention_window,
            connect_poll_interval: Duration::from_millis(self.connect_poll_interval_ms),
            connect_max_polls: self.connect_max_polls,
        })
    }
}
