//! # Node Configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment.
//!
//! ## Config File Format
//!
//! ```toml
//! [network]
//! bind_host = "0.0.0.0"
//! listen_port = 30333
//! target_outbound = 8
//! public_address = "tcp://203.0.113.7:30333"
//! housekeeping_interval_secs = 30
//! share_interval_secs = 60
//! gap_grace_period_ms = 5000
//! gap_poll_interval_ms = 250
//! handshake_timeout_secs = 10
//! connect_timeout_secs = 10
//! max_packet_size = 16777216
//!
//! [discovery]
//! seeds = ["tcp://10.0.0.1:30333", "tcp://10.0.0.2:30333"]
//! ```
//!
//! Every field is optional. Environment overrides:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `RELAYNET_P2P_PORT` | `network.listen_port` |
//! | `RELAYNET_TARGET_OUTBOUND` | `network.target_outbound` |
//! | `RELAYNET_PUBLIC_ADDRESS` | `network.public_address` |
//! | `RELAYNET_SEEDS` | `discovery.seeds` (comma-separated) |

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use peer_network::NetworkConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "RELAYNET_CONFIG";

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    /// Peer network tunables.
    pub network: NetworkConfig,
    /// Seed addresses handed to discovery.
    pub seeds: Vec<String>,
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    network: NetworkSection,
    #[serde(default)]
    discovery: DiscoverySection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct NetworkSection {
    bind_host: Option<String>,
    listen_port: Option<u16>,
    target_outbound: Option<usize>,
    public_address: Option<String>,
    housekeeping_interval_secs: Option<u64>,
    share_interval_secs: Option<u64>,
    gap_grace_period_ms: Option<u64>,
    gap_poll_interval_ms: Option<u64>,
    handshake_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    max_packet_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DiscoverySection {
    #[serde(default)]
    seeds: Vec<String>,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = NetworkConfig::default();
        let n = file.network;
        let network = NetworkConfig {
            bind_host: n.bind_host.unwrap_or(defaults.bind_host),
            listen_port: n.listen_port.unwrap_or(defaults.listen_port),
            target_outbound: n.target_outbound.unwrap_or(defaults.target_outbound),
            public_address: n.public_address.or(defaults.public_address),
            housekeeping_interval: n
                .housekeeping_interval_secs
                .map_or(defaults.housekeeping_interval, Duration::from_secs),
            share_interval: n
                .share_interval_secs
                .map_or(defaults.share_interval, Duration::from_secs),
            gap_grace_period: n
                .gap_grace_period_ms
                .map_or(defaults.gap_grace_period, Duration::from_millis),
            gap_poll_interval: n
                .gap_poll_interval_ms
                .map_or(defaults.gap_poll_interval, Duration::from_millis),
            handshake_timeout: n
                .handshake_timeout_secs
                .map_or(defaults.handshake_timeout, Duration::from_secs),
            connect_timeout: n
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            max_packet_size: n.max_packet_size.unwrap_or(defaults.max_packet_size),
        };

        Ok(Self {
            network,
            seeds: file.discovery.seeds,
        })
    }

    /// Apply `RELAYNET_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are logged
    /// and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = parsed(&lookup, "RELAYNET_P2P_PORT") {
            self.network.listen_port = port;
        }
        if let Some(target) = parsed(&lookup, "RELAYNET_TARGET_OUTBOUND") {
            self.network.target_outbound = target;
        }
        if let Some(address) = lookup("RELAYNET_PUBLIC_ADDRESS") {
            let address = address.trim();
            self.network.public_address = (!address.is_empty()).then(|| address.to_string());
        }
        if let Some(seeds) = lookup("RELAYNET_SEEDS") {
            self.seeds = seeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{} has an invalid value {:?}, ignoring", key, raw);
            None
        }
    }
}
