//! Configuration of a peer network instance.

use std::time::Duration;

/// Default P2P listening port.
pub const DEFAULT_LISTEN_PORT: u16 = 30333;

/// Default number of outbound connections to keep.
pub const DEFAULT_TARGET_OUTBOUND: usize = 8;

/// Default upper bound of one transport packet (16 MiB).
pub const DEFAULT_MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// Tunables of the peer network.
///
/// The listening port is the only value an operator normally sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Interface to bind the listener to.
    pub bind_host: String,
    /// Listening port. `0` picks an ephemeral port.
    pub listen_port: u16,
    /// Outbound connections the top-up aims for.
    pub target_outbound: usize,
    /// Period of discover / advertise / connect-out.
    pub housekeeping_interval: Duration,
    /// Period of pushing the known-peer list to discovery services.
    pub share_interval: Duration,
    /// How long a block-gap request waits on one peer.
    pub gap_grace_period: Duration,
    /// How often the repository is polled inside the grace period.
    pub gap_poll_interval: Duration,
    /// Deadline for the identity greeting on accepted connections.
    pub handshake_timeout: Duration,
    /// Deadline for establishing an outbound TCP connection.
    pub connect_timeout: Duration,
    /// Largest accepted transport packet.
    pub max_packet_size: usize,
    /// Address advertised globally, if this node is reachable from outside.
    pub public_address: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            target_outbound: DEFAULT_TARGET_OUTBOUND,
            housekeeping_interval: Duration::from_secs(30),
            share_interval: Duration::from_secs(60),
            gap_grace_period: Duration::from_secs(5),
            gap_poll_interval: Duration::from_millis(250),
            handshake_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            public_address: None,
        }
    }
}

impl NetworkConfig {
    /// Loopback, ephemeral port, short timers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            listen_port: 0,
            housekeeping_interval: Duration::from_secs(3600),
            share_interval: Duration::from_secs(3600),
            gap_grace_period: Duration::from_millis(1500),
            gap_poll_interval: Duration::from_millis(50),
            handshake_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }

    /// Connection string for `host` on this node's port.
    #[must_use]
    pub fn connection_string(host: &str, port: u16) -> String {
        if host.contains(':') {
            format!("tcp://[{host}]:{port}")
        } else {
            format!("tcp://{host}:{port}")
        }
    }
}
