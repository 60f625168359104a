//! Core entities of the peer network: identities, peers and wire operations.

use std::fmt;

use uuid::Uuid;

/// Hop count of a message that must never be relayed (direct block responses).
pub const NOT_RELAYABLE: i32 = -1;

/// Hop count of a freshly originated broadcast.
pub const ORIGIN_HOP: i32 = 0;

/// Length in bytes of a [`NodeId`] on the wire.
pub const NODE_ID_LEN: usize = 16;

// =============================================================================
// NodeId
// =============================================================================

/// 128-bit random identity of a network instance.
///
/// Generated once per instance and used both as the wire-level sender and
/// recipient token and as the key of the peer maps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Fresh random identity.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a token frame. `None` unless exactly [`NODE_ID_LEN`] bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; NODE_ID_LEN] = bytes.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        self.0.as_bytes()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0.simple())
    }
}

// =============================================================================
// Peers
// =============================================================================

/// A peer address this node has heard of.
///
/// Known peers are never forgotten, only rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownPeer {
    /// Connection string, e.g. `tcp://10.0.0.5:30333`.
    pub connection_address: String,
    /// Unix seconds of the last successful handshake.
    pub last_contact: Option<u64>,
}

impl KnownPeer {
    #[must_use]
    pub fn new(connection_address: impl Into<String>) -> Self {
        Self {
            connection_address: connection_address.into(),
            last_contact: None,
        }
    }
}

/// A peer with a live connection, keyed by its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPeer {
    pub remote_id: NodeId,
    pub remote_address: String,
}

impl ConnectedPeer {
    #[must_use]
    pub fn new(remote_id: NodeId, remote_address: impl Into<String>) -> Self {
        Self {
            remote_id,
            remote_address: remote_address.into(),
        }
    }
}

/// A peer this node dialed. Owns its connection handle.
///
/// `C` is the transport handle; the directory never looks inside it.
#[derive(Debug, Clone)]
pub struct OutboundPeer<C> {
    pub peer: ConnectedPeer,
    pub connection: C,
}

impl<C> OutboundPeer<C> {
    #[must_use]
    pub fn new(peer: ConnectedPeer, connection: C) -> Self {
        Self { peer, connection }
    }

    #[must_use]
    pub fn remote_id(&self) -> NodeId {
        self.peer.remote_id
    }
}

// =============================================================================
// MessageOp
// =============================================================================

/// Operation code carried in the single-byte op frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageOp {
    Disconnect = 0,
    Tail = 1,
    Block = 2,
    Txn = 3,
    BlockRequest = 4,
    PeerShare = 5,
    Connect = 6,
    Identify = 7,
}

impl MessageOp {
    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageOp {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Disconnect),
            1 => Ok(Self::Tail),
            2 => Ok(Self::Block),
            3 => Ok(Self::Txn),
            4 => Ok(Self::BlockRequest),
            5 => Ok(Self::PeerShare),
            6 => Ok(Self::Connect),
            7 => Ok(Self::Identify),
            other => Err(other),
        }
    }
}
