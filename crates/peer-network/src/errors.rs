//! Error types for the peer network.
//!
//! One enum per layer: [`WireError`] for bytes that do not parse,
//! [`TransportError`] for socket failures, [`CollaboratorError`] for the
//! storage/validation ports, and [`PeerNetworkError`] at the API surface.

use thiserror::Error;

use crate::domain::NodeId;

/// A frame set or payload that does not parse.
///
/// Always handled by logging and dropping the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Packet truncated: needed {needed} more bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Packet has {0} trailing bytes after the last frame")]
    TrailingBytes(usize),

    #[error("Too many frames: {0} (max 255)")]
    TooManyFrames(usize),

    #[error("Unexpected frame count: expected {expected}, got {actual}")]
    FrameCount { expected: usize, actual: usize },

    #[error("Unknown operation code: {0}")]
    UnknownOperation(u8),

    #[error("Operation frame must be 1 byte, got {0}")]
    BadOperationFrame(usize),

    #[error("Identity token must be 16 bytes, got {0}")]
    BadToken(usize),

    #[error("Hop count frame must be 4 bytes, got {0}")]
    BadHopCount(usize),

    #[error("Unknown transaction type tag: {0}")]
    UnknownTransactionType(u32),

    #[error("Unexpected object kind: expected {expected}, got {actual}")]
    UnexpectedKind {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Unsupported object format version: {0}")]
    UnsupportedVersion(u8),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Address payload is not valid UTF-8")]
    InvalidUtf8,
}

impl From<shared_types::CodecError> for WireError {
    fn from(err: shared_types::CodecError) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<bincode::Error> for WireError {
    fn from(err: bincode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Socket-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid connection address: {0}")]
    InvalidAddress(String),

    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    #[error("No inbound route for peer {0}")]
    UnknownRoute(NodeId),

    #[error("Message has no recipient")]
    MissingRecipient,

    #[error("Connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Failure reported by a storage or validation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{collaborator} failed: {reason}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub reason: String,
}

impl CollaboratorError {
    #[must_use]
    pub fn new(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self {
            collaborator,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the peer network API.
#[derive(Debug, Error)]
pub enum PeerNetworkError {
    #[error("Failed to bind listener on {address}: {reason}")]
    Bind { address: String, reason: String },

    #[error("Network is not open")]
    NotOpen,

    #[error("Network is already open")]
    AlreadyOpen,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] WireError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
