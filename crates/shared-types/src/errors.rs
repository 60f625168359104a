//! # Error Types
//!
//! Errors shared by every crate that encodes chain entities.

use thiserror::Error;

/// Failure to turn a chain entity into bytes or back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The serializer rejected the value.
    #[error("Failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    /// The bytes do not describe a value of the expected type.
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}
