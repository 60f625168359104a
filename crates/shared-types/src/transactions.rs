//! # Transactions
//!
//! A transaction is a signed envelope around a body whose concrete type is
//! chosen by the application. Bodies are registered by numeric tag; the
//! envelope carries the tag so a receiver can rebuild the right type.
//!
//! ## Adding a transaction type
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use shared_types::TransactionType;
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Vote {
//!     proposal: u32,
//! }
//!
//! impl TransactionType for Vote {
//!     const TYPE_TAG: u32 = 42;
//!     const TYPE_NAME: &'static str = "vote";
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entities::Hash;
use crate::errors::CodecError;

/// Object-safe view of a transaction body.
///
/// Implemented for every [`TransactionType`]; callers normally never
/// implement it by hand.
pub trait TransactionBody: fmt::Debug + Send + Sync + 'static {
    /// Numeric tag identifying the concrete type on the wire.
    fn type_tag(&self) -> u32;

    /// Human readable type name, for logs.
    fn type_name(&self) -> &'static str;

    /// Serialize the body alone (without the envelope).
    fn encode_body(&self) -> Result<Vec<u8>, CodecError>;

    /// Downcasting hook.
    fn as_any(&self) -> &dyn Any;
}

/// A concrete, registrable transaction type.
pub trait TransactionType:
    Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static
{
    /// Tag written on the wire. Must be unique per application.
    const TYPE_TAG: u32;
    /// Name used in logs and error messages.
    const TYPE_NAME: &'static str;
}

impl<T: TransactionType> TransactionBody for T {
    fn type_tag(&self) -> u32 {
        T::TYPE_TAG
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn encode_body(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Encode {
            what: T::TYPE_NAME,
            reason: e.to_string(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Rebuild a body of type `T` from its encoded bytes.
///
/// This is the decoder function stored in transaction type registries.
pub fn decode_transaction_body<T: TransactionType>(
    bytes: &[u8],
) -> Result<Arc<dyn TransactionBody>, CodecError> {
    let body: T = bincode::deserialize(bytes).map_err(|e| CodecError::Decode {
        what: T::TYPE_NAME,
        reason: e.to_string(),
    })?;
    Ok(Arc::new(body))
}

/// A signed transaction with a polymorphic body.
#[derive(Debug, Clone)]
pub struct TransactionEnvelope {
    /// Public key of the originator.
    pub origin_key: Vec<u8>,
    /// Signature over the body.
    pub signature: Vec<u8>,
    /// Unix timestamp chosen by the originator.
    pub timestamp: u64,
    /// The typed body.
    pub body: Arc<dyn TransactionBody>,
}

impl TransactionEnvelope {
    #[must_use]
    pub fn new<T: TransactionType>(
        origin_key: Vec<u8>,
        signature: Vec<u8>,
        timestamp: u64,
        body: T,
    ) -> Self {
        Self {
            origin_key,
            signature,
            timestamp,
            body: Arc::new(body),
        }
    }

    /// Borrow the body as `T` if that is its concrete type.
    #[must_use]
    pub fn body_as<T: TransactionType>(&self) -> Option<&T> {
        self.body.as_any().downcast_ref::<T>()
    }

    /// SHA-256 over every field of the envelope, including the body tag.
    pub fn digest(&self) -> Result<Hash, CodecError> {
        let body = self.body.encode_body()?;
        let mut hasher = Sha256::new();
        for part in [&self.origin_key[..], &self.signature[..], &body[..]] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.body.type_tag().to_le_bytes());
        Ok(hasher.finalize().into())
    }
}

impl PartialEq for TransactionEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.origin_key == other.origin_key
            && self.signature == other.signature
            && self.timestamp == other.timestamp
            && self.body.type_tag() == other.body.type_tag()
            && self.body.encode_body().ok() == other.body.encode_body().ok()
    }
}

// =============================================================================
// BUILT-IN TRANSACTION TYPES
// =============================================================================

/// Moves value from the originator to a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueTransfer {
    pub recipient: Vec<u8>,
    pub amount: u64,
    pub fee: u64,
}

impl TransactionType for ValueTransfer {
    const TYPE_TAG: u32 = 1;
    const TYPE_NAME: &'static str = "value-transfer";
}

/// Anchors an opaque payload in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAnchor {
    pub payload: Vec<u8>,
}

impl TransactionType for DataAnchor {
    const TYPE_TAG: u32 = 2;
    const TYPE_NAME: &'static str = "data-anchor";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(amount: u64) -> TransactionEnvelope {
        TransactionEnvelope::new(
            vec![7; 33],
            vec![9; 64],
            1_700_000_000,
            ValueTransfer {
                recipient: vec![1, 2, 3],
                amount,
                fee: 1,
            },
        )
    }

    #[test]
    fn test_body_downcast_matches_concrete_type() {
        let txn = transfer(10);
        assert_eq!(txn.body.type_tag(), ValueTransfer::TYPE_TAG);
        assert_eq!(txn.body_as::<ValueTransfer>().map(|b| b.amount), Some(10));
        assert!(txn.body_as::<DataAnchor>().is_none());
    }

    #[test]
    fn test_decode_body_restores_value() {
        let txn = transfer(55);
        let bytes = txn.body.encode_body().unwrap();
        let body = decode_transaction_body::<ValueTransfer>(&bytes).unwrap();
        assert_eq!(body.as_any().downcast_ref::<ValueTransfer>().unwrap().amount, 55);
    }

    #[test]
    fn test_decode_body_rejects_garbage() {
        let err = decode_transaction_body::<ValueTransfer>(&[1, 2]).unwrap_err();
        assert!(matches!(err, CodecError::Decode { what: "value-transfer", .. }));
    }

    #[test]
    fn test_digest_distinguishes_bodies() {
        let a = transfer(1);
        let b = transfer(2);
        assert_eq!(a.digest().unwrap(), a.clone().digest().unwrap());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn test_digest_distinguishes_types_with_equal_bytes() {
        let anchor = TransactionEnvelope::new(vec![], vec![], 0, DataAnchor { payload: vec![] });
        let other = TransactionEnvelope {
            body: Arc::new(DataAnchor { payload: vec![0] }),
            ..anchor.clone()
        };
        assert_ne!(anchor, other);
        assert_ne!(anchor.digest().unwrap(), other.digest().unwrap());
    }
}
