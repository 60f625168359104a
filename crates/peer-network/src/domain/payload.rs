//! # Payload Codec
//!
//! Turns the payload frame of a [`WireMessage`](super::WireMessage) into a
//! typed value and back.
//!
//! Blocks and transactions use a self-describing object envelope: the
//! object kind and a format version wrap a bincode body. A transaction body
//! is stored as its type tag plus bytes, and rebuilt through the
//! [`TransactionTypeRegistry`]. Block ids travel raw; addresses as UTF-8.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shared_types::{
    decode_transaction_body, Block, BlockHeader, CodecError, DataAnchor, TransactionBody,
    TransactionEnvelope, TransactionType, ValueTransfer,
};

use crate::domain::entities::MessageOp;
use crate::errors::WireError;

const FORMAT_VERSION: u8 = 1;

// =============================================================================
// Transaction type registry
// =============================================================================

/// Rebuilds a concrete transaction body from its bytes.
pub type TransactionDecoder = fn(&[u8]) -> Result<Arc<dyn TransactionBody>, CodecError>;

/// Maps transaction type tags to decoders.
#[derive(Clone, Default)]
pub struct TransactionTypeRegistry {
    decoders: HashMap<u32, (&'static str, TransactionDecoder)>,
}

impl TransactionTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the transaction types that ship with the workspace.
    #[must_use]
    pub fn with_builtin_types() -> Self {
        Self::new()
            .with_type::<ValueTransfer>()
            .with_type::<DataAnchor>()
    }

    /// Builder form of [`Self::register`].
    #[must_use]
    pub fn with_type<T: TransactionType>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Register `T` under its tag. Returns `false` if the tag was taken; the
    /// newer registration wins.
    pub fn register<T: TransactionType>(&mut self) -> bool {
        self.decoders
            .insert(T::TYPE_TAG, (T::TYPE_NAME, decode_transaction_body::<T>))
            .is_none()
    }

    #[must_use]
    pub fn is_registered(&self, type_tag: u32) -> bool {
        self.decoders.contains_key(&type_tag)
    }

    pub fn decode(&self, type_tag: u32, bytes: &[u8]) -> Result<Arc<dyn TransactionBody>, WireError> {
        let (_, decoder) = self
            .decoders
            .get(&type_tag)
            .ok_or(WireError::UnknownTransactionType(type_tag))?;
        Ok(decoder(bytes)?)
    }
}

impl fmt::Debug for TransactionTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self
            .decoders
            .iter()
            .map(|(tag, (name, _))| (*tag, *name))
            .collect();
        types.sort_unstable();
        f.debug_struct("TransactionTypeRegistry")
            .field("types", &types)
            .finish()
    }
}

// =============================================================================
// Object envelope
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum ObjectKind {
    Block,
    Transaction,
}

impl ObjectKind {
    fn name(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Transaction => "transaction",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ObjectEnvelope {
    kind: ObjectKind,
    format_version: u8,
    body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireTransaction {
    type_tag: u32,
    origin_key: Vec<u8>,
    signature: Vec<u8>,
    timestamp: u64,
    body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireBlock {
    header: BlockHeader,
    transactions: Vec<WireTransaction>,
}

// =============================================================================
// Payload
// =============================================================================

/// Decoded payload of a message, by operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `Tail` and `Block`.
    Block(Block),
    /// `Txn`.
    Transaction(TransactionEnvelope),
    /// `BlockRequest`: id of the block whose successor is wanted.
    BlockId(Vec<u8>),
    /// `PeerShare`, `Connect` and `Identify`.
    Address(String),
    /// `Disconnect`.
    Empty,
}

/// Encodes and decodes payloads.
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    registry: Arc<TransactionTypeRegistry>,
}

impl PayloadCodec {
    #[must_use]
    pub fn new(registry: TransactionTypeRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Decode the payload of a message with operation `op`.
    pub fn decode(&self, op: MessageOp, bytes: &[u8]) -> Result<Payload, WireError> {
        Ok(match op {
            MessageOp::Tail | MessageOp::Block => Payload::Block(self.decode_block(bytes)?),
            MessageOp::Txn => Payload::Transaction(self.decode_transaction(bytes)?),
            MessageOp::BlockRequest => Payload::BlockId(bytes.to_vec()),
            MessageOp::PeerShare | MessageOp::Connect | MessageOp::Identify => {
                Payload::Address(decode_address(bytes)?)
            }
            MessageOp::Disconnect => Payload::Empty,
        })
    }

    /// Encode any payload.
    pub fn encode(&self, payload: &Payload) -> Result<Bytes, WireError> {
        match payload {
            Payload::Block(block) => self.encode_block(block),
            Payload::Transaction(txn) => self.encode_transaction(txn),
            Payload::BlockId(id) => Ok(Bytes::copy_from_slice(id)),
            Payload::Address(address) => Ok(encode_address(address)),
            Payload::Empty => Ok(Bytes::new()),
        }
    }

    pub fn encode_block(&self, block: &Block) -> Result<Bytes, WireError> {
        let wire = WireBlock {
            header: block.header.clone(),
            transactions: block
                .transactions
                .iter()
                .map(to_wire_transaction)
                .collect::<Result<_, _>>()?,
        };
        seal(ObjectKind::Block, &wire)
    }

    pub fn decode_block(&self, bytes: &[u8]) -> Result<Block, WireError> {
        let wire: WireBlock = open(ObjectKind::Block, bytes)?;
        let transactions = wire
            .transactions
            .into_iter()
            .map(|txn| self.from_wire_transaction(txn))
            .collect::<Result<_, _>>()?;
        Ok(Block::new(wire.header, transactions))
    }

    pub fn encode_transaction(&self, txn: &TransactionEnvelope) -> Result<Bytes, WireError> {
        seal(ObjectKind::Transaction, &to_wire_transaction(txn)?)
    }

    pub fn decode_transaction(&self, bytes: &[u8]) -> Result<TransactionEnvelope, WireError> {
        let wire: WireTransaction = open(ObjectKind::Transaction, bytes)?;
        self.from_wire_transaction(wire)
    }

    fn from_wire_transaction(&self, wire: WireTransaction) -> Result<TransactionEnvelope, WireError> {
        Ok(TransactionEnvelope {
            origin_key: wire.origin_key,
            signature: wire.signature,
            timestamp: wire.timestamp,
            body: self.registry.decode(wire.type_tag, &wire.body)?,
        })
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(TransactionTypeRegistry::with_builtin_types())
    }
}

#[must_use]
pub fn encode_address(address: &str) -> Bytes {
    Bytes::copy_from_slice(address.as_bytes())
}

pub fn decode_address(bytes: &[u8]) -> Result<String, WireError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
}

fn to_wire_transaction(txn: &TransactionEnvelope) -> Result<WireTransaction, WireError> {
    Ok(WireTransaction {
        type_tag: txn.body.type_tag(),
        origin_key: txn.origin_key.clone(),
        signature: txn.signature.clone(),
        timestamp: txn.timestamp,
        body: txn.body.encode_body()?,
    })
}

fn seal<T: Serialize>(kind: ObjectKind, value: &T) -> Result<Bytes, WireError> {
    let envelope = ObjectEnvelope {
        kind,
        format_version: FORMAT_VERSION,
        body: bincode::serialize(value)?,
    };
    Ok(Bytes::from(bincode::serialize(&envelope)?))
}

fn open<T: for<'de> Deserialize<'de>>(expected: ObjectKind, bytes: &[u8]) -> Result<T, WireError> {
    let envelope: ObjectEnvelope = bincode::deserialize(bytes)?;
    if envelope.kind != expected {
        return Err(WireError::UnexpectedKind {
            expected: expected.name(),
            actual: envelope.kind.name(),
        });
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(WireError::UnsupportedVersion(envelope.format_version));
    }
    Ok(bincode::deserialize(&envelope.body)?)
}
