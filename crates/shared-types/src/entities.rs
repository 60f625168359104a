//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`
//! - **Transactions**: see [`crate::transactions`]

use serde::{Deserialize, Serialize};

use crate::transactions::TransactionEnvelope;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte hash (SHA-256).
pub type Hash = [u8; 32];

/// The header of a block.
///
/// `block_id` and `previous_block_id` are opaque to the network layer: the
/// only question ever asked of them is "is this the block that follows
/// that one".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u32,
    /// Identifier of this block.
    pub block_id: Vec<u8>,
    /// Identifier of the block this one extends. Empty for genesis.
    pub previous_block_id: Vec<u8>,
    /// Block height in the chain.
    pub height: u64,
    /// Unix timestamp when the block was produced.
    pub timestamp: u64,
    /// Merkle root of all transactions in the block.
    pub merkle_root: Hash,
    /// Proof-of-work nonce.
    pub nonce: u64,
}

/// A block as exchanged between peers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions carried by the block, in block order.
    pub transactions: Vec<TransactionEnvelope>,
}

impl Block {
    #[must_use]
    pub fn new(header: BlockHeader, transactions: Vec<TransactionEnvelope>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Identifier of this block.
    #[must_use]
    pub fn id(&self) -> &[u8] {
        &self.header.block_id
    }

    /// Identifier of the predecessor.
    #[must_use]
    pub fn previous_id(&self) -> &[u8] {
        &self.header.previous_block_id
    }

    /// A genesis block has no predecessor.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.header.previous_block_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_has_no_predecessor() {
        let genesis = Block::new(
            BlockHeader {
                block_id: vec![1],
                ..Default::default()
            },
            vec![],
        );
        assert!(genesis.is_genesis());
        assert_eq!(genesis.id(), &[1]);

        let child = Block::new(
            BlockHeader {
                block_id: vec![2],
                previous_block_id: vec![1],
                height: 1,
                ..Default::default()
            },
            vec![],
        );
        assert!(!child.is_genesis());
        assert_eq!(child.previous_id(), genesis.id());
    }
}
