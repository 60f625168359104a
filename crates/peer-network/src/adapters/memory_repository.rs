//! In-memory block repository.
//!
//! Holds blocks indexed by id and by predecessor id. Enough for a node that
//! keeps its chain in RAM and for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Block, BlockHeader};

use crate::errors::CollaboratorError;
use crate::ports::BlockRepository;

#[derive(Default)]
struct Chain {
    by_id: HashMap<Vec<u8>, Block>,
    by_previous: HashMap<Vec<u8>, Vec<u8>>,
    newest: Option<Vec<u8>>,
}

/// Thread-safe in-memory block store.
#[derive(Default)]
pub struct InMemoryBlockRepository {
    chain: RwLock<Chain>,
}

impl InMemoryBlockRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block. Returns `false` if a block with that id was present.
    ///
    /// The newest block is the one with the greatest height seen so far.
    pub fn add_block(&self, block: Block) -> bool {
        let mut chain = self.chain.write();
        let id = block.id().to_vec();
        if chain.by_id.contains_key(&id) {
            return false;
        }
        let replaces_newest = match chain.newest.as_ref().and_then(|n| chain.by_id.get(n)) {
            Some(newest) => block.header.height > newest.header.height,
            None => true,
        };
        if replaces_newest {
            chain.newest = Some(id.clone());
        }
        chain.by_previous.insert(block.previous_id().to_vec(), id.clone());
        chain.by_id.insert(id, block);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.read().by_id.len()
    }

    #[must_use]
    pub fn contains(&self, block_id: &[u8]) -> bool {
        self.chain.read().by_id.contains_key(block_id)
    }

    #[must_use]
    pub fn get(&self, block_id: &[u8]) -> Option<Block> {
        self.chain.read().by_id.get(block_id).cloned()
    }

    #[must_use]
    pub fn newest(&self) -> Option<Block> {
        let chain = self.chain.read();
        chain.newest.as_ref().and_then(|id| chain.by_id.get(id)).cloned()
    }
}

#[async_trait]
impl BlockRepository for InMemoryBlockRepository {
    async fn has_block(&self, block_id: &[u8]) -> Result<bool, CollaboratorError> {
        Ok(self.contains(block_id))
    }

    async fn next_block_after(&self, previous_id: &[u8]) -> Result<Option<Block>, CollaboratorError> {
        let chain = self.chain.read();
        Ok(chain
            .by_previous
            .get(previous_id)
            .and_then(|id| chain.by_id.get(id))
            .cloned())
    }

    async fn newest_header(&self) -> Result<Option<BlockHeader>, CollaboratorError> {
        Ok(self.newest().map(|b| b.header))
    }

    async fn is_empty(&self) -> Result<bool, CollaboratorError> {
        Ok(self.len() == 0)
    }
}
