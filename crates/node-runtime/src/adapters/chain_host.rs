//! # Chain Host
//!
//! The node's answer to "should this be accepted and relayed?".
//!
//! ## Verdicts
//!
//! | Incoming | Condition | Verdict |
//! |----------|-----------|---------|
//! | block / tail | already stored | Ignore |
//! | block / tail | predecessor stored, or genesis on an empty chain | store; AcceptOnly (block) / AcceptAndRelay (tail) |
//! | block / tail | anything else | report gap, Ignore |
//! | transaction | digest not seen before | AcceptAndRelay |
//! | transaction | digest seen, or undigestable | Ignore |
//!
//! A gap report carries the id whose successor is missing: the newest
//! stored block, or the empty id while the chain is empty.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use peer_network::{BlockReceiver, InMemoryBlockRepository, RelayVerdict, TransactionReceiver};
use shared_types::{Block, Hash, TransactionEnvelope};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of offering a block to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAcceptance {
    Known,
    Stored,
    Gap,
}

/// In-memory chain that validates by linkage only.
pub struct ChainHost {
    repository: Arc<InMemoryBlockRepository>,
    seen_transactions: Mutex<HashSet<Hash>>,
    gaps: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChainHost {
    /// Create a host over `repository`. The receiver yields gap reports.
    #[must_use]
    pub fn new(
        repository: Arc<InMemoryBlockRepository>,
    ) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (gaps, reports) = mpsc::unbounded_channel();
        let host = Self {
            repository,
            seen_transactions: Mutex::new(HashSet::new()),
            gaps,
        };
        (host, reports)
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<InMemoryBlockRepository> {
        &self.repository
    }

    /// Number of distinct transactions accepted.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.seen_transactions.lock().len()
    }

    /// Store `block` if it links onto the chain.
    pub fn offer_block(&self, block: Block) -> BlockAcceptance {
        if self.repository.contains(block.id()) {
            return BlockAcceptance::Known;
        }
        let links = if block.is_genesis() {
            self.repository.len() == 0
        } else {
            self.repository.contains(block.previous_id())
        };
        if !links {
            self.report_gap();
            return BlockAcceptance::Gap;
        }
        let height = block.header.height;
        if self.repository.add_block(block) {
            info!(height, "[chain-host] Block stored");
            BlockAcceptance::Stored
        } else {
            BlockAcceptance::Known
        }
    }

    /// Record a transaction. `true` the first time its digest is seen.
    pub fn offer_transaction(&self, transaction: &TransactionEnvelope) -> bool {
        match transaction.digest() {
            Ok(digest) => self.seen_transactions.lock().insert(digest),
            Err(e) => {
                warn!("[chain-host] Cannot digest transaction: {}", e);
                false
            }
        }
    }

    fn report_gap(&self) {
        let from = self
            .repository
            .newest()
            .map(|block| block.id().to_vec())
            .unwrap_or_default();
        debug!(from = %hex::encode(&from), "[chain-host] Gap detected");
        // The receiver is gone only during shutdown.
        let _ = self.gaps.send(from);
    }
}

#[async_trait]
impl BlockReceiver for ChainHost {
    async fn on_block(&self, block: Block) -> RelayVerdict {
        match self.offer_block(block) {
            BlockAcceptance::Stored => RelayVerdict::AcceptOnly,
            BlockAcceptance::Known | BlockAcceptance::Gap => RelayVerdict::Ignore,
        }
    }

    async fn on_tail(&self, block: Block) -> RelayVerdict {
        match self.offer_block(block) {
            BlockAcceptance::Stored => RelayVerdict::AcceptAndRelay,
            BlockAcceptance::Known | BlockAcceptance::Gap => RelayVerdict::Ignore,
        }
    }
}

#[async_trait]
impl TransactionReceiver for ChainHost {
    async fn on_transaction(&self, transaction: TransactionEnvelope) -> RelayVerdict {
        if self.offer_transaction(&transaction) {
            RelayVerdict::AcceptAndRelay
        } else {
            RelayVerdict::Ignore
        }
    }
}
