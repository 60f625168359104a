//! Outbound ports (SPI): collaborators the peer network depends on.
//!
//! Storage, validation and discovery live outside this crate. Receivers
//! must be idempotent: the flood protocol delivers duplicates.

use std::net::IpAddr;

use async_trait::async_trait;
use shared_types::{Block, BlockHeader, TransactionEnvelope};

use crate::domain::{KnownPeer, RelayVerdict};
use crate::errors::CollaboratorError;

/// Read access to the local chain.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    async fn has_block(&self, block_id: &[u8]) -> Result<bool, CollaboratorError>;

    /// The block whose predecessor is `previous_id`, if stored.
    async fn next_block_after(&self, previous_id: &[u8]) -> Result<Option<Block>, CollaboratorError>;

    async fn newest_header(&self) -> Result<Option<BlockHeader>, CollaboratorError>;

    async fn is_empty(&self) -> Result<bool, CollaboratorError>;
}

/// Validates blocks arriving from peers and decides on relay.
#[async_trait]
pub trait BlockReceiver: Send + Sync {
    /// A block sent in answer to a `BlockRequest`.
    async fn on_block(&self, block: Block) -> RelayVerdict;

    /// A newly produced chain tip.
    async fn on_tail(&self, block: Block) -> RelayVerdict;
}

/// Validates transactions arriving from peers and decides on relay.
#[async_trait]
pub trait TransactionReceiver: Send + Sync {
    async fn on_transaction(&self, transaction: TransactionEnvelope) -> RelayVerdict;
}

/// Source and sink of peer addresses.
#[async_trait]
pub trait PeerDiscoveryService: Send + Sync {
    async fn discover(&self) -> Result<Vec<KnownPeer>, CollaboratorError>;

    /// Advertise the address reachable on the local network.
    async fn advertise_local(&self, address: &str) -> Result<(), CollaboratorError>;

    /// Advertise the address reachable from outside.
    async fn advertise_global(&self, address: &str) -> Result<(), CollaboratorError>;

    async fn share_peer_list(&self, peers: Vec<KnownPeer>) -> Result<(), CollaboratorError>;
}

/// Finds the interface address other nodes should dial.
pub trait OwnAddressResolver: Send + Sync {
    fn preferred_local_address(&self) -> Option<IpAddr>;
}
