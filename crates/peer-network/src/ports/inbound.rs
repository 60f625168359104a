//! Inbound ports (API) of the peer network.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{Block, TransactionEnvelope};
use tokio::task::JoinHandle;

use crate::domain::{ConnectedPeer, KnownPeer, NodeId};
use crate::errors::PeerNetworkError;
use crate::ports::outbound::{BlockReceiver, TransactionReceiver};

/// Primary API of a peer network instance.
#[async_trait]
pub trait PeerNetworkApi: Send + Sync {
    /// Identity of this instance.
    fn node_id(&self) -> NodeId;

    /// Bind the listener, start the reactors and timers, run the first
    /// discovery pass.
    ///
    /// # Errors
    ///
    /// [`PeerNetworkError::Bind`] if the listening socket cannot be bound.
    async fn open(&self) -> Result<(), PeerNetworkError>;

    /// Tell every peer goodbye and stop all background work.
    async fn close(&self);

    /// Flood a newly produced chain tip, hop 0.
    async fn broadcast_tail(&self, block: &Block) -> Result<(), PeerNetworkError>;

    /// Flood a new transaction, hop 0.
    async fn broadcast_transaction(
        &self,
        transaction: &TransactionEnvelope,
    ) -> Result<(), PeerNetworkError>;

    /// Ask peers one by one for the block following `previous_id`.
    ///
    /// The handle resolves to `true` once the repository holds it.
    fn request_next_block(&self, previous_id: Vec<u8>) -> JoinHandle<bool>;

    /// Dial known peers until the outbound target is met. Returns the
    /// number of dials started.
    fn connect_out(&self) -> usize;

    fn register_block_receiver(&self, receiver: Arc<dyn BlockReceiver>);

    fn register_transaction_receiver(&self, receiver: Arc<dyn TransactionReceiver>);

    fn peers_in(&self) -> Vec<ConnectedPeer>;

    fn peers_out(&self) -> Vec<ConnectedPeer>;

    fn known_peers(&self) -> Vec<KnownPeer>;
}
