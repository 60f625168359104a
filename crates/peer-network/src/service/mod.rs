//! # Peer Network Service
//!
//! [`TcpPeerNetwork`] ties the pieces together: the inbound endpoint and
//! its reactor, the outbound dial pool, relay fan-out, block-gap recovery
//! and the housekeeping timers.
//!
//! ## Tasks
//!
//! ```text
//! accept loop ──> per-connection readers ──mpsc──> listener reactor ─┐
//! dial task ──> outbound reactor (one per connection) ───────────────┤
//!                                                                   ↓
//!                                     dispatch ──> receivers ──> fan-out tasks
//! housekeeping timer ──> discover / advertise / connect_out
//! share timer ──> share_peer_list
//! ```
//!
//! Shared state lives in the [`PeerDirectory`]; no lock is held across an
//! `.await` except the per-connection send locks.

mod block_gap;
mod dispatch;
mod housekeeping;
mod outbound;
mod relay;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use shared_types::{Block, TransactionEnvelope};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::adapters::transport::{InboundEndpoint, OutboundConnection};
use crate::adapters::LocalAddressResolver;
use crate::domain::{
    plan_broadcast, ConnectedPeer, KnownPeer, MessageOp, NetworkConfig, NodeId, PayloadCodec,
    PeerDirectory, RelayContext, TransactionTypeRegistry, ORIGIN_HOP,
};
use crate::errors::PeerNetworkError;
use crate::ports::{
    BlockReceiver, BlockRepository, OwnAddressResolver, PeerDiscoveryService, PeerNetworkApi,
    TransactionReceiver,
};

pub(crate) use relay::Route;

/// State shared by every task of one network instance.
pub(crate) struct NetworkCore {
    pub(crate) node_id: NodeId,
    pub(crate) config: NetworkConfig,
    pub(crate) directory: PeerDirectory<Arc<OutboundConnection>>,
    pub(crate) codec: PayloadCodec,
    pub(crate) repository: Arc<dyn BlockRepository>,
    pub(crate) discovery: Vec<Arc<dyn PeerDiscoveryService>>,
    address_resolver: Arc<dyn OwnAddressResolver>,
    block_receiver: RwLock<Option<Arc<dyn BlockReceiver>>>,
    transaction_receiver: RwLock<Option<Arc<dyn TransactionReceiver>>>,
    endpoint: RwLock<Option<Arc<InboundEndpoint>>>,
    own_address: RwLock<Option<String>>,
    opened: AtomicBool,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NetworkCore {
    pub(crate) fn endpoint(&self) -> Option<Arc<InboundEndpoint>> {
        self.endpoint.read().clone()
    }

    pub(crate) fn block_receiver(&self) -> Option<Arc<dyn BlockReceiver>> {
        self.block_receiver.read().clone()
    }

    pub(crate) fn transaction_receiver(&self) -> Option<Arc<dyn TransactionReceiver>> {
        self.transaction_receiver.read().clone()
    }

    pub(crate) fn own_address(&self) -> Option<String> {
        self.own_address.read().clone()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(crate) fn relay_context<'a>(
        &self,
        origin: Option<NodeId>,
        inbound: &'a [NodeId],
        outbound: &'a [NodeId],
    ) -> RelayContext<'a> {
        RelayContext {
            local_id: self.node_id,
            origin,
            inbound,
            outbound,
        }
    }

    /// Address other nodes should dial: the bind host, or the resolver's
    /// answer when bound to every interface.
    fn resolve_own_address(&self, local_addr: SocketAddr) -> Option<String> {
        let host = match self.config.bind_host.parse::<std::net::IpAddr>() {
            Ok(ip) if ip.is_unspecified() => self.address_resolver.preferred_local_address()?.to_string(),
            _ => self.config.bind_host.clone(),
        };
        Some(NetworkConfig::connection_string(&host, local_addr.port()))
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`TcpPeerNetwork`] from its collaborators.
pub struct TcpPeerNetworkBuilder {
    config: NetworkConfig,
    repository: Arc<dyn BlockRepository>,
    discovery: Vec<Arc<dyn PeerDiscoveryService>>,
    address_resolver: Arc<dyn OwnAddressResolver>,
    registry: TransactionTypeRegistry,
    node_id: Option<NodeId>,
}

impl TcpPeerNetworkBuilder {
    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn PeerDiscoveryService>) -> Self {
        self.discovery.push(discovery);
        self
    }

    #[must_use]
    pub fn with_address_resolver(mut self, resolver: Arc<dyn OwnAddressResolver>) -> Self {
        self.address_resolver = resolver;
        self
    }

    /// Transaction types this node can decode. Defaults to the built-in set.
    #[must_use]
    pub fn with_transaction_types(mut self, registry: TransactionTypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Fix the identity instead of generating one.
    #[must_use]
    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    #[must_use]
    pub fn build(self) -> TcpPeerNetwork {
        let (shutdown, _) = watch::channel(false);
        TcpPeerNetwork {
            core: Arc::new(NetworkCore {
                node_id: self.node_id.unwrap_or_else(NodeId::random),
                config: self.config,
                directory: PeerDirectory::new(),
                codec: PayloadCodec::new(self.registry),
                repository: self.repository,
                discovery: self.discovery,
                address_resolver: self.address_resolver,
                block_receiver: RwLock::new(None),
                transaction_receiver: RwLock::new(None),
                endpoint: RwLock::new(None),
                own_address: RwLock::new(None),
                opened: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

// =============================================================================
// TcpPeerNetwork
// =============================================================================

/// A TCP peer network instance.
///
/// Cheap to clone; clones share the same instance.
#[derive(Clone)]
pub struct TcpPeerNetwork {
    core: Arc<NetworkCore>,
}

impl TcpPeerNetwork {
    #[must_use]
    pub fn builder(config: NetworkConfig, repository: Arc<dyn BlockRepository>) -> TcpPeerNetworkBuilder {
        TcpPeerNetworkBuilder {
            config,
            repository,
            discovery: Vec::new(),
            address_resolver: Arc::new(LocalAddressResolver),
            registry: TransactionTypeRegistry::with_builtin_types(),
            node_id: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &NetworkConfig {
        &self.core.config
    }

    /// Bound listener address, once open.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.core.endpoint().map(|e| e.local_addr())
    }

    /// Connection string other nodes should dial, once open.
    #[must_use]
    pub fn connection_address(&self) -> Option<String> {
        self.core.own_address()
    }

    /// Add a peer address directly, bypassing discovery.
    pub fn add_known_peer(&self, address: impl Into<String>) -> bool {
        self.core.directory.add_known(KnownPeer::new(address))
    }

    /// Run one discover / advertise / connect-out pass now.
    pub async fn run_housekeeping(&self) {
        self.core.housekeeping_pass().await;
    }

    /// Push the known-peer list to every discovery service now.
    pub async fn share_peers(&self) {
        self.core.share_peers().await;
    }

    async fn broadcast(&self, op: MessageOp, payload: Bytes) -> usize {
        let inbound = self.core.directory.snapshot_inbound_ids();
        let outbound = self.core.directory.snapshot_outbound_ids();
        let plan = plan_broadcast(op, self.core.relay_context(None, &inbound, &outbound));
        Arc::clone(&self.core).deliver(plan, payload).await
    }
}

#[async_trait]
impl PeerNetworkApi for TcpPeerNetwork {
    fn node_id(&self) -> NodeId {
        self.core.node_id
    }

    async fn open(&self) -> Result<(), PeerNetworkError> {
        if self.core.closed.load(Ordering::SeqCst) {
            return Err(PeerNetworkError::NotOpen);
        }
        if self.core.opened.swap(true, Ordering::SeqCst) {
            return Err(PeerNetworkError::AlreadyOpen);
        }

        let (endpoint, frames) = match InboundEndpoint::bind(&self.core.config).await {
            Ok(bound) => bound,
            Err(e) => {
                self.core.opened.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let own_address = self.core.resolve_own_address(endpoint.local_addr());
        *self.core.own_address.write() = own_address.clone();
        *self.core.endpoint.write() = Some(endpoint);

        let reactor = tokio::spawn(Arc::clone(&self.core).run_listener_reactor(frames));
        let mut tasks = self.core.spawn_timers();
        tasks.push(reactor);
        self.core.tasks.lock().extend(tasks);

        info!(
            node_id = %self.core.node_id,
            address = own_address.as_deref().unwrap_or("unknown"),
            "[peer-network] Peer network open"
        );

        self.core.housekeeping_pass().await;
        Ok(())
    }

    async fn close(&self) {
        if !self.core.opened.load(Ordering::SeqCst) || self.core.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("[peer-network] Closing peer network");

        let inbound = self.core.directory.snapshot_inbound_ids();
        let farewells = inbound
            .into_iter()
            .map(|id| self.core.send(Route::Inbound(id), MessageOp::Disconnect, ORIGIN_HOP, Bytes::new()));
        let failed = join_all(farewells).await.into_iter().filter(Result::is_err).count();
        if failed > 0 {
            debug!("[peer-network] {} inbound peers missed the disconnect", failed);
        }

        for peer in self.core.directory.drain_outbound() {
            let _ = self
                .core
                .send(
                    Route::Outbound(Arc::clone(&peer.connection)),
                    MessageOp::Disconnect,
                    ORIGIN_HOP,
                    Bytes::new(),
                )
                .await;
            peer.connection.close().await;
        }

        self.core.shutdown.send_replace(true);
        let endpoint = self.core.endpoint.write().take();
        if let Some(endpoint) = endpoint {
            endpoint.shutdown().await;
        }
        for task in self.core.tasks.lock().drain(..) {
            task.abort();
        }
        info!("[peer-network] Peer network closed");
    }

    async fn broadcast_tail(&self, block: &Block) -> Result<(), PeerNetworkError> {
        let payload = self.core.codec.encode_block(block)?;
        let reached = self.broadcast(MessageOp::Tail, payload).await;
        debug!("[peer-network] Tail broadcast reached {} peers", reached);
        Ok(())
    }

    async fn broadcast_transaction(
        &self,
        transaction: &TransactionEnvelope,
    ) -> Result<(), PeerNetworkError> {
        let payload = self.core.codec.encode_transaction(transaction)?;
        let reached = self.broadcast(MessageOp::Txn, payload).await;
        debug!("[peer-network] Transaction broadcast reached {} peers", reached);
        Ok(())
    }

    fn request_next_block(&self, previous_id: Vec<u8>) -> JoinHandle<bool> {
        self.core.request_next_block(previous_id)
    }

    fn connect_out(&self) -> usize {
        self.core.connect_out()
    }

    fn register_block_receiver(&self, receiver: Arc<dyn BlockReceiver>) {
        *self.core.block_receiver.write() = Some(receiver);
    }

    fn register_transaction_receiver(&self, receiver: Arc<dyn TransactionReceiver>) {
        *self.core.transaction_receiver.write() = Some(receiver);
    }

    fn peers_in(&self) -> Vec<ConnectedPeer> {
        self.core.directory.inbound_peers()
    }

    fn peers_out(&self) -> Vec<ConnectedPeer> {
        self.core
            .directory
            .outbound_peers()
            .into_iter()
            .map(|p| p.peer)
            .collect()
    }

    fn known_peers(&self) -> Vec<KnownPeer> {
        self.core.directory.known_peers()
    }
}
