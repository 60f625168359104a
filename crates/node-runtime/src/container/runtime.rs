//! # Node Runtime
//!
//! Wires the peer network to the chain host.
//!
//! ## Startup Sequence
//!
//! 1. Build repository, host, discovery and network from [`NodeConfig`]
//! 2. Register the host as block and transaction receiver
//! 3. Open the network (bind, first housekeeping pass)
//! 4. Start the catch-up task that turns gap reports into block requests
//!
//! ## Catch-up
//!
//! A gap report starts a sync run: request the successor of the newest
//! stored block, store it, repeat until no peer has one. Reports that
//! arrive during a run are folded into it.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use peer_network::{
    InMemoryBlockRepository, PeerNetworkApi, StaticPeerDiscovery, TcpPeerNetwork,
};
use shared_types::{Block, TransactionEnvelope};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::NodeConfig;
use crate::adapters::{BlockAcceptance, ChainHost};

/// A running node: network, chain host and catch-up task.
pub struct NodeRuntime {
    config: NodeConfig,
    network: TcpPeerNetwork,
    host: Arc<ChainHost>,
    discovery: Arc<StaticPeerDiscovery>,
    gap_reports: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    shutdown_tx: watch::Sender<bool>,
    catch_up: Mutex<Option<JoinHandle<()>>>,
}

impl NodeRuntime {
    /// Assemble a node. Nothing touches the network until [`Self::start`].
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        let repository = Arc::new(InMemoryBlockRepository::new());
        let (host, gap_reports) = ChainHost::new(Arc::clone(&repository));
        let host = Arc::new(host);
        let discovery = Arc::new(StaticPeerDiscovery::new(config.seeds.clone()));

        let network = TcpPeerNetwork::builder(config.network.clone(), repository)
            .with_discovery(discovery.clone())
            .build();
        network.register_block_receiver(host.clone());
        network.register_transaction_receiver(host.clone());

        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            network,
            host,
            discovery,
            gap_reports: Mutex::new(Some(gap_reports)),
            shutdown_tx,
            catch_up: Mutex::new(None),
        }
    }

    /// Open the network and start catch-up.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Relaynet Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let reports = self
            .gap_reports
            .lock()
            .take()
            .context("Node runtime already started")?;

        self.network
            .open()
            .await
            .context("Failed to open peer network")?;

        let task = tokio::spawn(catch_up(
            self.network.clone(),
            Arc::clone(&self.host),
            reports,
            self.shutdown_tx.subscribe(),
        ));
        *self.catch_up.lock() = Some(task);

        info!(
            node_id = %self.network.node_id(),
            address = self.network.connection_address().as_deref().unwrap_or("unknown"),
            seeds = self.config.seeds.len(),
            "Node is up"
        );
        Ok(())
    }

    /// Store a locally produced tail and flood it.
    pub async fn publish_tail(&self, block: Block) -> Result<BlockAcceptance> {
        let acceptance = self.host.offer_block(block.clone());
        if acceptance == BlockAcceptance::Stored {
            self.network
                .broadcast_tail(&block)
                .await
                .context("Failed to broadcast tail")?;
        }
        Ok(acceptance)
    }

    /// Record a locally created transaction and flood it. Returns `false`
    /// if it was already known.
    pub async fn publish_transaction(&self, transaction: TransactionEnvelope) -> Result<bool> {
        if !self.host.offer_transaction(&transaction) {
            return Ok(false);
        }
        self.network
            .broadcast_transaction(&transaction)
            .await
            .context("Failed to broadcast transaction")?;
        Ok(true)
    }

    /// Stop catch-up and close the network.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);
        let task = self.catch_up.lock().take();
        if let Some(task) = task {
            task.abort();
        }
        self.network.close().await;
        info!("Shutdown complete");
    }

    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub fn network(&self) -> &TcpPeerNetwork {
        &self.network
    }

    #[must_use]
    pub fn host(&self) -> &Arc<ChainHost> {
        &self.host
    }

    #[must_use]
    pub fn discovery(&self) -> &Arc<StaticPeerDiscovery> {
        &self.discovery
    }
}

async fn catch_up(
    network: TcpPeerNetwork,
    host: Arc<ChainHost>,
    mut reports: mpsc::UnboundedReceiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            report = reports.recv() => {
                if report.is_none() {
                    break;
                }
                while reports.try_recv().is_ok() {}
                sync_chain(&network, &host).await;
            }
        }
    }
    debug!("Catch-up task stopped");
}

/// Pull successors of the newest block until no peer supplies one.
/// Returns the number of blocks gained.
async fn sync_chain(network: &TcpPeerNetwork, host: &ChainHost) -> usize {
    let mut gained = 0;
    loop {
        let from = host
            .repository()
            .newest()
            .map(|block| block.id().to_vec())
            .unwrap_or_default();
        match network.request_next_block(from.clone()).await {
            Ok(true) => {
                let advanced = host
                    .repository()
                    .newest()
                    .is_some_and(|block| block.id() != from.as_slice());
                if !advanced {
                    break;
                }
                gained += 1;
            }
            Ok(false) => break,
            Err(e) => {
                warn!("Block request task failed: {}", e);
                break;
            }
        }
    }
    if gained > 0 {
        info!(gained, height = ?host.repository().newest().map(|b| b.header.height), "Caught up");
    }
    gained
}
