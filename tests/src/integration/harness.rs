//! Node spawning and polling helpers shared by the scenarios.

use std::time::Duration;

use node_runtime::{NodeConfig, NodeRuntime};
use peer_network::{NetworkConfig, NodeId, PeerNetworkApi};
use shared_types::{Block, BlockHeader, TransactionEnvelope, ValueTransfer};

/// A started node.
pub struct TestNode {
    pub runtime: NodeRuntime,
}

impl TestNode {
    /// Start a node that dials `seeds` during its first housekeeping pass.
    pub async fn start(seeds: &[&TestNode]) -> Self {
        Self::start_with(NetworkConfig::for_testing(), seeds).await
    }

    pub async fn start_with(network: NetworkConfig, seeds: &[&TestNode]) -> Self {
        init_tracing();
        let config = NodeConfig {
            network,
            seeds: seeds.iter().map(|node| node.address()).collect(),
        };
        let runtime = NodeRuntime::new(config);
        runtime.start().await.expect("node should start");
        Self { runtime }
    }

    pub fn id(&self) -> NodeId {
        self.runtime.network().node_id()
    }

    pub fn address(&self) -> String {
        self.runtime
            .network()
            .connection_address()
            .expect("started node has an address")
    }

    pub fn height(&self) -> Option<u64> {
        self.runtime
            .host()
            .repository()
            .newest()
            .map(|block| block.header.height)
    }

    pub fn block_count(&self) -> usize {
        self.runtime.host().repository().len()
    }

    pub fn has_block(&self, block: &Block) -> bool {
        self.runtime.host().repository().contains(block.id())
    }

    pub fn is_connected_out_to(&self, other: &TestNode) -> bool {
        self.runtime
            .network()
            .peers_out()
            .iter()
            .any(|peer| peer.remote_id == other.id())
    }

    pub fn is_connected_in_from(&self, other: &TestNode) -> bool {
        self.runtime
            .network()
            .peers_in()
            .iter()
            .any(|peer| peer.remote_id == other.id())
    }

    /// Wait until this node has dialed `other` and `other` registered it.
    pub async fn wait_linked_to(&self, other: &TestNode) {
        eventually("outbound link", Duration::from_secs(5), || self.is_connected_out_to(other)).await;
        eventually("inbound link", Duration::from_secs(5), || other.is_connected_in_from(self)).await;
    }

    pub async fn stop(&self) {
        self.runtime.shutdown().await;
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Poll `check` every 20ms until it holds or `limit` passes.
pub async fn eventually(what: &str, limit: Duration, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(check(), "timed out waiting for {what}");
}

/// A linked chain of `length` blocks with random ids, genesis first.
pub fn chain(length: usize) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::with_capacity(length);
    for height in 0..length as u64 {
        let previous = blocks
            .last()
            .map(|block| block.id().to_vec())
            .unwrap_or_default();
        blocks.push(Block::new(
            BlockHeader {
                version: 1,
                block_id: rand::random::<[u8; 8]>().to_vec(),
                previous_block_id: previous,
                height,
                timestamp: 1_700_000_000 + height,
                ..Default::default()
            },
            vec![],
        ));
    }
    blocks
}

pub fn transfer(amount: u64) -> TransactionEnvelope {
    TransactionEnvelope::new(
        rand::random::<[u8; 32]>().to_vec(),
        vec![0; 64],
        1_700_000_000,
        ValueTransfer {
            recipient: vec![7; 20],
            amount,
            fee: 1,
        },
    )
}
