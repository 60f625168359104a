//! # Churn Scenarios
//!
//! Peers leave, outbound slots free up, and the top-up keeps the outbound
//! pool at its target.

use std::time::Duration;

use peer_network::{NetworkConfig, PeerNetworkApi};

use super::harness::{chain, eventually, TestNode};

const LIMIT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_departing_hub_is_dropped_and_spokes_can_relink() {
    let hub = TestNode::start(&[]).await;
    let left = TestNode::start(&[&hub]).await;
    let right = TestNode::start(&[&hub]).await;
    left.wait_linked_to(&hub).await;
    right.wait_linked_to(&hub).await;

    hub.stop().await;
    for spoke in [&left, &right] {
        eventually("hub dropped", LIMIT, || spoke.runtime.network().peers_out().is_empty()).await;
    }

    left.runtime.network().add_known_peer(right.address());
    left.runtime.network().connect_out();
    left.wait_linked_to(&right).await;

    let genesis = chain(1).remove(0);
    right.runtime.publish_tail(genesis.clone()).await.unwrap();
    eventually("tail over the new link", LIMIT, || left.has_block(&genesis)).await;

    left.stop().await;
    right.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_outbound_pool_stays_at_target() {
    let mut seeds = Vec::new();
    for _ in 0..4 {
        seeds.push(TestNode::start(&[]).await);
    }
    let config = NetworkConfig {
        target_outbound: 2,
        ..NetworkConfig::for_testing()
    };
    let seed_refs: Vec<&TestNode> = seeds.iter().collect();
    let node = TestNode::start_with(config, &seed_refs).await;

    eventually("two outbound peers", LIMIT, || node.runtime.network().peers_out().len() == 2).await;
    assert_eq!(node.runtime.network().connect_out(), 0);
    assert_eq!(node.runtime.network().known_peers().len(), 4);

    // Losing one connection frees exactly one slot, filled from the rest.
    let connected: Vec<_> = node
        .runtime
        .network()
        .peers_out()
        .into_iter()
        .map(|peer| peer.remote_id)
        .collect();
    let departing = seeds
        .iter()
        .find(|seed| connected.contains(&seed.id()))
        .expect("one seed is connected");
    departing.stop().await;
    eventually("slot freed", LIMIT, || node.runtime.network().peers_out().len() == 1).await;

    node.runtime.network().run_housekeeping().await;
    eventually("slot refilled", LIMIT, || node.runtime.network().peers_out().len() == 2).await;
    assert!(!node.is_connected_out_to(departing));

    node.stop().await;
    for seed in &seeds {
        seed.stop().await;
    }
}
