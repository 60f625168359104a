//! # Propagation Scenarios
//!
//! Tails and transactions published on one node reach every node of a
//! connected topology, whichever direction the connections were dialed.

use std::time::Duration;

use super::harness::{chain, eventually, transfer, TestNode};

const PROPAGATION_LIMIT: Duration = Duration::from_secs(5);

/// A <- B <- C <- D, each node dialing its predecessor.
async fn line_of_four() -> [TestNode; 4] {
    let a = TestNode::start(&[]).await;
    let b = TestNode::start(&[&a]).await;
    b.wait_linked_to(&a).await;
    let c = TestNode::start(&[&b]).await;
    c.wait_linked_to(&b).await;
    let d = TestNode::start(&[&c]).await;
    d.wait_linked_to(&c).await;
    [a, b, c, d]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tails_flood_down_a_line() {
    let nodes = line_of_four().await;
    let blocks = chain(3);

    for block in &blocks {
        nodes[0].runtime.publish_tail(block.clone()).await.unwrap();
        eventually("tail at the far end", PROPAGATION_LIMIT, || nodes[3].has_block(block)).await;
    }

    for node in &nodes {
        assert_eq!(node.block_count(), 3);
        assert_eq!(node.height(), Some(2));
    }
    for node in &nodes {
        node.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tail_from_the_leaf_floods_upstream() {
    let nodes = line_of_four().await;
    let genesis = chain(1).remove(0);

    nodes[3].runtime.publish_tail(genesis.clone()).await.unwrap();
    eventually("tail at the root", PROPAGATION_LIMIT, || nodes[0].has_block(&genesis)).await;

    for node in &nodes {
        node.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transaction_reaches_every_node_once() {
    let a = TestNode::start(&[]).await;
    let b = TestNode::start(&[&a]).await;
    let c = TestNode::start(&[&a, &b]).await;
    b.wait_linked_to(&a).await;
    c.wait_linked_to(&a).await;
    c.wait_linked_to(&b).await;

    assert!(b.runtime.publish_transaction(transfer(10)).await.unwrap());

    for node in [&a, &c] {
        eventually("transaction accepted", PROPAGATION_LIMIT, || {
            node.runtime.host().transaction_count() == 1
        })
        .await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    for node in [&a, &b, &c] {
        assert_eq!(node.runtime.host().transaction_count(), 1);
    }

    for node in [&a, &b, &c] {
        node.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_republishing_a_known_transaction_is_a_no_op() {
    let a = TestNode::start(&[]).await;
    let txn = transfer(5);
    assert!(a.runtime.publish_transaction(txn.clone()).await.unwrap());
    assert!(!a.runtime.publish_transaction(txn).await.unwrap());
    a.stop().await;
}
