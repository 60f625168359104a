//! # Catch-up Scenarios
//!
//! A node that sees a tail it cannot link reports a gap and pulls the
//! missing blocks one successor at a time.

use std::time::Duration;

use node_runtime::BlockAcceptance;

use super::harness::{chain, eventually, TestNode};

const SYNC_LIMIT: Duration = Duration::from_secs(15);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_late_joiner_catches_up_on_next_tail() {
    let a = TestNode::start(&[]).await;
    let blocks = chain(6);
    for block in &blocks[..5] {
        assert_eq!(
            a.runtime.publish_tail(block.clone()).await.unwrap(),
            BlockAcceptance::Stored
        );
    }

    let late = TestNode::start(&[&a]).await;
    late.wait_linked_to(&a).await;
    assert_eq!(late.block_count(), 0);

    // The new tail does not link on the joiner; the gap pulls the chain.
    a.runtime.publish_tail(blocks[5].clone()).await.unwrap();
    eventually("joiner synced", SYNC_LIMIT, || late.block_count() == 6).await;

    assert_eq!(late.height(), Some(5));
    for block in &blocks {
        assert!(late.has_block(block));
    }

    late.stop().await;
    a.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gap_is_filled_through_an_inbound_peer() {
    // The joiner is dialed by the holder instead of dialing it.
    let joiner = TestNode::start(&[]).await;
    let holder = TestNode::start(&[&joiner]).await;
    holder.wait_linked_to(&joiner).await;

    let blocks = chain(4);
    for block in &blocks[..3] {
        holder.runtime.host().offer_block(block.clone());
    }
    holder.runtime.publish_tail(blocks[3].clone()).await.unwrap();

    eventually("joiner synced", SYNC_LIMIT, || joiner.block_count() == 4).await;
    assert_eq!(joiner.height(), Some(3));

    holder.stop().await;
    joiner.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_chain_only_fetches_the_missing_part() {
    let a = TestNode::start(&[]).await;
    let b = TestNode::start(&[&a]).await;
    b.wait_linked_to(&a).await;

    let blocks = chain(5);
    for block in &blocks[..4] {
        a.runtime.host().offer_block(block.clone());
    }
    for block in &blocks[..2] {
        b.runtime.host().offer_block(block.clone());
    }

    a.runtime.publish_tail(blocks[4].clone()).await.unwrap();
    eventually("b synced", SYNC_LIMIT, || b.block_count() == 5).await;
    assert_eq!(b.height(), Some(4));

    b.stop().await;
    a.stop().await;
}
