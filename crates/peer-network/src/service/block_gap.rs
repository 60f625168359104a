//! Block-gap recovery: ask peers one at a time for a missing successor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::{NetworkCore, Route};
use crate::domain::{MessageOp, ORIGIN_HOP};
use crate::errors::TransportError;
use crate::ports::BlockRepository;

impl NetworkCore {
    pub(crate) fn request_next_block(self: &Arc<Self>, previous_id: Vec<u8>) -> JoinHandle<bool> {
        let core = Arc::clone(self);
        tokio::spawn(async move {
            let candidates = core.gap_candidates();
            let request = Bytes::from(previous_id.clone());
            let found = sweep_for_successor(
                candidates,
                &previous_id,
                core.repository.as_ref(),
                core.config.gap_grace_period,
                core.config.gap_poll_interval,
                |route| core.send(route.clone(), MessageOp::BlockRequest, ORIGIN_HOP, request.clone()),
            )
            .await;
            debug!(found, "[peer-network] Block-gap sweep finished");
            found
        })
    }

    /// Inbound peers first, then outbound, never this node.
    fn gap_candidates(&self) -> Vec<Route> {
        let inbound = self
            .directory
            .snapshot_inbound_ids()
            .into_iter()
            .filter(|id| *id != self.node_id)
            .map(Route::Inbound);
        let outbound = self
            .directory
            .outbound_peers()
            .into_iter()
            .filter(|peer| peer.remote_id() != self.node_id)
            .map(|peer| Route::Outbound(peer.connection));
        inbound.chain(outbound).collect()
    }
}

/// Request the successor of `previous_id` from each candidate in turn.
///
/// After each request the repository is polled every `poll` for up to
/// `grace`. Returns `true` as soon as the successor is stored, `false` once
/// every candidate had its turn.
pub(crate) async fn sweep_for_successor<R, F, Fut>(
    candidates: Vec<R>,
    previous_id: &[u8],
    repository: &dyn BlockRepository,
    grace: Duration,
    poll: Duration,
    mut request: F,
) -> bool
where
    F: FnMut(&R) -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
{
    if successor_stored(repository, previous_id).await {
        return true;
    }
    for candidate in &candidates {
        if let Err(e) = request(candidate).await {
            debug!("[peer-network] Block request not sent: {}", e);
            continue;
        }
        let deadline = Instant::now() + grace;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(poll.min(deadline - now)).await;
            if successor_stored(repository, previous_id).await {
                return true;
            }
        }
    }
    false
}

async fn successor_stored(repository: &dyn BlockRepository, previous_id: &[u8]) -> bool {
    match repository.next_block_after(previous_id).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            warn!("[peer-network] Repository lookup failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBlockRepository;
    use parking_lot::Mutex;
    use shared_types::{Block, BlockHeader};

    fn successor_of(previous: u8) -> Block {
        Block::new(
            BlockHeader {
                block_id: vec![previous + 1],
                previous_block_id: vec![previous],
                height: u64::from(previous) + 1,
                ..Default::default()
            },
            vec![],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_first_peer_supplies_block() {
        let repo = Arc::new(InMemoryBlockRepository::new());
        let asked = Mutex::new(Vec::new());

        let found = sweep_for_successor(
            vec![1u8, 2, 3],
            &[9],
            repo.as_ref(),
            Duration::from_secs(5),
            Duration::from_millis(250),
            |peer| {
                asked.lock().push(*peer);
                let repo = Arc::clone(&repo);
                async move {
                    repo.add_block(successor_of(9));
                    Ok(())
                }
            },
        )
        .await;

        assert!(found);
        assert_eq!(*asked.lock(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_on_after_grace_period() {
        let repo = Arc::new(InMemoryBlockRepository::new());
        let asked = Mutex::new(Vec::new());
        let started = Instant::now();

        let found = sweep_for_successor(
            vec![1u8, 2, 3],
            &[9],
            repo.as_ref(),
            Duration::from_secs(5),
            Duration::from_millis(250),
            |peer| {
                let peer = *peer;
                asked.lock().push(peer);
                let repo = Arc::clone(&repo);
                async move {
                    if peer == 2 {
                        repo.add_block(successor_of(9));
                    }
                    Ok(())
                }
            },
        )
        .await;

        assert!(found);
        assert_eq!(*asked.lock(), vec![1, 2]);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_silently() {
        let repo = InMemoryBlockRepository::new();
        let found = sweep_for_successor(
            vec![1u8, 2],
            &[9],
            &repo,
            Duration::from_secs(5),
            Duration::from_millis(250),
            |_| async { Ok(()) },
        )
        .await;
        assert!(!found);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_present_needs_no_request() {
        let repo = InMemoryBlockRepository::new();
        repo.add_block(successor_of(9));
        let mut requests = 0;
        let found = sweep_for_successor(
            vec![1u8],
            &[9],
            &repo,
            Duration::from_secs(5),
            Duration::from_millis(250),
            |_| {
                requests += 1;
                async { Ok(()) }
            },
        )
        .await;
        assert!(found);
        assert_eq!(requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_skips_to_next_peer_immediately() {
        let repo = InMemoryBlockRepository::new();
        let started = Instant::now();
        let found = sweep_for_successor(
            vec![1u8, 2],
            &[9],
            &repo,
            Duration::from_secs(5),
            Duration::from_millis(250),
            |_| async { Err(TransportError::Closed) },
        )
        .await;
        assert!(!found);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
