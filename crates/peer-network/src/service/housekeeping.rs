//! Periodic maintenance: discovery, advertisement, outbound top-up and
//! peer-list sharing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::NetworkCore;
use crate::adapters::transport::wait_until_set;

impl NetworkCore {
    /// Start the housekeeping and share timers. Both stop on shutdown.
    pub(crate) fn spawn_timers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let housekeeping = {
            let core = Arc::clone(self);
            self.spawn_timer("housekeeping", self.config.housekeeping_interval, move || {
                let core = Arc::clone(&core);
                async move { core.housekeeping_pass().await }
            })
        };
        let share = {
            let core = Arc::clone(self);
            self.spawn_timer("peer-share", self.config.share_interval, move || {
                let core = Arc::clone(&core);
                async move { core.share_peers().await }
            })
        };
        vec![housekeeping, share]
    }

    fn spawn_timer<F, Fut>(&self, name: &'static str, period: Duration, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let stop = wait_until_set(self.shutdown.subscribe());
        tokio::spawn(async move {
            tokio::pin!(stop);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => tick().await,
                }
            }
            debug!(timer = name, "[peer-network] Timer stopped");
        })
    }

    /// Discover, advertise, then top up outbound connections.
    pub(crate) async fn housekeeping_pass(self: &Arc<Self>) {
        let learned = self.discover_peers().await;
        if learned > 0 {
            debug!(learned, "[peer-network] Discovered new peers");
        }
        self.advertise().await;
        self.connect_out();
    }

    /// Query every discovery service concurrently. Returns how many new
    /// addresses were added.
    async fn discover_peers(&self) -> usize {
        let results = join_all(self.discovery.iter().map(|service| service.discover())).await;
        let mut learned = 0;
        for result in results {
            match result {
                Ok(peers) => {
                    learned += peers
                        .into_iter()
                        .filter(|peer| self.directory.add_known(peer.clone()))
                        .count();
                }
                Err(e) => warn!("[peer-network] Discovery failed: {}", e),
            }
        }
        learned
    }

    async fn advertise(&self) {
        let local = self.own_address();
        let global = self.config.public_address.clone();
        for service in &self.discovery {
            if let Some(address) = &local {
                if let Err(e) = service.advertise_local(address).await {
                    warn!("[peer-network] Local advertisement failed: {}", e);
                }
            }
            if let Some(address) = &global {
                if let Err(e) = service.advertise_global(address).await {
                    warn!("[peer-network] Global advertisement failed: {}", e);
                }
            }
        }
    }

    /// Push the known-peer list to every discovery service.
    pub(crate) async fn share_peers(&self) {
        let peers = self.directory.known_peers();
        let shares = self
            .discovery
            .iter()
            .map(|service| service.share_peer_list(peers.clone()));
        for result in join_all(shares).await {
            if let Err(e) = result {
                warn!("[peer-network] Peer-list share failed: {}", e);
            }
        }
    }
}
