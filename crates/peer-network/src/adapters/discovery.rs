//! Seed-list peer discovery.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::KnownPeer;
use crate::errors::CollaboratorError;
use crate::ports::PeerDiscoveryService;

/// Discovery backed by a fixed seed list.
///
/// Advertised and shared addresses are recorded, not published anywhere.
#[derive(Debug, Default)]
pub struct StaticPeerDiscovery {
    seeds: Vec<String>,
    advertised: RwLock<Vec<String>>,
    last_shared: RwLock<Vec<KnownPeer>>,
}

impl StaticPeerDiscovery {
    #[must_use]
    pub fn new(seeds: Vec<String>) -> Self {
        Self {
            seeds,
            ..Self::default()
        }
    }

    /// Addresses passed to `advertise_local` / `advertise_global`.
    #[must_use]
    pub fn advertised(&self) -> Vec<String> {
        self.advertised.read().clone()
    }

    /// The peer list from the last `share_peer_list` call.
    #[must_use]
    pub fn last_shared(&self) -> Vec<KnownPeer> {
        self.last_shared.read().clone()
    }
}

#[async_trait]
impl PeerDiscoveryService for StaticPeerDiscovery {
    async fn discover(&self) -> Result<Vec<KnownPeer>, CollaboratorError> {
        Ok(self.seeds.iter().map(KnownPeer::new).collect())
    }

    async fn advertise_local(&self, address: &str) -> Result<(), CollaboratorError> {
        debug!("[discovery] Local address {}", address);
        let mut advertised = self.advertised.write();
        if !advertised.iter().any(|a| a == address) {
            advertised.push(address.to_string());
        }
        Ok(())
    }

    async fn advertise_global(&self, address: &str) -> Result<(), CollaboratorError> {
        info!("[discovery] Public address {}", address);
        let mut advertised = self.advertised.write();
        if !advertised.iter().any(|a| a == address) {
            advertised.push(address.to_string());
        }
        Ok(())
    }

    async fn share_peer_list(&self, peers: Vec<KnownPeer>) -> Result<(), CollaboratorError> {
        debug!("[discovery] Sharing {} known peers", peers.len());
        *self.last_shared.write() = peers;
        Ok(())
    }
}
