//! # Peer Directory
//!
//! Book-keeping of every peer this node knows about:
//!
//! - **known**: FIFO of addresses, rotated round-robin, never shrinks.
//! - **inbound**: peers that dialed us, keyed by identity.
//! - **outbound**: peers we dialed, keyed by identity, owning a connection.
//! - **address ids**: connection address → identity learned at handshake.
//! - **pending dials**: addresses with a dial in flight.
//!
//! All state sits behind one lock that is never held across an `.await`.
//! Concurrent add/remove of the same key resolves last-write-wins.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::RwLock;

use crate::domain::entities::{ConnectedPeer, KnownPeer, NodeId, OutboundPeer};

struct DirectoryState<C> {
    known: VecDeque<KnownPeer>,
    inbound: HashMap<NodeId, ConnectedPeer>,
    outbound: HashMap<NodeId, OutboundPeer<C>>,
    address_ids: HashMap<String, NodeId>,
    pending_dials: HashSet<String>,
}

impl<C> DirectoryState<C> {
    fn has_live_outbound(&self, address: &str) -> bool {
        self.address_ids
            .get(address)
            .is_some_and(|id| self.outbound.contains_key(id))
    }

    fn is_dialable(&self, address: &str) -> bool {
        !self.has_live_outbound(address) && !self.pending_dials.contains(address)
    }
}

/// Shared peer book-keeping. `C` is the outbound connection handle.
pub struct PeerDirectory<C> {
    state: RwLock<DirectoryState<C>>,
}

impl<C> Default for PeerDirectory<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PeerDirectory<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState {
                known: VecDeque::new(),
                inbound: HashMap::new(),
                outbound: HashMap::new(),
                address_ids: HashMap::new(),
                pending_dials: HashSet::new(),
            }),
        }
    }

    // =========================================================================
    // Known peers
    // =========================================================================

    /// Add a known peer. Returns `false` if its address was already known.
    pub fn add_known(&self, peer: KnownPeer) -> bool {
        let mut state = self.state.write();
        if state
            .known
            .iter()
            .any(|p| p.connection_address == peer.connection_address)
        {
            return false;
        }
        state.known.push_back(peer);
        true
    }

    /// Take up to `n` dialable peers in round-robin order.
    ///
    /// Every known peer is visited at most once. Visited peers move to the
    /// back of the queue whether or not they are returned; peers mapped to a
    /// live outbound connection or with a dial in flight are skipped.
    pub fn rotate_next(&self, n: usize) -> Vec<KnownPeer> {
        self.rotate_next_excluding(n, None)
    }

    /// [`Self::rotate_next`], also skipping `own_address` so it never uses
    /// up a slot.
    pub fn rotate_next_excluding(&self, n: usize, own_address: Option<&str>) -> Vec<KnownPeer> {
        let mut state = self.state.write();
        let mut picked = Vec::with_capacity(n);
        let mut visited = 0;
        let total = state.known.len();
        while picked.len() < n && visited < total {
            visited += 1;
            let Some(peer) = state.known.pop_front() else {
                break;
            };
            if own_address != Some(peer.connection_address.as_str())
                && state.is_dialable(&peer.connection_address)
            {
                picked.push(peer.clone());
            }
            state.known.push_back(peer);
        }
        picked
    }

    #[must_use]
    pub fn known_peers(&self) -> Vec<KnownPeer> {
        self.state.read().known.iter().cloned().collect()
    }

    #[must_use]
    pub fn known_count(&self) -> usize {
        self.state.read().known.len()
    }

    // =========================================================================
    // Dials
    // =========================================================================

    /// Claim `address` for a dial. `false` if it is live or already pending.
    pub fn begin_dial(&self, address: &str) -> bool {
        let mut state = self.state.write();
        if !state.is_dialable(address) {
            return false;
        }
        state.pending_dials.insert(address.to_string());
        true
    }

    /// Release a dial claim.
    pub fn end_dial(&self, address: &str) {
        self.state.write().pending_dials.remove(address);
    }

    #[must_use]
    pub fn is_dial_pending(&self, address: &str) -> bool {
        self.state.read().pending_dials.contains(address)
    }

    #[must_use]
    pub fn pending_dial_count(&self) -> usize {
        self.state.read().pending_dials.len()
    }

    #[must_use]
    pub fn has_live_outbound(&self, address: &str) -> bool {
        self.state.read().has_live_outbound(address)
    }

    /// Identity learned for `address` at its last handshake.
    #[must_use]
    pub fn identity_for(&self, address: &str) -> Option<NodeId> {
        self.state.read().address_ids.get(address).copied()
    }

    // =========================================================================
    // Outbound peers
    // =========================================================================

    /// Promote a completed handshake into a live outbound peer.
    ///
    /// Rejected (the peer is handed back so its connection can be closed)
    /// when the identity is already live, or when `address` already maps to
    /// another live identity. On success the dial claim is released and the
    /// known peer's last contact is stamped with `now_secs`.
    pub fn register_outbound(
        &self,
        address: &str,
        peer: OutboundPeer<C>,
        now_secs: u64,
    ) -> Result<(), OutboundPeer<C>> {
        let mut state = self.state.write();
        let id = peer.remote_id();
        if state.outbound.contains_key(&id) || state.has_live_outbound(address) {
            return Err(peer);
        }
        state.outbound.insert(id, peer);
        state.address_ids.insert(address.to_string(), id);
        state.pending_dials.remove(address);
        if let Some(known) = state
            .known
            .iter_mut()
            .find(|p| p.connection_address == address)
        {
            known.last_contact = Some(now_secs);
        }
        Ok(())
    }

    /// Remove `id` only if its entry still satisfies `still_ours`.
    pub fn remove_outbound_if(
        &self,
        id: &NodeId,
        still_ours: impl FnOnce(&C) -> bool,
    ) -> Option<OutboundPeer<C>> {
        let mut state = self.state.write();
        if state
            .outbound
            .get(id)
            .is_some_and(|peer| still_ours(&peer.connection))
        {
            state.outbound.remove(id)
        } else {
            None
        }
    }

    /// Remove every outbound peer.
    pub fn drain_outbound(&self) -> Vec<OutboundPeer<C>> {
        self.state.write().outbound.drain().map(|(_, p)| p).collect()
    }

    #[must_use]
    pub fn outbound_count(&self) -> usize {
        self.state.read().outbound.len()
    }

    #[must_use]
    pub fn snapshot_outbound_ids(&self) -> Vec<NodeId> {
        self.state.read().outbound.keys().copied().collect()
    }

    // =========================================================================
    // Inbound peers
    // =========================================================================

    /// Insert or refresh an inbound peer.
    pub fn touch_inbound(&self, peer: ConnectedPeer) {
        self.state.write().inbound.insert(peer.remote_id, peer);
    }

    pub fn remove_inbound(&self, id: &NodeId) -> Option<ConnectedPeer> {
        self.state.write().inbound.remove(id)
    }

    #[must_use]
    pub fn inbound_peers(&self) -> Vec<ConnectedPeer> {
        self.state.read().inbound.values().cloned().collect()
    }

    #[must_use]
    pub fn snapshot_inbound_ids(&self) -> Vec<NodeId> {
        self.state.read().inbound.keys().copied().collect()
    }
}

impl<C: Clone> PeerDirectory<C> {
    #[must_use]
    pub fn outbound(&self, id: &NodeId) -> Option<OutboundPeer<C>> {
        self.state.read().outbound.get(id).cloned()
    }

    #[must_use]
    pub fn outbound_peers(&self) -> Vec<OutboundPeer<C>> {
        self.state.read().outbound.values().cloned().collect()
    }
}
