//! # Peer Network
//!
//! TCP transport and flood relay between blockchain nodes. Blocks,
//! transactions, block requests and peer addresses travel as tagged frame
//! sets; every node keeps a pool of outbound connections topped up from its
//! known-peer list and serves inbound connections on one multiplexed
//! listener.
//!
//! ## Architecture Role
//!
//! ```text
//! [Chain host] ──broadcast_tail / broadcast_transaction──→ [Peer Network]
//!      ↑                                                       │
//!      └──── on_block / on_tail / on_transaction (verdict) ────┘
//!                                                              ↓ flood relay
//!                                                     ┌────────┴────────┐
//!                                                     ↓                 ↓
//!                                                 [Peer A]          [Peer B] ...
//! ```
//!
//! ## Relay rules
//!
//! - Only `Tail` and `Txn` are relayed, and only on an accept-and-relay
//!   verdict.
//! - A hop count of `-1` marks a message as never relayable.
//! - The message never goes back to its origin, nor to this node.
//!
//! ## Usage
//!
//! ```ignore
//! let network = TcpPeerNetwork::builder(NetworkConfig::default(), repository)
//!     .with_discovery(Arc::new(StaticPeerDiscovery::new(seeds)))
//!     .build();
//! network.register_block_receiver(host.clone());
//! network.open().await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod service;

pub use adapters::{
    is_sharable, FixedAddressResolver, InMemoryBlockRepository, LocalAddressResolver,
    StaticPeerDiscovery,
};
pub use domain::*;
pub use errors::{CollaboratorError, PeerNetworkError, TransportError, WireError};
pub use ports::inbound::PeerNetworkApi;
pub use ports::outbound::{
    BlockReceiver, BlockRepository, OwnAddressResolver, PeerDiscoveryService, TransactionReceiver,
};
pub use service::{TcpPeerNetwork, TcpPeerNetworkBuilder};
