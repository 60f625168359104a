//! Ports: the API this crate offers and the collaborators it needs.

pub mod inbound;
pub mod outbound;

pub use inbound::PeerNetworkApi;
pub use outbound::{
    BlockReceiver, BlockRepository, OwnAddressResolver, PeerDiscoveryService, TransactionReceiver,
};
