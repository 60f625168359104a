//! Adapters: TCP transport and ready-made collaborator implementations.

pub mod address;
pub mod discovery;
pub mod memory_repository;
pub mod sharable;
pub mod transport;

pub use address::{FixedAddressResolver, LocalAddressResolver};
pub use discovery::StaticPeerDiscovery;
pub use memory_repository::InMemoryBlockRepository;
pub use sharable::is_sharable;
