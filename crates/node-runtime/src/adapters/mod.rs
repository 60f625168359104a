//! Port implementations the node plugs into the peer network.

pub mod chain_host;

pub use chain_host::{BlockAcceptance, ChainHost};
