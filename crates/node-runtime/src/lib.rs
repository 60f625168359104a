//! # Node Runtime Library
//!
//! This library exposes the node's building blocks for testing.
//! The main entry point is the `main.rs` binary.

pub mod adapters;
pub mod container;

pub use adapters::{BlockAcceptance, ChainHost};
pub use container::{ConfigError, NodeConfig, NodeRuntime};
