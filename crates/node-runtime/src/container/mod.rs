//! # Node Container
//!
//! Configuration and the runtime that owns every long-lived component.

pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig, CONFIG_PATH_ENV};
pub use runtime::NodeRuntime;
