//! # Relaynet Node
//!
//! Runs one node: an in-memory chain behind the flood-relay peer network.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG` respected, default `info`)
//! 2. Load configuration (file from the first argument or
//!    `RELAYNET_CONFIG`, then `RELAYNET_*` overrides)
//! 3. Start the runtime and wait for Ctrl+C
//! 4. Close the network

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::container::CONFIG_PATH_ENV;
use node_runtime::{NodeConfig, NodeRuntime};

/// Load configuration from the config file (if any) and environment.
fn load_config() -> Result<NodeConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok());

    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            NodeConfig::load(&path).with_context(|| format!("Invalid configuration in {path}"))?
        }
        None => NodeConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config()?;
    info!(
        port = config.network.listen_port,
        target_outbound = config.network.target_outbound,
        seeds = config.seeds.len(),
        "Configuration loaded"
    );

    let runtime = NodeRuntime::new(config);
    if let Err(e) = runtime.start().await {
        error!("Node failed to start: {:#}", e);
        return Err(e);
    }

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
