//! # Relaynet Test Suite
//!
//! Multi-node scenarios run against real `NodeRuntime` instances on
//! loopback, plus wire benchmarks.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── wire_benchmarks.rs   # Frame packing, payload codec, rotation
//! └── src/integration/
//!     ├── harness.rs           # Node spawning and polling helpers
//!     ├── propagation.rs       # Tail and transaction flooding
//!     ├── catch_up.rs          # Gap detection and chain sync
//!     └── churn.rs             # Peers leaving, redials, outbound target
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relaynet-tests
//! cargo test -p relaynet-tests integration::catch_up
//! cargo bench -p relaynet-tests
//! ```

pub mod integration;
