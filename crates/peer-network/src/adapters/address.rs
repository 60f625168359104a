//! Own-address resolvers.

use std::net::IpAddr;

use tracing::warn;

use crate::ports::OwnAddressResolver;

/// Picks the primary interface address via the OS routing table.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalAddressResolver;

impl OwnAddressResolver for LocalAddressResolver {
    fn preferred_local_address(&self) -> Option<IpAddr> {
        match local_ip_address::local_ip() {
            Ok(ip) => Some(ip),
            Err(e) => {
                warn!("[peer-network] Cannot determine local address: {}", e);
                None
            }
        }
    }
}

/// Always answers the same address.
#[derive(Debug, Clone, Copy)]
pub struct FixedAddressResolver(pub IpAddr);

impl OwnAddressResolver for FixedAddressResolver {
    fn preferred_local_address(&self) -> Option<IpAddr> {
        Some(self.0)
    }
}
