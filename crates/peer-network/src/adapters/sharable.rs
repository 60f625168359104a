//! Sharable-address filter for peer addresses received from other peers.

use std::net::IpAddr;

use tokio::net::lookup_host;
use tracing::debug;
use url::{Host, Url};

use crate::domain::is_sharable_ip;

/// Whether `address` may enter the known-peer list.
///
/// DNS names are resolved and the first address decides. Anything that
/// does not parse or resolve is not sharable.
pub async fn is_sharable(address: &str) -> bool {
    let Ok(url) = Url::parse(address) else {
        return false;
    };
    let ip: IpAddr = match url.host() {
        Some(Host::Ipv4(ip)) => ip.into(),
        Some(Host::Ipv6(ip)) => ip.into(),
        Some(Host::Domain(name)) => {
            if let Ok(ip) = name.parse() {
                ip
            } else {
                let port = url.port_or_known_default().unwrap_or(0);
                match lookup_host((name, port)).await {
                    Ok(mut resolved) => match resolved.next() {
                        Some(socket) => socket.ip(),
                        None => return false,
                    },
                    Err(e) => {
                        debug!("[peer-network] Cannot resolve {}: {}", name, e);
                        return false;
                    }
                }
            }
        }
        None => return false,
    };
    is_sharable_ip(ip)
}
