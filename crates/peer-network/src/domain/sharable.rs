//! Classification of peer addresses that may be passed on to other peers.
//!
//! IPv4: only loopback and the private ranges (10/8, 127/8, 172.16/12,
//! 192.168/16). IPv6: anything except link-local and site-local.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[must_use]
pub fn is_sharable_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_sharable_v4(v4),
        IpAddr::V6(v6) => is_sharable_v6(v6),
    }
}

fn is_sharable_v4(ip: Ipv4Addr) -> bool {
    match ip.octets() {
        [10, ..] | [127, ..] | [192, 168, ..] => true,
        [172, second, ..] => (16..=31).contains(&second),
        _ => false,
    }
}

fn is_sharable_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let link_local = first & 0xffc0 == 0xfe80;
    let site_local = first & 0xffc0 == 0xfec0;
    !link_local && !site_local
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sharable(s: &str) -> bool {
        is_sharable_ip(s.parse().unwrap())
    }

    #[test]
    fn test_private_ipv4_ranges() {
        assert!(sharable("10.0.0.5"));
        assert!(sharable("127.0.0.1"));
        assert!(sharable("192.168.1.20"));
        assert!(sharable("172.16.0.1"));
        assert!(sharable("172.31.255.254"));
    }

    #[test]
    fn test_public_and_edge_ipv4() {
        assert!(!sharable("8.8.8.8"));
        assert!(!sharable("172.15.0.1"));
        assert!(!sharable("172.32.0.1"));
        assert!(!sharable("192.169.0.1"));
        assert!(!sharable("11.0.0.1"));
    }

    #[test]
    fn test_ipv6_scopes() {
        assert!(sharable("::1"));
        assert!(sharable("2001:db8::1"));
        assert!(!sharable("fe80::1"));
        assert!(!sharable("febf::1"));
        assert!(!sharable("fec0::1"));
        assert!(!sharable("feff::1"));
    }
}
