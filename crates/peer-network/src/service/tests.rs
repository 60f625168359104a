//! Tests for TcpPeerNetwork

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;

use super::*;
use crate::adapters::transport::codec::{framed_halves, write_greeting};
use crate::adapters::{FixedAddressResolver, InMemoryBlockRepository, StaticPeerDiscovery};
use crate::domain::{pack_frames, unpack_frames, FrameLayout, WireMessage};

fn network(config: NetworkConfig) -> TcpPeerNetwork {
    TcpPeerNetwork::builder(config, Arc::new(InMemoryBlockRepository::new()))
        .with_address_resolver(Arc::new(FixedAddressResolver(IpAddr::V4(Ipv4Addr::LOCALHOST))))
        .build()
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn test_connect_out_dials_only_the_deficit() {
    let net = network(NetworkConfig::for_testing());
    for i in 0..10 {
        net.add_known_peer(format!("tcp://127.0.0.1:{}", 1 + i));
    }

    assert_eq!(net.connect_out(), 8);
    // Dials are pending until their tasks run; a second top-up adds nothing.
    assert_eq!(net.connect_out(), 0);
}

#[tokio::test]
async fn test_connect_out_respects_custom_target() {
    let config = NetworkConfig {
        target_outbound: 2,
        ..NetworkConfig::for_testing()
    };
    let net = network(config);
    for i in 0..5 {
        net.add_known_peer(format!("tcp://127.0.0.1:{}", 1 + i));
    }
    assert_eq!(net.connect_out(), 2);
}

#[tokio::test]
async fn test_connect_out_tops_up_around_live_peers() {
    let net = network(NetworkConfig::for_testing());
    net.open().await.unwrap();

    let mut remotes = Vec::new();
    for _ in 0..3 {
        let remote = network(NetworkConfig::for_testing());
        remote.open().await.unwrap();
        net.add_known_peer(remote.connection_address().unwrap());
        remotes.push(remote);
    }
    assert_eq!(net.connect_out(), 3);
    eventually("three outbound peers", || net.peers_out().len() == 3).await;

    for i in 0..6 {
        net.add_known_peer(format!("tcp://127.0.0.1:{}", 1 + i));
    }

    // outbound = 3, target = 8: five dials, none towards a live peer.
    assert_eq!(net.connect_out(), 5);
    let directory = &net.core.directory;
    assert_eq!(directory.pending_dial_count(), 5);
    for remote in &remotes {
        let address = remote.connection_address().unwrap();
        assert!(directory.has_live_outbound(&address));
        assert!(!directory.is_dial_pending(&address));
    }

    net.close().await;
    for remote in &remotes {
        remote.close().await;
    }
}

#[tokio::test]
async fn test_connect_out_never_spends_a_slot_on_own_address() {
    let config = NetworkConfig {
        target_outbound: 2,
        ..NetworkConfig::for_testing()
    };
    let net = network(config);
    net.open().await.unwrap();
    net.add_known_peer(net.connection_address().unwrap());
    net.add_known_peer("tcp://127.0.0.1:1");
    net.add_known_peer("tcp://127.0.0.1:2");

    assert_eq!(net.connect_out(), 2);
    assert!(!net.core.directory.is_dial_pending(&net.connection_address().unwrap()));

    net.close().await;
}

#[tokio::test]
async fn test_open_twice_is_rejected_and_close_is_idempotent() {
    let net = network(NetworkConfig::for_testing());
    net.open().await.unwrap();
    assert!(matches!(net.open().await, Err(PeerNetworkError::AlreadyOpen)));
    assert!(net.local_addr().is_some());

    net.close().await;
    net.close().await;
    assert!(matches!(net.open().await, Err(PeerNetworkError::NotOpen)));
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let first = network(NetworkConfig::for_testing());
    first.open().await.unwrap();
    let port = first.local_addr().unwrap().port();

    let second = network(NetworkConfig {
        listen_port: port,
        ..NetworkConfig::for_testing()
    });
    assert!(matches!(second.open().await, Err(PeerNetworkError::Bind { .. })));
    first.close().await;
}

#[tokio::test]
async fn test_own_address_uses_bind_host() {
    let net = network(NetworkConfig::for_testing());
    net.open().await.unwrap();
    let port = net.local_addr().unwrap().port();
    assert_eq!(net.connection_address(), Some(format!("tcp://127.0.0.1:{port}")));
    net.close().await;
}

#[tokio::test]
async fn test_open_runs_discovery_and_advertises() {
    let discovery = Arc::new(StaticPeerDiscovery::new(vec![
        "tcp://127.0.0.1:1".to_string(),
        "tcp://127.0.0.1:2".to_string(),
    ]));
    let config = NetworkConfig {
        public_address: Some("tcp://203.0.113.7:30333".to_string()),
        ..NetworkConfig::for_testing()
    };
    let net = TcpPeerNetwork::builder(config, Arc::new(InMemoryBlockRepository::new()))
        .with_discovery(discovery.clone())
        .build();
    net.open().await.unwrap();

    assert_eq!(net.known_peers().len(), 2);
    let advertised = discovery.advertised();
    assert!(advertised.contains(&net.connection_address().unwrap()));
    assert!(advertised.contains(&"tcp://203.0.113.7:30333".to_string()));

    net.share_peers().await;
    assert_eq!(discovery.last_shared().len(), 2);
    net.close().await;
}

#[tokio::test]
async fn test_handshake_creates_outbound_and_inbound_entries() {
    let a = network(NetworkConfig::for_testing());
    let b = network(NetworkConfig::for_testing());
    a.open().await.unwrap();
    b.open().await.unwrap();

    let b_address = b.connection_address().unwrap();
    a.add_known_peer(b_address.clone());
    assert_eq!(a.connect_out(), 1);

    eventually("outbound peer on A", || {
        a.peers_out().iter().any(|p| p.remote_id == b.node_id())
    })
    .await;
    eventually("inbound peer on B", || {
        b.peers_in().iter().any(|p| p.remote_id == a.node_id())
    })
    .await;

    assert_eq!(a.peers_out()[0].remote_address, b_address);
    assert!(a.known_peers()[0].last_contact.is_some());
    // The live address is not dialed again.
    assert_eq!(a.connect_out(), 0);

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn test_dialing_self_is_dropped() {
    let a = network(NetworkConfig::for_testing());
    a.open().await.unwrap();
    let own = format!("tcp://localhost:{}", a.local_addr().unwrap().port());
    a.add_known_peer(own.clone());
    assert_eq!(a.connect_out(), 1);

    eventually("self dial to end", || !a.core.directory.is_dial_pending(&own)).await;
    assert!(a.peers_out().is_empty());
    a.close().await;
}

#[tokio::test]
async fn test_close_disconnects_peers() {
    let a = network(NetworkConfig::for_testing());
    let b = network(NetworkConfig::for_testing());
    a.open().await.unwrap();
    b.open().await.unwrap();
    a.add_known_peer(b.connection_address().unwrap());
    a.connect_out();
    eventually("inbound peer on B", || !b.peers_in().is_empty()).await;

    a.close().await;
    eventually("B to forget A", || b.peers_in().is_empty()).await;
    b.close().await;
}

#[tokio::test]
async fn test_listener_survives_malformed_frames() {
    let net = network(NetworkConfig::for_testing());
    net.open().await.unwrap();

    let stream = TcpStream::connect(net.local_addr().unwrap()).await.unwrap();
    let (mut reader, mut writer) = framed_halves(stream, 1024 * 1024);
    let client_id = NodeId::random();
    write_greeting(&mut writer, client_id).await.unwrap();

    // Not a frame set at all.
    writer.send(Bytes::from_static(&[5, 0, 0])).await.unwrap();
    // A frame set with an unknown operation.
    let bogus = pack_frames(&[
        Bytes::from_static(&[42]),
        Bytes::copy_from_slice(&0i32.to_le_bytes()),
        Bytes::new(),
    ])
    .unwrap();
    writer.send(bogus).await.unwrap();
    // A valid Connect.
    let connect = WireMessage::new(MessageOp::Connect, 0, Bytes::from_static(b"tcp://somewhere:1"));
    writer.send(connect.to_packet().unwrap()).await.unwrap();

    let packet = tokio::time::timeout(Duration::from_secs(5), reader.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply = WireMessage::from_frames(unpack_frames(packet.freeze()).unwrap(), FrameLayout::FromSender)
        .unwrap();
    assert_eq!(reply.op, MessageOp::Identify);
    assert_eq!(reply.sender, Some(net.node_id()));
    assert_eq!(&reply.payload[..], b"tcp://somewhere:1");
    assert_eq!(net.peers_in().len(), 1);
    assert_eq!(net.peers_in()[0].remote_id, client_id);

    net.close().await;
}
