//! # Inbound Endpoint
//!
//! One TCP listener multiplexing every inbound connection.
//!
//! Each accepted connection is identified by the token in its greeting.
//! Reader tasks only frame bytes: they prepend the token and forward the
//! frame set to a single channel, so one reactor sees every inbound message
//! in arrival order. All writes go through one lock around the route table.
//! A token keeps the first live route it registered; later connections
//! greeting with the same token are closed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::codec::{framed_halves, read_greeting, PacketWriter};
use super::wait_until_set;
use crate::domain::{unpack_frames, NetworkConfig, NodeId, WireMessage};
use crate::errors::{PeerNetworkError, TransportError};

const INBOUND_QUEUE: usize = 1024;

/// A frame set received on the listener, token frame first.
#[derive(Debug)]
pub struct InboundFrames {
    pub frames: Vec<Bytes>,
    pub remote_addr: SocketAddr,
}

struct Route {
    serial: u64,
    writer: PacketWriter,
}

/// The multiplexed listening socket.
pub struct InboundEndpoint {
    local_addr: SocketAddr,
    routes: Mutex<HashMap<NodeId, Route>>,
    next_serial: AtomicU64,
    shutdown: watch::Sender<bool>,
    accept_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl InboundEndpoint {
    /// Bind and start accepting. Returns the endpoint and the receiving end
    /// of the inbound frame channel.
    pub async fn bind(
        config: &NetworkConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<InboundFrames>), PeerNetworkError> {
        let address = format!("{}:{}", config.bind_host, config.listen_port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| PeerNetworkError::Bind {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| PeerNetworkError::Bind {
            address,
            reason: e.to_string(),
        })?;

        let (shutdown, _) = watch::channel(false);
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        let endpoint = Arc::new(Self {
            local_addr,
            routes: Mutex::new(HashMap::new()),
            next_serial: AtomicU64::new(0),
            shutdown,
            accept_task: parking_lot::Mutex::new(None),
        });

        let task = tokio::spawn(Arc::clone(&endpoint).accept_loop(listener, tx, config.clone()));
        *endpoint.accept_task.lock() = Some(task);

        info!("[peer-network] Listening on {}", local_addr);
        Ok((endpoint, rx))
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn accept_loop(
        self: Arc<Self>,
        listener: TcpListener,
        tx: mpsc::Sender<InboundFrames>,
        config: NetworkConfig,
    ) {
        let stop = wait_until_set(self.shutdown.subscribe());
        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        debug!("[peer-network] Accepted connection from {}", remote_addr);
                        tokio::spawn(Arc::clone(&self).serve_connection(
                            stream,
                            remote_addr,
                            tx.clone(),
                            config.clone(),
                        ));
                    }
                    Err(e) => warn!("[peer-network] Accept failed: {}", e),
                },
            }
        }
        debug!("[peer-network] Accept loop stopped");
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        tx: mpsc::Sender<InboundFrames>,
        config: NetworkConfig,
    ) {
        let (mut reader, mut writer) = framed_halves(stream, config.max_packet_size);
        let token = match read_greeting(&mut reader, config.handshake_timeout).await {
            Ok(token) => token,
            Err(e) => {
                warn!("[peer-network] Dropping {}: bad greeting: {}", remote_addr, e);
                return;
            }
        };

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        {
            let mut routes = self.routes.lock().await;
            if routes.contains_key(&token) {
                drop(routes);
                info!(peer = %token, %remote_addr, "[peer-network] Peer already connected, dropping second connection");
                close_writer(&mut writer, remote_addr).await;
                return;
            }
            routes.insert(token, Route { serial, writer });
        }
        debug!(peer = %token, %remote_addr, "[peer-network] Inbound route registered");

        let token_frame = Bytes::copy_from_slice(token.as_bytes());
        let stop = wait_until_set(self.shutdown.subscribe());
        tokio::pin!(stop);
        loop {
            let packet = tokio::select! {
                _ = &mut stop => break,
                packet = reader.next() => packet,
            };
            match packet {
                Some(Ok(packet)) => match unpack_frames(packet.freeze()) {
                    Ok(mut frames) => {
                        frames.insert(0, token_frame.clone());
                        if tx.send(InboundFrames { frames, remote_addr }).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("[peer-network] Malformed packet from {}: {}", remote_addr, e),
                },
                Some(Err(e)) => {
                    warn!("[peer-network] Read from {} failed: {}", remote_addr, e);
                    break;
                }
                None => break,
            }
        }

        let mut routes = self.routes.lock().await;
        if routes.get(&token).is_some_and(|route| route.serial == serial) {
            routes.remove(&token);
        }
        debug!(peer = %token, "[peer-network] Inbound connection closed");
    }

    /// Send an addressed message to the inbound peer named by its recipient.
    ///
    /// The recipient token is stripped; the peer receives
    /// `[sender][op][hop][payload]`.
    pub async fn send(&self, message: &WireMessage) -> Result<(), TransportError> {
        let recipient = message.recipient.ok_or(TransportError::MissingRecipient)?;
        let packet = WireMessage {
            recipient: None,
            ..message.clone()
        }
        .to_packet()?;

        let mut routes = self.routes.lock().await;
        let route = routes
            .get_mut(&recipient)
            .ok_or(TransportError::UnknownRoute(recipient))?;
        if let Err(e) = route.writer.send(packet).await {
            routes.remove(&recipient);
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop accepting and close every inbound connection.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
        let mut routes = self.routes.lock().await;
        for (token, mut route) in routes.drain() {
            close_writer(&mut route.writer, token).await;
        }
        info!("[peer-network] Listener on {} shut down", self.local_addr);
    }
}

async fn close_writer(writer: &mut PacketWriter, peer: impl std::fmt::Display) {
    if let Err(e) = SinkExt::<Bytes>::close(writer).await {
        debug!("[peer-network] Closing connection to {} failed: {}", peer, e);
    }
}
