//! # Outbound Connections
//!
//! A connection this node dialed. Sends are serialised by a lock owned by
//! the connection; nothing else ever writes to its socket.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::debug;
use url::{Host, Url};

use super::codec::{framed_halves, write_greeting, PacketReader, PacketWriter};
use crate::domain::{NetworkConfig, NodeId, WireMessage};
use crate::errors::TransportError;

/// Split `tcp://host:port` into host and port.
pub fn parse_connection_address(address: &str) -> Result<(String, u16), TransportError> {
    let url = Url::parse(address).map_err(|_| TransportError::InvalidAddress(address.to_string()))?;
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(TransportError::InvalidAddress(address.to_string())),
    };
    let port = url
        .port()
        .ok_or_else(|| TransportError::InvalidAddress(address.to_string()))?;
    Ok((host, port))
}

/// One dialed connection.
pub struct OutboundConnection {
    address: String,
    remote_addr: SocketAddr,
    writer: Mutex<PacketWriter>,
    closed: watch::Sender<bool>,
}

impl std::fmt::Debug for OutboundConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundConnection")
            .field("address", &self.address)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl OutboundConnection {
    /// Connect to `address` and send the greeting.
    ///
    /// Returns the connection and its read half; the caller runs the reader.
    pub async fn dial(
        address: &str,
        local_id: NodeId,
        config: &NetworkConfig,
    ) -> Result<(Arc<Self>, PacketReader), TransportError> {
        let (host, port) = parse_connection_address(address)?;
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| TransportError::Timeout("connect"))?
            .map_err(|e| TransportError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        let remote_addr = stream.peer_addr()?;
        let (reader, mut writer) = framed_halves(stream, config.max_packet_size);
        write_greeting(&mut writer, local_id).await?;
        debug!("[peer-network] Dialed {} ({})", address, remote_addr);

        let (closed, _) = watch::channel(false);
        let connection = Arc::new(Self {
            address: address.to_string(),
            remote_addr,
            writer: Mutex::new(writer),
            closed,
        });
        Ok((connection, reader))
    }

    /// The connection string this connection was dialed with.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a message. Identity tokens are stripped: the listener knows who
    /// we are from the greeting.
    pub async fn send(&self, message: &WireMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let packet = WireMessage {
            sender: None,
            recipient: None,
            ..message.clone()
        }
        .to_packet()?;
        self.writer.lock().await.send(packet).await?;
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves when [`Self::close`] is called.
    #[must_use]
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Close the write half and signal the reader to stop.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = SinkExt::<Bytes>::close(&mut *writer).await {
            debug!("[peer-network] Closing connection to {} failed: {}", self.address, e);
        }
        debug!("[peer-network] Closed connection to {}", self.address);
    }
}
