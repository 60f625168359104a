//! Outbound connection manager: top-up dialing, handshake, per-connection
//! reactor.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{unix_now, NetworkCore, Route};
use crate::adapters::transport::{wait_until_set, OutboundConnection, PacketReader};
use crate::domain::{
    payload::encode_address, unpack_frames, ConnectedPeer, FrameLayout, MessageOp, NodeId,
    OutboundPeer, WireMessage, ORIGIN_HOP,
};

/// What the reactor does after handling one message.
enum Flow {
    Continue,
    Stop,
}

impl NetworkCore {
    /// Dial known peers until `target_outbound` connections are live or in
    /// flight. Returns the number of dials started.
    pub(crate) fn connect_out(self: &Arc<Self>) -> usize {
        if self.is_shut_down() {
            return 0;
        }
        let busy = self.directory.outbound_count() + self.directory.pending_dial_count();
        let deficit = self.config.target_outbound.saturating_sub(busy);
        if deficit == 0 {
            return 0;
        }

        let own_address = self.own_address();
        let mut started = 0;
        for peer in self
            .directory
            .rotate_next_excluding(deficit, own_address.as_deref())
        {
            let address = peer.connection_address;
            if !self.directory.begin_dial(&address) {
                continue;
            }
            tokio::spawn(Arc::clone(self).onboard(address));
            started += 1;
        }
        if started > 0 {
            debug!(started, deficit, "[peer-network] Outbound top-up");
        }
        started
    }

    /// Dial, send Connect and run the connection's reactor until it ends.
    async fn onboard(self: Arc<Self>, address: String) {
        let (connection, reader) =
            match OutboundConnection::dial(&address, self.node_id, &self.config).await {
                Ok(dialed) => dialed,
                Err(e) => {
                    debug!(%address, "[peer-network] Dial failed: {}", e);
                    self.directory.end_dial(&address);
                    return;
                }
            };

        let connect = WireMessage::new(MessageOp::Connect, ORIGIN_HOP, encode_address(&address));
        if let Err(e) = connection.send(&connect).await {
            warn!(%address, "[peer-network] Connect failed: {}", e);
            self.directory.end_dial(&address);
            connection.close().await;
            return;
        }

        self.run_outbound_reactor(connection, reader).await;
    }

    async fn run_outbound_reactor(self: Arc<Self>, connection: Arc<OutboundConnection>, mut reader: PacketReader) {
        let stop = wait_until_set(self.shutdown.subscribe());
        let closed = wait_until_set(connection.closed_signal());
        tokio::pin!(stop, closed);

        let mut remote: Option<NodeId> = None;
        loop {
            let packet = tokio::select! {
                _ = &mut stop => break,
                _ = &mut closed => break,
                packet = reader.next() => packet,
            };
            let frames = match packet {
                Some(Ok(packet)) => unpack_frames(packet.freeze()),
                Some(Err(e)) => {
                    debug!(address = connection.address(), "[peer-network] Read failed: {}", e);
                    break;
                }
                None => break,
            };
            let message = match frames.and_then(|f| WireMessage::from_frames(f, FrameLayout::FromSender)) {
                Ok(message) => message,
                Err(e) => {
                    warn!(address = connection.address(), "[peer-network] Dropping malformed message: {}", e);
                    continue;
                }
            };
            if let Flow::Stop = self.handle_outbound(message, &connection, &mut remote).await {
                break;
            }
        }

        match remote {
            Some(id) => {
                if self
                    .directory
                    .remove_outbound_if(&id, |c| Arc::ptr_eq(c, &connection))
                    .is_some()
                {
                    info!(peer = %id, address = connection.address(), "[peer-network] Outbound peer removed");
                }
            }
            None => self.directory.end_dial(connection.address()),
        }
        connection.close().await;
    }

    async fn handle_outbound(
        self: &Arc<Self>,
        message: WireMessage,
        connection: &Arc<OutboundConnection>,
        remote: &mut Option<NodeId>,
    ) -> Flow {
        let Some(sender) = message.sender else {
            return Flow::Continue;
        };
        match message.op {
            MessageOp::Identify => self.promote(sender, connection, remote),
            MessageOp::Disconnect => {
                info!(peer = %sender, "[peer-network] Outbound peer said goodbye");
                Flow::Stop
            }
            MessageOp::Connect => {
                debug!(peer = %sender, "[peer-network] Ignoring Connect on outbound connection");
                Flow::Continue
            }
            _ => {
                self.handle_common(message, Route::Outbound(Arc::clone(connection)))
                    .await;
                Flow::Continue
            }
        }
    }

    /// Turn a dial into a live outbound peer on Identify.
    fn promote(
        &self,
        sender: NodeId,
        connection: &Arc<OutboundConnection>,
        remote: &mut Option<NodeId>,
    ) -> Flow {
        if remote.is_some() {
            return Flow::Continue;
        }
        if sender == self.node_id {
            info!(address = connection.address(), "[peer-network] Dialed ourselves, dropping");
            return Flow::Stop;
        }
        let peer = OutboundPeer::new(
            ConnectedPeer::new(sender, connection.address()),
            Arc::clone(connection),
        );
        match self
            .directory
            .register_outbound(connection.address(), peer, unix_now())
        {
            Ok(()) => {
                *remote = Some(sender);
                info!(peer = %sender, address = connection.address(), "[peer-network] Outbound peer connected");
                Flow::Continue
            }
            Err(_) => {
                debug!(peer = %sender, "[peer-network] Already connected to peer, dropping duplicate");
                Flow::Stop
            }
        }
    }
}
