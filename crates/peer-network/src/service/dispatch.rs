//! Message dispatch shared by the listener reactor and the outbound reactors.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use shared_types::{Block, TransactionEnvelope};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{NetworkCore, Route};
use crate::adapters::is_sharable;
use crate::adapters::transport::{wait_until_set, InboundFrames};
use crate::domain::{
    payload::encode_address, ConnectedPeer, FrameLayout, KnownPeer, MessageOp, NodeId, Payload,
    WireMessage, NOT_RELAYABLE, ORIGIN_HOP,
};

impl NetworkCore {
    /// The single consumer of every inbound frame set.
    pub(crate) async fn run_listener_reactor(self: Arc<Self>, mut frames: mpsc::Receiver<InboundFrames>) {
        info!("[peer-network] Listener reactor started");
        let stop = wait_until_set(self.shutdown.subscribe());
        tokio::pin!(stop);
        loop {
            let received = tokio::select! {
                _ = &mut stop => break,
                received = frames.recv() => received,
            };
            let Some(InboundFrames { frames, remote_addr }) = received else {
                break;
            };
            match WireMessage::from_frames(frames, FrameLayout::FromSender) {
                Ok(message) => self.handle_inbound(message, remote_addr).await,
                Err(e) => warn!("[peer-network] Dropping malformed message from {}: {}", remote_addr, e),
            }
        }
        info!("[peer-network] Listener reactor stopped");
    }

    async fn handle_inbound(self: &Arc<Self>, message: WireMessage, remote_addr: SocketAddr) {
        let Some(sender) = message.sender else {
            return;
        };
        if message.op == MessageOp::Disconnect {
            if self.directory.remove_inbound(&sender).is_some() {
                info!(peer = %sender, "[peer-network] Inbound peer disconnected");
            }
            return;
        }
        self.directory
            .touch_inbound(ConnectedPeer::new(sender, remote_addr.to_string()));

        match message.op {
            MessageOp::Connect => self.answer_connect(sender, &message.payload).await,
            MessageOp::Identify => debug!(peer = %sender, "[peer-network] Ignoring Identify on listener"),
            _ => self.handle_common(message, Route::Inbound(sender)).await,
        }
    }

    /// Reply to a dialer's Connect with our identity, echoing the address it
    /// used to reach us.
    async fn answer_connect(&self, sender: NodeId, payload: &Bytes) {
        let dialed = match self.codec.decode(MessageOp::Connect, payload) {
            Ok(Payload::Address(address)) => address,
            Ok(_) => String::new(),
            Err(e) => {
                warn!(peer = %sender, "[peer-network] Malformed Connect: {}", e);
                return;
            }
        };
        debug!(peer = %sender, %dialed, "[peer-network] Connect received");
        if let Err(e) = self
            .send(Route::Inbound(sender), MessageOp::Identify, ORIGIN_HOP, encode_address(&dialed))
            .await
        {
            warn!(peer = %sender, "[peer-network] Identify reply failed: {}", e);
        }
    }

    /// Operations handled the same way whichever side received them.
    pub(crate) async fn handle_common(self: &Arc<Self>, message: WireMessage, reply: Route) {
        let payload = match self.codec.decode(message.op, &message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(op = ?message.op, "[peer-network] Dropping malformed payload: {}", e);
                return;
            }
        };
        match (message.op, payload) {
            (op @ (MessageOp::Tail | MessageOp::Block), Payload::Block(block)) => {
                self.process_block(op, block, message.hop_count, message.sender, message.payload)
                    .await;
            }
            (MessageOp::Txn, Payload::Transaction(txn)) => {
                self.process_transaction(txn, message.hop_count, message.sender, message.payload)
                    .await;
            }
            (MessageOp::BlockRequest, Payload::BlockId(previous_id)) => {
                self.answer_block_request(&previous_id, reply).await;
            }
            (MessageOp::PeerShare, Payload::Address(address)) => self.learn_peer(address).await,
            (op, _) => debug!(?op, "[peer-network] No handler for operation"),
        }
    }

    async fn process_block(
        self: &Arc<Self>,
        op: MessageOp,
        block: Block,
        hop_count: i32,
        origin: Option<NodeId>,
        raw: Bytes,
    ) {
        let Some(receiver) = self.block_receiver() else {
            debug!("[peer-network] No block receiver registered");
            return;
        };
        let height = block.header.height;
        let verdict = if op == MessageOp::Tail {
            receiver.on_tail(block).await
        } else {
            receiver.on_block(block).await
        };
        debug!(?op, height, ?verdict, "[peer-network] Block processed");
        self.relay_received(op, verdict, hop_count, origin, raw);
    }

    async fn process_transaction(
        self: &Arc<Self>,
        txn: TransactionEnvelope,
        hop_count: i32,
        origin: Option<NodeId>,
        raw: Bytes,
    ) {
        let Some(receiver) = self.transaction_receiver() else {
            debug!("[peer-network] No transaction receiver registered");
            return;
        };
        let verdict = receiver.on_transaction(txn).await;
        self.relay_received(MessageOp::Txn, verdict, hop_count, origin, raw);
    }

    async fn answer_block_request(&self, previous_id: &[u8], reply: Route) {
        let block = match self.repository.next_block_after(previous_id).await {
            Ok(Some(block)) => block,
            Ok(None) => {
                debug!("[peer-network] No successor stored for requested block");
                return;
            }
            Err(e) => {
                warn!("[peer-network] Repository lookup failed: {}", e);
                return;
            }
        };
        let payload = match self.codec.encode_block(&block) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[peer-network] Cannot encode block {}: {}", block.header.height, e);
                return;
            }
        };
        if let Err(e) = self.send(reply, MessageOp::Block, NOT_RELAYABLE, payload).await {
            warn!("[peer-network] Block response failed: {}", e);
        }
    }

    async fn learn_peer(&self, address: String) {
        if !is_sharable(&address).await {
            debug!(%address, "[peer-network] Ignoring non-sharable peer address");
            return;
        }
        if self.directory.add_known(KnownPeer::new(address.clone())) {
            debug!(%address, "[peer-network] Learned peer");
        }
    }
}
