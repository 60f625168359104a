//! Sending and parallel fan-out.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, warn};

use super::NetworkCore;
use crate::adapters::transport::OutboundConnection;
use crate::domain::{plan_relay, MessageOp, NodeId, RelayPlan, RelayVerdict, WireMessage};
use crate::errors::TransportError;

/// Where a message goes.
#[derive(Debug, Clone)]
pub(crate) enum Route {
    /// An inbound peer, reached through the shared endpoint.
    Inbound(NodeId),
    /// A dialed connection, reached through its own send lock.
    Outbound(Arc<OutboundConnection>),
}

impl NetworkCore {
    /// Send one message. Inbound sends are addressed by token, outbound
    /// sends carry no tokens.
    pub(crate) async fn send(
        &self,
        route: Route,
        op: MessageOp,
        hop_count: i32,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        let message = WireMessage::new(op, hop_count, payload);
        match route {
            Route::Inbound(peer) => {
                let endpoint = self.endpoint().ok_or(TransportError::Closed)?;
                endpoint
                    .send(&message.with_sender(self.node_id).with_recipient(peer))
                    .await
            }
            Route::Outbound(connection) => connection.send(&message).await,
        }
    }

    /// Relay a received message if the verdict and hop count allow it.
    ///
    /// The fan-out runs in its own task; the caller does not wait.
    pub(crate) fn relay_received(
        self: &Arc<Self>,
        op: MessageOp,
        verdict: RelayVerdict,
        hop_count: i32,
        origin: Option<NodeId>,
        payload: Bytes,
    ) {
        let inbound = self.directory.snapshot_inbound_ids();
        let outbound = self.directory.snapshot_outbound_ids();
        let Some(plan) = plan_relay(
            op,
            verdict,
            hop_count,
            self.relay_context(origin, &inbound, &outbound),
        ) else {
            return;
        };
        if plan.is_empty() {
            return;
        }
        debug!(
            ?op,
            hop = plan.hop_count,
            peers = plan.target_count(),
            "[peer-network] Relaying"
        );
        tokio::spawn(Arc::clone(self).deliver(plan, payload));
    }

    /// Send `payload` to every peer of the plan, inbound and outbound in
    /// parallel. Returns how many sends succeeded.
    pub(crate) async fn deliver(self: Arc<Self>, plan: RelayPlan, payload: Bytes) -> usize {
        let RelayPlan {
            op,
            hop_count,
            inbound,
            outbound,
        } = plan;
        let core: &NetworkCore = &self;

        let inbound_sends = join_all(inbound.into_iter().map(|peer| {
            let payload = payload.clone();
            async move {
                let result = core.send(Route::Inbound(peer), op, hop_count, payload).await;
                log_failure(peer, &result);
                result.is_ok()
            }
        }));

        let outbound_peers: Vec<_> = outbound
            .into_iter()
            .filter_map(|id| core.directory.outbound(&id))
            .collect();
        let outbound_sends = join_all(outbound_peers.into_iter().map(|peer| {
            let payload = payload.clone();
            async move {
                let result = peer.connection.send(&WireMessage::new(op, hop_count, payload)).await;
                log_failure(peer.remote_id(), &result);
                result.is_ok()
            }
        }));

        let (inbound_ok, outbound_ok) = tokio::join!(inbound_sends, outbound_sends);
        inbound_ok
            .into_iter()
            .chain(outbound_ok)
            .filter(|delivered| *delivered)
            .count()
    }
}

fn log_failure(peer: NodeId, result: &Result<(), TransportError>) {
    if let Err(e) = result {
        warn!(%peer, "[peer-network] Send failed: {}", e);
    }
}
