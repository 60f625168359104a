//! # Relay Planning
//!
//! Decides whether a received message is re-broadcast and to whom. Pure:
//! the service feeds it the verdict and a snapshot of the peer sets.
//!
//! ## Rules
//!
//! - Only `Tail` and `Txn` are ever relayed. A plain `Block` is a direct
//!   answer to a `BlockRequest` and stays where it landed.
//! - The verdict must be [`RelayVerdict::AcceptAndRelay`].
//! - `hop_count == NOT_RELAYABLE` is never relayed.
//! - The origin (and this node) is excluded from both peer sets.
//! - The relayed copy carries `hop_count + 1`. There is no ceiling.

use crate::domain::entities::{MessageOp, NodeId, NOT_RELAYABLE};

/// Decision returned by a block or transaction receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayVerdict {
    /// Already known or invalid.
    Ignore,
    /// Accepted locally, not passed on.
    AcceptOnly,
    /// Accepted and worth flooding further.
    AcceptAndRelay,
}

/// Targets of one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPlan {
    pub op: MessageOp,
    pub hop_count: i32,
    pub inbound: Vec<NodeId>,
    pub outbound: Vec<NodeId>,
}

impl RelayPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }

    #[must_use]
    pub fn target_count(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }
}

/// Snapshot of who a relay could reach.
#[derive(Debug, Clone, Copy)]
pub struct RelayContext<'a> {
    pub local_id: NodeId,
    pub origin: Option<NodeId>,
    pub inbound: &'a [NodeId],
    pub outbound: &'a [NodeId],
}

/// Plan a relay of a received `op` message, or `None` when it stops here.
#[must_use]
pub fn plan_relay(
    op: MessageOp,
    verdict: RelayVerdict,
    hop_count: i32,
    ctx: RelayContext<'_>,
) -> Option<RelayPlan> {
    if !matches!(op, MessageOp::Tail | MessageOp::Txn) {
        return None;
    }
    if verdict != RelayVerdict::AcceptAndRelay || hop_count <= NOT_RELAYABLE {
        return None;
    }
    let keep = |id: &&NodeId| Some(**id) != ctx.origin && **id != ctx.local_id;
    Some(RelayPlan {
        op,
        hop_count: hop_count.saturating_add(1),
        inbound: ctx.inbound.iter().filter(keep).copied().collect(),
        outbound: ctx.outbound.iter().filter(keep).copied().collect(),
    })
}

/// Plan an originating broadcast: every peer, hop 0.
#[must_use]
pub fn plan_broadcast(op: MessageOp, ctx: RelayContext<'_>) -> RelayPlan {
    let keep = |id: &&NodeId| **id != ctx.local_id;
    RelayPlan {
        op,
        hop_count: crate::domain::entities::ORIGIN_HOP,
        inbound: ctx.inbound.iter().filter(keep).copied().collect(),
        outbound: ctx.outbound.iter().filter(keep).copied().collect(),
    }
}
