//! Session commands - intents submitted to the engine
//!
//! Every command carries a unique `command_id` for idempotent redelivery
//! and the pre-authenticated actor it runs as.

use super::types::{
    AdjustmentKind, ChangeKind, ChangeValue, OrderItemInput, PackageSnapshot, PaymentLineInput,
};
use crate::models::Role;
use crate::util::now_millis;
use serde::{Deserialize, Serialize};

/// Command envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCommand {
    /// Unique ID for idempotency (client-generated UUID)
    pub command_id: String,
    pub actor_id: String,
    /// Actor name (snapshot for audit)
    pub actor_name: String,
    pub actor_role: Role,
    /// Client timestamp (Unix milliseconds)
    pub timestamp: i64,
    pub payload: SessionCommandPayload,
}

impl SessionCommand {
    pub fn new(
        actor_id: impl Into<String>,
        actor_name: impl Into<String>,
        actor_role: Role,
        payload: SessionCommandPayload,
    ) -> Self {
        Self {
            command_id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            actor_role,
            timestamp: now_millis(),
            payload,
        }
    }
}

/// Command payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionCommandPayload {
    /// Seat guests: claim the table, create the session in
    /// PendingVerification, optionally select a package and place the
    /// first round of items.
    OpenTable {
        table_id: String,
        guest_count: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        package: Option<PackageSnapshot>,
        #[serde(default)]
        items: Vec<OrderItemInput>,
    },
    /// Server's headcount confirmation; the final count floors at the
    /// cashier's initial count.
    VerifySession {
        session_id: String,
        server_count: i32,
    },
    /// Place additional items (refills, add-ons, later rounds).
    AddItems {
        session_id: String,
        items: Vec<OrderItemInput>,
    },
    /// Kitchen picks a pending ticket up.
    ClaimTicket {
        session_id: String,
        ticket_id: String,
    },
    /// Kitchen finished preparing.
    MarkTicketReady {
        session_id: String,
        ticket_id: String,
    },
    /// Runner delivered the item to the table.
    MarkTicketServed {
        session_id: String,
        ticket_id: String,
    },
    /// Abort a ticket; requires a reason.
    CancelTicket {
        session_id: String,
        ticket_id: String,
        reason: String,
    },
    /// File a guest-count or package change for approval.
    SubmitChange {
        session_id: String,
        value: ChangeValue,
        reason_code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Approve the pending change of the given kind and apply its value.
    ApproveChange {
        session_id: String,
        kind: ChangeKind,
    },
    /// Reject the pending change of the given kind.
    RejectChange {
        session_id: String,
        kind: ChangeKind,
    },
    /// Record a manual discount or charge on the session ledger.
    AddAdjustment {
        session_id: String,
        kind: AdjustmentKind,
        amount: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Settle the bill: one atomic pass that computes totals, checks the
    /// tender, allocates the receipt number, closes the session and
    /// releases the table.
    FinalizeSession {
        session_id: String,
        payments: Vec<PaymentLineInput>,
    },
}

impl SessionCommandPayload {
    /// Session the command targets, if it targets an existing one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionCommandPayload::OpenTable { .. } => None,
            SessionCommandPayload::VerifySession { session_id, .. }
            | SessionCommandPayload::AddItems { session_id, .. }
            | SessionCommandPayload::ClaimTicket { session_id, .. }
            | SessionCommandPayload::MarkTicketReady { session_id, .. }
            | SessionCommandPayload::MarkTicketServed { session_id, .. }
            | SessionCommandPayload::CancelTicket { session_id, .. }
            | SessionCommandPayload::SubmitChange { session_id, .. }
            | SessionCommandPayload::ApproveChange { session_id, .. }
            | SessionCommandPayload::RejectChange { session_id, .. }
            | SessionCommandPayload::AddAdjustment { session_id, .. }
            | SessionCommandPayload::FinalizeSession { session_id, .. } => Some(session_id),
        }
    }
}
