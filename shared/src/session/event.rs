//! Session events - immutable facts recorded after command processing

use super::types::{
    AdjustmentRecord, ChangeKind, ChangeRequest, ChangeValue, OrderItemSnapshot, PackageSnapshot,
    PaymentRecord, Receipt,
};
use serde::{Deserialize, Serialize};

/// Session event - immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Event unique ID
    pub event_id: String,
    /// Global sequence number (for ordering and replay)
    /// This is the AUTHORITATIVE ordering mechanism for state evolution
    pub sequence: u64,
    /// Session this event belongs to
    pub session_id: String,
    /// Server timestamp (Unix milliseconds) - AUTHORITATIVE for state evolution
    pub timestamp: i64,
    /// Client timestamp - for audit and debugging; may differ from server
    /// time due to clock skew
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<i64>,
    /// Actor who triggered this event
    pub actor_id: String,
    /// Actor name (snapshot for audit)
    pub actor_name: String,
    /// Command that triggered this event (for audit tracing)
    pub command_id: String,
    pub event_type: SessionEventType,
    pub payload: EventPayload,
}

impl SessionEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        session_id: String,
        actor_id: String,
        actor_name: String,
        command_id: String,
        client_timestamp: Option<i64>,
        event_type: SessionEventType,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            sequence,
            session_id,
            timestamp: crate::util::now_millis(),
            client_timestamp,
            actor_id,
            actor_name,
            command_id,
            event_type,
            payload,
        }
    }
}

/// Event type enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventType {
    // Lifecycle
    TableOpened,
    SessionVerified,
    SessionFinalized,

    // Items / tickets
    ItemsAdded,
    TicketClaimed,
    TicketPrepared,
    TicketServed,
    TicketCancelled,

    // Change requests
    ChangeRequested,
    ChangeApproved,
    ChangeRejected,

    // Ledger
    AdjustmentAdded,
}

impl std::fmt::Display for SessionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEventType::TableOpened => write!(f, "TABLE_OPENED"),
            SessionEventType::SessionVerified => write!(f, "SESSION_VERIFIED"),
            SessionEventType::SessionFinalized => write!(f, "SESSION_FINALIZED"),
            SessionEventType::ItemsAdded => write!(f, "ITEMS_ADDED"),
            SessionEventType::TicketClaimed => write!(f, "TICKET_CLAIMED"),
            SessionEventType::TicketPrepared => write!(f, "TICKET_PREPARED"),
            SessionEventType::TicketServed => write!(f, "TICKET_SERVED"),
            SessionEventType::TicketCancelled => write!(f, "TICKET_CANCELLED"),
            SessionEventType::ChangeRequested => write!(f, "CHANGE_REQUESTED"),
            SessionEventType::ChangeApproved => write!(f, "CHANGE_APPROVED"),
            SessionEventType::ChangeRejected => write!(f, "CHANGE_REJECTED"),
            SessionEventType::AdjustmentAdded => write!(f, "ADJUSTMENT_ADDED"),
        }
    }
}

/// Event payload variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    TableOpened {
        store_id: String,
        table_id: String,
        table_name: String,
        guest_count: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        package: Option<PackageSnapshot>,
        items: Vec<OrderItemSnapshot>,
    },
    SessionVerified {
        server_count: i32,
        /// max(cashier initial, server count)
        final_count: i32,
    },
    ItemsAdded {
        items: Vec<OrderItemSnapshot>,
    },
    TicketClaimed {
        ticket_id: String,
    },
    TicketPrepared {
        ticket_id: String,
    },
    TicketServed {
        ticket_id: String,
    },
    TicketCancelled {
        ticket_id: String,
        reason: String,
    },
    ChangeRequested {
        request: ChangeRequest,
    },
    ChangeApproved {
        kind: ChangeKind,
        value: ChangeValue,
    },
    ChangeRejected {
        kind: ChangeKind,
    },
    AdjustmentAdded {
        record: AdjustmentRecord,
    },
    SessionFinalized {
        receipt: Receipt,
        payments: Vec<PaymentRecord>,
    },
}
