//! Human-readable activity feed
//!
//! Best-effort: events are queued on an unbounded channel and written
//! by a background task under the `activity` tracing target. A full or
//! closed channel never blocks or fails command processing.

use tokio::sync::mpsc;
use tracing::info;

use shared::session::{EventPayload, SessionEvent};

/// Fire-and-forget activity recorder
#[derive(Clone)]
pub struct ActivityLog {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ActivityLog {
    /// Spawn the background writer and return the handle.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                info!(
                    target: "activity",
                    session_id = %event.session_id,
                    sequence = event.sequence,
                    actor = %event.actor_name,
                    "{}",
                    describe(&event)
                );
            }
        });
        Self { tx }
    }

    /// Queue an event for the feed. Errors are ignored.
    pub fn record(&self, event: &SessionEvent) {
        let _ = self.tx.send(event.clone());
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog").finish()
    }
}

/// One feed line per event
pub fn describe(event: &SessionEvent) -> String {
    match &event.payload {
        EventPayload::TableOpened {
            table_name,
            guest_count,
            ..
        } => format!(
            "{} opened {} for {} guest(s)",
            event.actor_name, table_name, guest_count
        ),
        EventPayload::SessionVerified {
            server_count,
            final_count,
        } => format!(
            "{} verified the headcount ({} on the floor, billing {})",
            event.actor_name, server_count, final_count
        ),
        EventPayload::ItemsAdded { items } => {
            format!("{} added {} item(s)", event.actor_name, items.len())
        }
        EventPayload::TicketClaimed { ticket_id } => {
            format!("{} claimed ticket {}", event.actor_name, ticket_id)
        }
        EventPayload::TicketPrepared { ticket_id } => {
            format!("{} marked ticket {} ready", event.actor_name, ticket_id)
        }
        EventPayload::TicketServed { ticket_id } => {
            format!("{} served ticket {}", event.actor_name, ticket_id)
        }
        EventPayload::TicketCancelled { ticket_id, reason } => format!(
            "{} cancelled ticket {} ({})",
            event.actor_name, ticket_id, reason
        ),
        EventPayload::ChangeRequested { request } => format!(
            "{} requested a {:?} change ({})",
            event.actor_name, request.kind, request.reason_code
        ),
        EventPayload::ChangeApproved { kind, .. } => {
            format!("{} approved the {:?} change", event.actor_name, kind)
        }
        EventPayload::ChangeRejected { kind } => {
            format!("{} rejected the {:?} change", event.actor_name, kind)
        }
        EventPayload::AdjustmentAdded { record } => format!(
            "{} added a {:?} of {:.2}",
            event.actor_name, record.kind, record.amount
        ),
        EventPayload::SessionFinalized { receipt, .. } => format!(
            "{} closed the bill, receipt {} for {:.2}",
            event.actor_name, receipt.receipt_number, receipt.grand_total_gross
        ),
    }
}
