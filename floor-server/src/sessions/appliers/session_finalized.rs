//! SessionFinalized event applier
//!
//! Closes the session: records the tender, binds the receipt number and
//! per-method summary, and stamps the closing audit fields. The totals
//! recomputed here must agree with the receipt written by the command.

use crate::sessions::traits::EventApplier;
use shared::session::{EventPayload, SessionEvent, SessionSnapshot, SessionStatus};

/// SessionFinalized applier
pub struct SessionFinalizedApplier;

impl EventApplier for SessionFinalizedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::SessionFinalized { receipt, payments } = &event.payload {
            snapshot.payments.extend(payments.iter().cloned());
            snapshot.receipt_number = Some(receipt.receipt_number.clone());
            snapshot.payment_summary = receipt.payments.clone();
            snapshot.status = SessionStatus::Closed;
            snapshot.closed_by = Some(event.actor_id.clone());
            snapshot.closed_at = Some(event.timestamp);
            snapshot.end_time = Some(event.timestamp);

            super::stamp(snapshot, event);
        }
    }
}
