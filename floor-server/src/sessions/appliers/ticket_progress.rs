//! Kitchen ticket lifecycle appliers
//!
//! Claimed, Prepared, Served and Cancelled each stamp the matching
//! audit fields from the event. A ticket id that no longer matches any
//! line is skipped; the event still advances the sequence.

use crate::sessions::traits::EventApplier;
use shared::session::{EventPayload, SessionEvent, SessionSnapshot, TicketStatus};

/// TicketClaimed applier
pub struct TicketClaimedApplier;

impl EventApplier for TicketClaimedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::TicketClaimed { ticket_id } = &event.payload {
            if let Some(item) = snapshot.find_item_mut(ticket_id) {
                item.status = TicketStatus::Preparing;
                item.claimed_at = Some(event.timestamp);
                item.claimed_by = Some(event.actor_id.clone());
            }
            super::stamp(snapshot, event);
        }
    }
}

/// TicketPrepared applier
pub struct TicketPreparedApplier;

impl EventApplier for TicketPreparedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::TicketPrepared { ticket_id } = &event.payload {
            if let Some(item) = snapshot.find_item_mut(ticket_id) {
                item.status = TicketStatus::Ready;
                item.prepared_at = Some(event.timestamp);
                item.prepared_by = Some(event.actor_id.clone());
            }
            super::stamp(snapshot, event);
        }
    }
}

/// TicketServed applier
pub struct TicketServedApplier;

impl EventApplier for TicketServedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::TicketServed { ticket_id } = &event.payload {
            if let Some(item) = snapshot.find_item_mut(ticket_id) {
                item.status = TicketStatus::Served;
                item.served_at = Some(event.timestamp);
                item.served_by = Some(event.actor_id.clone());
            }
            super::stamp(snapshot, event);
        }
    }
}

/// TicketCancelled applier
pub struct TicketCancelledApplier;

impl EventApplier for TicketCancelledApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::TicketCancelled { ticket_id, reason } = &event.payload {
            if let Some(item) = snapshot.find_item_mut(ticket_id) {
                item.status = TicketStatus::Cancelled;
                item.cancelled_at = Some(event.timestamp);
                item.cancelled_by = Some(event.actor_id.clone());
                item.cancel_reason = Some(reason.clone());
            }
            super::stamp(snapshot, event);
        }
    }
}
