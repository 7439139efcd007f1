//! Event applier implementations
//!
//! Each applier implements the `EventApplier` trait and handles one
//! specific event type. Appliers are PURE functions over the snapshot:
//! they read nothing outside the event, so replaying the event log
//! always reproduces the same state and checksum.

use shared::session::{EventPayload, SessionEvent, SessionSnapshot};

use crate::sessions::traits::EventApplier;

mod adjustment_added;
mod change_request;
mod items_added;
mod session_finalized;
mod session_verified;
mod table_opened;
mod ticket_progress;

pub use adjustment_added::AdjustmentAddedApplier;
pub use change_request::{ChangeApprovedApplier, ChangeRejectedApplier, ChangeRequestedApplier};
pub use items_added::ItemsAddedApplier;
pub use session_finalized::SessionFinalizedApplier;
pub use session_verified::SessionVerifiedApplier;
pub use table_opened::TableOpenedApplier;
pub use ticket_progress::{
    TicketCancelledApplier, TicketClaimedApplier, TicketPreparedApplier, TicketServedApplier,
};

/// EventAction enum - dispatches to concrete applier implementations
pub enum EventAction {
    TableOpened(TableOpenedApplier),
    SessionVerified(SessionVerifiedApplier),
    ItemsAdded(ItemsAddedApplier),
    TicketClaimed(TicketClaimedApplier),
    TicketPrepared(TicketPreparedApplier),
    TicketServed(TicketServedApplier),
    TicketCancelled(TicketCancelledApplier),
    ChangeRequested(ChangeRequestedApplier),
    ChangeApproved(ChangeApprovedApplier),
    ChangeRejected(ChangeRejectedApplier),
    AdjustmentAdded(AdjustmentAddedApplier),
    SessionFinalized(SessionFinalizedApplier),
}

impl EventApplier for EventAction {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        match self {
            EventAction::TableOpened(a) => a.apply(snapshot, event),
            EventAction::SessionVerified(a) => a.apply(snapshot, event),
            EventAction::ItemsAdded(a) => a.apply(snapshot, event),
            EventAction::TicketClaimed(a) => a.apply(snapshot, event),
            EventAction::TicketPrepared(a) => a.apply(snapshot, event),
            EventAction::TicketServed(a) => a.apply(snapshot, event),
            EventAction::TicketCancelled(a) => a.apply(snapshot, event),
            EventAction::ChangeRequested(a) => a.apply(snapshot, event),
            EventAction::ChangeApproved(a) => a.apply(snapshot, event),
            EventAction::ChangeRejected(a) => a.apply(snapshot, event),
            EventAction::AdjustmentAdded(a) => a.apply(snapshot, event),
            EventAction::SessionFinalized(a) => a.apply(snapshot, event),
        }
    }
}

/// Convert SessionEvent reference to EventAction
///
/// This is the ONLY place with a match on EventPayload.
impl From<&SessionEvent> for EventAction {
    fn from(event: &SessionEvent) -> Self {
        match &event.payload {
            EventPayload::TableOpened { .. } => EventAction::TableOpened(TableOpenedApplier),
            EventPayload::SessionVerified { .. } => {
                EventAction::SessionVerified(SessionVerifiedApplier)
            }
            EventPayload::ItemsAdded { .. } => EventAction::ItemsAdded(ItemsAddedApplier),
            EventPayload::TicketClaimed { .. } => EventAction::TicketClaimed(TicketClaimedApplier),
            EventPayload::TicketPrepared { .. } => {
                EventAction::TicketPrepared(TicketPreparedApplier)
            }
            EventPayload::TicketServed { .. } => EventAction::TicketServed(TicketServedApplier),
            EventPayload::TicketCancelled { .. } => {
                EventAction::TicketCancelled(TicketCancelledApplier)
            }
            EventPayload::ChangeRequested { .. } => {
                EventAction::ChangeRequested(ChangeRequestedApplier)
            }
            EventPayload::ChangeApproved { .. } => {
                EventAction::ChangeApproved(ChangeApprovedApplier)
            }
            EventPayload::ChangeRejected { .. } => {
                EventAction::ChangeRejected(ChangeRejectedApplier)
            }
            EventPayload::AdjustmentAdded { .. } => {
                EventAction::AdjustmentAdded(AdjustmentAddedApplier)
            }
            EventPayload::SessionFinalized { .. } => {
                EventAction::SessionFinalized(SessionFinalizedApplier)
            }
        }
    }
}

/// Keeps the package line in step with the billing guest count and the
/// current package selection.
pub(crate) fn sync_package_line(snapshot: &mut SessionSnapshot) {
    let guest_count = snapshot.guest_final;
    let package = snapshot.package.clone();
    if let Some(line) = snapshot.items.iter_mut().find(|i| i.is_package_line) {
        line.quantity = guest_count;
        if let Some(package) = package {
            line.menu_item_id = package.package_id;
            line.name = package.name;
            line.unit_price = package.unit_price;
            line.tax_rate = package.tax_rate;
        }
    }
}

/// Sequence, timestamp, totals and checksum, in the order every applier
/// finishes with.
pub(crate) fn stamp(snapshot: &mut SessionSnapshot, event: &SessionEvent) {
    snapshot.last_sequence = event.sequence;
    snapshot.updated_at = event.timestamp;
    crate::sessions::money::recalculate_totals(snapshot);
    snapshot.update_checksum();
}
