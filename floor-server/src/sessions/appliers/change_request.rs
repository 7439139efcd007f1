//! Change request appliers
//!
//! Requested fills the kind's slot; Approved marks the slot and folds
//! the requested value into the session; Rejected only marks the slot.
//! Either resolution frees the slot for the next request of that kind.

use crate::sessions::traits::EventApplier;
use shared::session::{
    ChangeStatus, ChangeValue, EventPayload, SessionEvent, SessionSnapshot,
};

/// ChangeRequested applier
pub struct ChangeRequestedApplier;

impl EventApplier for ChangeRequestedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::ChangeRequested { request } = &event.payload {
            *snapshot.change_slot_mut(request.kind) = Some(request.clone());
            super::stamp(snapshot, event);
        }
    }
}

/// ChangeApproved applier
pub struct ChangeApprovedApplier;

impl EventApplier for ChangeApprovedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::ChangeApproved { kind, value } = &event.payload {
            if let Some(request) = snapshot.change_slot_mut(*kind) {
                request.status = ChangeStatus::Approved;
                request.resolved_by = Some(event.actor_id.clone());
                request.resolved_at = Some(event.timestamp);
            }

            match value {
                ChangeValue::GuestCount(count) => {
                    snapshot.guest_final = *count;
                }
                ChangeValue::Package(package) => {
                    snapshot.package = Some(package.clone());
                }
            }
            super::sync_package_line(snapshot);
            super::stamp(snapshot, event);
        }
    }
}

/// ChangeRejected applier
pub struct ChangeRejectedApplier;

impl EventApplier for ChangeRejectedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::ChangeRejected { kind } = &event.payload {
            if let Some(request) = snapshot.change_slot_mut(*kind) {
                request.status = ChangeStatus::Rejected;
                request.resolved_by = Some(event.actor_id.clone());
                request.resolved_at = Some(event.timestamp);
            }
            super::stamp(snapshot, event);
        }
    }
}
