//! SessionVerified event applier
//!
//! Moves the session to Active with the reconciled headcount and keeps
//! the package line quantity in step with it.

use crate::sessions::traits::EventApplier;
use shared::session::{EventPayload, SessionEvent, SessionSnapshot, SessionStatus};

/// SessionVerified applier
pub struct SessionVerifiedApplier;

impl EventApplier for SessionVerifiedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::SessionVerified {
            server_count,
            final_count,
        } = &event.payload
        {
            snapshot.status = SessionStatus::Active;
            snapshot.guest_verified = Some(*server_count);
            snapshot.guest_final = *final_count;
            snapshot.verified_by = Some(event.actor_id.clone());
            snapshot.verified_at = Some(event.timestamp);

            super::sync_package_line(snapshot);
            super::stamp(snapshot, event);
        }
    }
}
