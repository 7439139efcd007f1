//! AdjustmentAdded event applier

use crate::sessions::traits::EventApplier;
use shared::session::{EventPayload, SessionEvent, SessionSnapshot};

/// AdjustmentAdded applier
pub struct AdjustmentAddedApplier;

impl EventApplier for AdjustmentAddedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::AdjustmentAdded { record } = &event.payload {
            snapshot.adjustments.push(record.clone());
            super::stamp(snapshot, event);
        }
    }
}
