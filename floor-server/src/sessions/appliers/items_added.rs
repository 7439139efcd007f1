//! ItemsAdded event applier
//!
//! Appends the new lines to the snapshot. Every line carries its own
//! ticket id, so there is no merge step.

use crate::sessions::traits::EventApplier;
use shared::session::{EventPayload, SessionEvent, SessionSnapshot};

/// ItemsAdded applier
pub struct ItemsAddedApplier;

impl EventApplier for ItemsAddedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::ItemsAdded { items } = &event.payload {
            snapshot.items.extend(items.iter().cloned());
            super::stamp(snapshot, event);
        }
    }
}
