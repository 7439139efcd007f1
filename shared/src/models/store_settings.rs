//! Store receipt settings
//!
//! Singleton per store; the receipt counter only moves inside the
//! finalization transaction.

use serde::{Deserialize, Serialize};

/// Receipt numbering state for one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptSettings {
    pub store_id: String,
    /// Prefix prepended to every receipt number (e.g. "FS-").
    pub prefix: String,
    /// Next counter value to hand out.
    pub next_receipt_number: u64,
}

impl ReceiptSettings {
    pub fn new(store_id: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            prefix: prefix.into(),
            next_receipt_number: 1,
        }
    }

    /// Format the number the counter currently points at.
    pub fn format_number(&self) -> String {
        format!("{}{:06}", self.prefix, self.next_receipt_number)
    }
}
