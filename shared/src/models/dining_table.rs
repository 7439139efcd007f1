//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Occupancy state of a physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    #[default]
    Available,
    Occupied,
    Reserved,
    OutOfOrder,
}

/// Dining table registry entry.
///
/// Invariant: `current_session_id` is `Some` exactly when `status` is
/// `Occupied`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: String,
    pub display_name: String,
    pub status: TableStatus,
    pub is_active: bool,
    pub current_session_id: Option<String>,
}

impl TableRecord {
    pub fn new(id: String, display_name: String) -> Self {
        Self {
            id,
            display_name,
            status: TableStatus::Available,
            is_active: true,
            current_session_id: None,
        }
    }

    /// A table can host a new session only when enabled and free.
    pub fn is_openable(&self) -> bool {
        self.is_active && self.status == TableStatus::Available
    }

    pub fn occupy(&mut self, session_id: String) {
        self.status = TableStatus::Occupied;
        self.current_session_id = Some(session_id);
    }

    pub fn release(&mut self) {
        self.status = TableStatus::Available;
        self.current_session_id = None;
    }
}
