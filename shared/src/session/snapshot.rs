//! Session snapshot - computed state from event stream
//!
//! The snapshot includes a `state_checksum` field for drift detection.
//! Clients can compare their locally computed checksum with the server's
//! to detect if the reducer logic has diverged.

use super::types::{
    AdjustmentRecord, ChangeKind, ChangeRequest, OrderItemSnapshot, PackageSnapshot, PaymentRecord,
    PaymentSummaryItem,
};
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Opened by the cashier, awaiting the server's headcount.
    #[default]
    PendingVerification,
    Active,
    /// Finalized; readable forever, mutable never.
    Closed,
}

/// Session snapshot - computed from event stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    /// Session ID (assigned by server)
    pub session_id: String,
    #[serde(default)]
    pub store_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub status: SessionStatus,

    // === Guest counts ===
    /// Cashier's count at seating time
    pub guest_initial: i32,
    /// Server's verified count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_verified: Option<i32>,
    /// Billing count: max(initial, verified), then change requests
    pub guest_final: i32,

    /// Selected package offering, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageSnapshot>,

    // === Change request slots (one per kind) ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_count_change: Option<ChangeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_change: Option<ChangeRequest>,

    /// Order lines with embedded kitchen tickets
    pub items: Vec<OrderItemSnapshot>,
    /// Append-only discount / charge ledger
    #[serde(default)]
    pub adjustments: Vec<AdjustmentRecord>,
    /// Payment records (written once, at finalization)
    pub payments: Vec<PaymentRecord>,

    // === Settlement totals (recomputed on every apply) ===
    pub subtotal_gross: f64,
    pub subtotal_net: f64,
    pub subtotal_tax: f64,
    #[serde(default)]
    pub discount_total: f64,
    #[serde(default)]
    pub charge_total: f64,
    pub grand_total_gross: f64,
    pub grand_total_net: f64,
    pub grand_total_tax: f64,
    #[serde(default)]
    pub total_paid: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payment_summary: Vec<PaymentSummaryItem>,

    /// Receipt number (assigned at finalization)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,

    // === Audit stamps ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,

    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Last applied event sequence (for incremental updates)
    pub last_sequence: u64,
    /// State checksum for drift detection (hex string)
    #[serde(default)]
    pub state_checksum: String,
}

impl SessionSnapshot {
    /// Create a new empty session
    pub fn new(session_id: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let mut snapshot = Self {
            session_id,
            store_id: String::new(),
            table_id: None,
            table_name: None,
            status: SessionStatus::PendingVerification,
            guest_initial: 1,
            guest_verified: None,
            guest_final: 1,
            package: None,
            guest_count_change: None,
            package_change: None,
            items: Vec::new(),
            adjustments: Vec::new(),
            payments: Vec::new(),
            subtotal_gross: 0.0,
            subtotal_net: 0.0,
            subtotal_tax: 0.0,
            discount_total: 0.0,
            charge_total: 0.0,
            grand_total_gross: 0.0,
            grand_total_net: 0.0,
            grand_total_tax: 0.0,
            total_paid: 0.0,
            change: 0.0,
            payment_summary: Vec::new(),
            receipt_number: None,
            verified_by: None,
            verified_at: None,
            closed_by: None,
            closed_at: None,
            start_time: now,
            end_time: None,
            created_at: now,
            updated_at: now,
            last_sequence: 0,
            state_checksum: String::new(),
        };
        snapshot.update_checksum();
        snapshot
    }

    pub fn is_closed(&self) -> bool {
        self.status == SessionStatus::Closed
    }

    /// Open in either pre- or post-verification state.
    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }

    /// The change-request slot for a kind.
    pub fn change_slot(&self, kind: ChangeKind) -> Option<&ChangeRequest> {
        match kind {
            ChangeKind::GuestCount => self.guest_count_change.as_ref(),
            ChangeKind::Package => self.package_change.as_ref(),
        }
    }

    pub fn change_slot_mut(&mut self, kind: ChangeKind) -> &mut Option<ChangeRequest> {
        match kind {
            ChangeKind::GuestCount => &mut self.guest_count_change,
            ChangeKind::Package => &mut self.package_change,
        }
    }

    pub fn has_pending_change(&self, kind: ChangeKind) -> bool {
        self.change_slot(kind).is_some_and(|c| c.is_pending())
    }

    pub fn find_item(&self, ticket_id: &str) -> Option<&OrderItemSnapshot> {
        self.items.iter().find(|i| i.ticket_id == ticket_id)
    }

    pub fn find_item_mut(&mut self, ticket_id: &str) -> Option<&mut OrderItemSnapshot> {
        self.items.iter_mut().find(|i| i.ticket_id == ticket_id)
    }

    /// Lines still owed by the kitchen.
    pub fn in_flight_items(&self) -> impl Iterator<Item = &OrderItemSnapshot> {
        self.items.iter().filter(|i| i.is_in_flight())
    }

    /// Lines that count toward the bill.
    pub fn billable_items(&self) -> impl Iterator<Item = &OrderItemSnapshot> {
        self.items.iter().filter(|i| i.is_billable())
    }

    /// Compute state checksum for drift detection
    ///
    /// Returns a 16-character hex string computed from key state fields
    /// that should match between server and client after applying the
    /// same events. Monetary fields are hashed in cents to avoid float
    /// precision issues.
    pub fn compute_checksum(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher as _;

        let mut hasher = DefaultHasher::new();

        self.items.len().hash(&mut hasher);
        ((self.grand_total_gross * 100.0).round() as i64).hash(&mut hasher);
        ((self.total_paid * 100.0).round() as i64).hash(&mut hasher);
        self.last_sequence.hash(&mut hasher);
        (self.status as u8).hash(&mut hasher);

        format!("{:016x}", hasher.finish())
    }

    /// Update the state_checksum field based on current state
    pub fn update_checksum(&mut self) {
        self.state_checksum = self.compute_checksum();
    }

    /// Verify that the state_checksum matches computed checksum
    pub fn verify_checksum(&self) -> bool {
        self.state_checksum == self.compute_checksum()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::new(String::new())
    }
}
