//! Shared types for session event sourcing

use serde::{Deserialize, Serialize};

// ============================================================================
// Kitchen Ticket Types
// ============================================================================

/// Production kind of an order line's kitchen ticket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketKind {
    #[default]
    Standard,
    Refill,
    Addon,
}

/// Fulfillment status of a kitchen ticket.
///
/// Transitions are strictly forward: Pending → Preparing → Ready → Served.
/// Cancelled is reachable from any non-terminal state. Served and
/// Cancelled are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl TicketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Served | TicketStatus::Cancelled)
    }
}

// ============================================================================
// Order Item Types
// ============================================================================

/// Order item input - what a caller submits when placing items.
///
/// Prices and tax rates are denormalized from the catalog at order time;
/// the engine never re-reads the menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub menu_item_id: String,
    pub name: String,
    /// Gross (tax-inclusive) unit price.
    pub unit_price: f64,
    pub quantity: i32,
    /// Tax rate in percent.
    pub tax_rate: f64,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub kind: TicketKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Order item snapshot - one order line with its embedded kitchen ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItemSnapshot {
    /// Ticket ID (unique within the store, assigned by server)
    pub ticket_id: String,
    pub menu_item_id: String,
    pub name: String,
    /// Gross (tax-inclusive) unit price.
    pub unit_price: f64,
    pub quantity: i32,
    /// Tax rate in percent.
    pub tax_rate: f64,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub kind: TicketKind,
    /// True for the automatic package line; it carries no kitchen ticket
    /// and bills regardless of ticket status.
    #[serde(default)]
    pub is_package_line: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub status: TicketStatus,

    // === Transition audit stamps ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    // === Computed by the settlement pass ===
    #[serde(default)]
    pub line_gross: f64,
    #[serde(default)]
    pub line_net: f64,
    #[serde(default)]
    pub line_tax: f64,
}

impl OrderItemSnapshot {
    /// Whether this line counts toward the bill.
    ///
    /// Package lines bill by guest count, not by ticket status; everything
    /// else must have been served, not be complimentary, and carry a
    /// positive price.
    pub fn is_billable(&self) -> bool {
        if self.is_free || self.unit_price <= 0.0 {
            return false;
        }
        self.is_package_line || self.status == TicketStatus::Served
    }

    /// Whether the kitchen still owes this line.
    pub fn is_in_flight(&self) -> bool {
        !self.is_package_line && !self.status.is_terminal()
    }
}

// ============================================================================
// Package Types
// ============================================================================

/// Package offering denormalized at selection time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageSnapshot {
    pub package_id: String,
    pub name: String,
    /// Gross per-guest price.
    pub unit_price: f64,
    /// Tax rate in percent.
    pub tax_rate: f64,
}

// ============================================================================
// Change Request Types
// ============================================================================

/// What a change request wants to change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    GuestCount,
    Package,
}

/// Lifecycle of a change request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Proposed new value carried by a change request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeValue {
    GuestCount(i32),
    Package(PackageSnapshot),
}

impl ChangeValue {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeValue::GuestCount(_) => ChangeKind::GuestCount,
            ChangeValue::Package(_) => ChangeKind::Package,
        }
    }
}

/// One change request, embedded on the session (one slot per kind).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRequest {
    pub kind: ChangeKind,
    pub value: ChangeValue,
    pub reason_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub requested_by: String,
    pub requested_by_name: String,
    pub requested_at: i64,
    pub status: ChangeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl ChangeRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ChangeStatus::Pending
    }
}

// ============================================================================
// Payment and Adjustment Types
// ============================================================================

/// Payment line input - one tender leg of a (possibly split) payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLineInput {
    /// Payment method name (must be accepted by the store)
    pub method: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Payment record stored on the finalized session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub method: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: i64,
}

/// Per-method rollup line on the receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentSummaryItem {
    pub method: String,
    pub amount: f64,
}

/// Manual ledger entry kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    Discount,
    Charge,
}

/// Append-only discount / charge ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentRecord {
    pub adjustment_id: String,
    pub kind: AdjustmentKind,
    /// Always positive; the kind decides the sign at settlement.
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub actor_id: String,
    pub actor_name: String,
    pub timestamp: i64,
}

// ============================================================================
// Receipt
// ============================================================================

/// Immutable receipt document produced by finalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub receipt_number: String,
    pub session_id: String,
    pub store_id: String,
    pub table_name: Option<String>,
    pub guest_count: i32,
    pub subtotal_gross: f64,
    pub subtotal_net: f64,
    pub subtotal_tax: f64,
    pub discount_total: f64,
    pub charge_total: f64,
    pub grand_total_gross: f64,
    pub grand_total_net: f64,
    pub grand_total_tax: f64,
    pub total_paid: f64,
    pub change: f64,
    pub payments: Vec<PaymentSummaryItem>,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: i64,
}

// ============================================================================
// Command Response Types
// ============================================================================

/// Response returned to the submitter of a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResponse {
    pub fn success(command_id: String, session_id: Option<String>) -> Self {
        Self {
            command_id,
            success: true,
            session_id,
            error: None,
        }
    }

    pub fn error(command_id: String, error: CommandError) -> Self {
        Self {
            command_id,
            success: false,
            session_id: None,
            error: Some(error),
        }
    }

    /// Redelivered command that was already processed; reported as
    /// success so retry loops terminate.
    pub fn duplicate(command_id: String) -> Self {
        Self {
            command_id,
            success: true,
            session_id: None,
            error: Some(CommandError {
                code: CommandErrorCode::DuplicateCommand,
                message: "Command already processed".to_string(),
            }),
        }
    }
}

/// Serializable command failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
    pub code: CommandErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: CommandErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandErrorCode {
    // Domain
    SessionNotFound,
    TicketNotFound,
    TableNotFound,
    /// Precondition failed: occupied table, duplicate pending change,
    /// items still in flight, unverified session.
    Conflict,
    /// Change-request resolution raced a prior resolution.
    Stale,
    /// Mutation attempted on a closed session.
    SessionLocked,
    /// Finalize attempted on an already-finalized session.
    AlreadyFinalized,
    /// Serve attempted on a ticket already in a terminal state.
    AlreadyServed,
    InsufficientPayment,
    PermissionDenied,
    /// Engine is offline; settlement refused up front.
    Offline,
    InvalidOperation,
    DuplicateCommand,

    // Storage classification
    StorageFull,
    OutOfMemory,
    StorageCorrupted,
    SystemBusy,
    InternalError,
}
