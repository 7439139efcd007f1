//! Session event sourcing vocabulary
//!
//! Commands express intent, events record immutable facts, and the
//! snapshot is the computed state. The engine applies commands inside a
//! single storage transaction and emits the resulting events.

pub mod command;
pub mod event;
pub mod snapshot;
pub mod types;

pub use command::{SessionCommand, SessionCommandPayload};
pub use event::{EventPayload, SessionEvent, SessionEventType};
pub use snapshot::{SessionSnapshot, SessionStatus};
pub use types::{
    AdjustmentKind, AdjustmentRecord, ChangeKind, ChangeRequest, ChangeStatus, ChangeValue,
    CommandError, CommandErrorCode, CommandResponse, OrderItemInput, OrderItemSnapshot,
    PackageSnapshot, PaymentLineInput, PaymentRecord, PaymentSummaryItem, Receipt, TicketKind,
    TicketStatus,
};
