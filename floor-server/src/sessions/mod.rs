//! Session Event Sourcing Module
//!
//! Implements the dine-in session lifecycle using event sourcing:
//!
//! - **manager**: Core SessionsManager for command processing
//! - **storage**: redb-based persistence for events, snapshots and indices
//! - **actions**: One command handler per command payload
//! - **appliers**: Pure event → snapshot reducers
//! - **money**: Decimal settlement math
//! - **activity**: Best-effort human-readable activity log
//!
//! # Data Flow
//!
//! 1. Caller submits a SessionCommand
//! 2. SessionsManager validates and processes it in one write transaction
//! 3. SessionEvents are generated with a global sequence
//! 4. Events and updated snapshots are persisted atomically
//! 5. Events are broadcast to all subscribers after commit
//! 6. A CommandResponse is returned to the caller

pub mod actions;
pub mod activity;
pub mod appliers;
pub mod manager;
pub mod money;
pub mod storage;
pub mod traits;

// Re-exports
pub use activity::ActivityLog;
pub use manager::{ManagerError, SessionsManager};
pub use storage::{SessionStorage, StorageError};
pub use traits::{CommandContext, CommandHandler, CommandMetadata, EventApplier, SessionError};

// Re-export shared types for convenience
pub use shared::session::{
    CommandError, CommandErrorCode, CommandResponse, EventPayload, SessionCommand,
    SessionCommandPayload, SessionEvent, SessionEventType, SessionSnapshot, SessionStatus,
};
