//! Core abstractions for command processing
//!
//! A command handler runs inside one write transaction, reads and
//! mutates snapshots through the `CommandContext`, and returns the
//! events describing what happened. Appliers fold those events back
//! into snapshots; they are pure and shared between live processing and
//! replay.

use crate::sessions::storage::{SessionStorage, StorageError};
use async_trait::async_trait;
use redb::WriteTransaction;
use shared::models::{ReceiptSettings, Role, TableRecord};
use shared::session::{Receipt, SessionEvent, SessionSnapshot};
use std::collections::HashMap;
use thiserror::Error;

/// Domain errors surfaced by command handlers
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Stale change request: {0}")]
    Stale(String),

    #[error("Session is closed: {0}")]
    SessionLocked(String),

    #[error("Session already finalized: {0}")]
    AlreadyFinalized(String),

    #[error("Ticket already in a terminal state: {0}")]
    AlreadyServed(String),

    #[error("Insufficient payment: paid {paid:.2}, required {required:.2}")]
    InsufficientPayment { paid: f64, required: f64 },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Engine offline: {0}")]
    Offline(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::Storage(err.to_string())
    }
}

/// Metadata extracted from the command envelope
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    pub command_id: String,
    pub actor_id: String,
    pub actor_name: String,
    pub actor_role: Role,
    /// Client timestamp from the command (audit only)
    pub timestamp: i64,
}

/// Command handler - validates and produces events
#[async_trait]
pub trait CommandHandler {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError>;
}

/// Event applier - pure state transition
pub trait EventApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent);
}

/// Execution context for one command, scoped to one write transaction.
///
/// Snapshots written through `save_snapshot` stay in memory until the
/// manager persists them; a later `load_snapshot` in the same command
/// observes the written state, never the stale disk state.
pub struct CommandContext<'a> {
    txn: &'a WriteTransaction,
    storage: &'a SessionStorage,
    sequence: u64,
    modified: HashMap<String, SessionSnapshot>,
}

impl<'a> CommandContext<'a> {
    pub fn new(txn: &'a WriteTransaction, storage: &'a SessionStorage, current_sequence: u64) -> Self {
        Self {
            txn,
            storage,
            sequence: current_sequence,
            modified: HashMap::new(),
        }
    }

    /// Allocate the next global sequence number
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Sequence after the last allocation
    pub fn current_sequence(&self) -> u64 {
        self.sequence
    }

    /// Load a snapshot, preferring in-flight modifications
    pub fn load_snapshot(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        if let Some(snapshot) = self.modified.get(session_id) {
            return Ok(snapshot.clone());
        }
        self.storage
            .get_snapshot_txn(self.txn, session_id)?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    /// Create an empty snapshot for a new session
    pub fn create_snapshot(&self, session_id: String) -> SessionSnapshot {
        SessionSnapshot::new(session_id)
    }

    /// Stage a snapshot for persistence at commit time
    pub fn save_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.modified.insert(snapshot.session_id.clone(), snapshot);
    }

    /// Snapshots staged by this command
    pub fn modified_snapshots(&self) -> impl Iterator<Item = &SessionSnapshot> {
        self.modified.values()
    }

    // ========== Table Registry ==========

    /// Claim a table for a new session.
    ///
    /// Fails with `Conflict` unless the table is enabled and Available.
    pub fn claim_table(
        &self,
        table_id: &str,
        session_id: &str,
    ) -> Result<TableRecord, SessionError> {
        let mut record = self
            .storage
            .get_table_txn(self.txn, table_id)?
            .ok_or_else(|| SessionError::TableNotFound(table_id.to_string()))?;

        if !record.is_openable() {
            return Err(SessionError::Conflict(format!(
                "Table {} is not available (status: {:?})",
                table_id, record.status
            )));
        }

        record.occupy(session_id.to_string());
        self.storage.put_table(self.txn, &record)?;
        Ok(record)
    }

    /// Release a table back to Available. Idempotent; a missing table is
    /// not an error here because release runs during finalization and
    /// must not be able to veto it.
    pub fn release_table(&self, table_id: &str) -> Result<(), SessionError> {
        if let Some(mut record) = self.storage.get_table_txn(self.txn, table_id)? {
            record.release();
            self.storage.put_table(self.txn, &record)?;
        }
        Ok(())
    }

    // ========== Receipts ==========

    /// Allocate the next receipt number for a store and advance the
    /// counter, all inside this transaction. A rollback returns the
    /// number to the pool.
    pub fn allocate_receipt_number(&self, store_id: &str) -> Result<String, SessionError> {
        let mut settings: ReceiptSettings = self
            .storage
            .get_receipt_settings_txn(self.txn, store_id)?
            .ok_or_else(|| {
                SessionError::InvalidOperation(format!(
                    "No receipt settings for store: {}",
                    store_id
                ))
            })?;

        let number = settings.format_number();
        settings.next_receipt_number += 1;
        self.storage.put_receipt_settings(self.txn, &settings)?;
        Ok(number)
    }

    /// Persist an issued receipt
    pub fn store_receipt(&self, receipt: &Receipt) -> Result<(), SessionError> {
        self.storage.store_receipt(self.txn, receipt)?;
        Ok(())
    }
}
