//! redb-based storage layer for session event sourcing
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `events` | `(session_id, sequence)` | `SessionEvent` | Event stream (append-only) |
//! | `snapshots` | `session_id` | `SessionSnapshot` | Snapshot cache |
//! | `active_sessions` | `session_id` | `()` | Open session index |
//! | `processed_commands` | `command_id` | `()` | Idempotency check |
//! | `sequence_counter` | `"seq"` | `u64` | Global sequence |
//! | `dining_tables` | `table_id` | `TableRecord` | Table registry |
//! | `receipt_settings` | `store_id` | `ReceiptSettings` | Receipt counter |
//! | `receipts` | `receipt_number` | `Receipt` | Immutable receipts |
//!
//! # Durability
//!
//! redb commits are persistent as soon as `commit()` returns
//! (copy-on-write with atomic pointer swap), so a power cut leaves the
//! database in the last committed state. Snapshots are persisted after
//! every event.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{ReceiptSettings, TableRecord};
use shared::session::{Receipt, SessionEvent, SessionSnapshot};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for storing events: key = (session_id, sequence), value = JSON-serialized SessionEvent
const EVENTS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("events");

/// Table for storing snapshots: key = session_id, value = JSON-serialized SessionSnapshot
const SNAPSHOTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Table for tracking open sessions: key = session_id, value = empty (existence check)
const ACTIVE_SESSIONS_TABLE: TableDefinition<&str, ()> = TableDefinition::new("active_sessions");

/// Table for tracking processed commands: key = command_id, value = empty (idempotency)
const PROCESSED_COMMANDS_TABLE: TableDefinition<&str, ()> =
    TableDefinition::new("processed_commands");

/// Table for sequence counter: key = "seq", value = u64
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

/// Table registry: key = table_id, value = JSON-serialized TableRecord
const DINING_TABLES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("dining_tables");

/// Receipt settings: key = store_id, value = JSON-serialized ReceiptSettings
const RECEIPT_SETTINGS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("receipt_settings");

/// Issued receipts: key = receipt_number, value = JSON-serialized Receipt
const RECEIPTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("receipts");

const SEQUENCE_KEY: &str = "seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Session storage backed by redb
#[derive(Clone)]
pub struct SessionStorage {
    db: Arc<Database>,
}

impl SessionStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(EVENTS_TABLE)?;
            let _ = write_txn.open_table(SNAPSHOTS_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_SESSIONS_TABLE)?;
            let _ = write_txn.open_table(PROCESSED_COMMANDS_TABLE)?;
            let _ = write_txn.open_table(DINING_TABLES_TABLE)?;
            let _ = write_txn.open_table(RECEIPT_SETTINGS_TABLE)?;
            let _ = write_txn.open_table(RECEIPTS_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Sequence Operations ==========

    /// Get current sequence (read-only)
    pub fn get_current_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    /// Set sequence number (within transaction)
    ///
    /// The manager updates the counter once per command, after the
    /// handler generated its events.
    pub fn set_sequence(&self, txn: &WriteTransaction, sequence: u64) -> StorageResult<()> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        table.insert(SEQUENCE_KEY, sequence)?;
        Ok(())
    }

    // ========== Command Idempotency ==========

    /// Check if a command has been processed
    pub fn is_command_processed(&self, command_id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROCESSED_COMMANDS_TABLE)?;
        Ok(table.get(command_id)?.is_some())
    }

    /// Check if a command has been processed (within transaction)
    pub fn is_command_processed_txn(
        &self,
        txn: &WriteTransaction,
        command_id: &str,
    ) -> StorageResult<bool> {
        let table = txn.open_table(PROCESSED_COMMANDS_TABLE)?;
        Ok(table.get(command_id)?.is_some())
    }

    /// Mark a command as processed
    pub fn mark_command_processed(
        &self,
        txn: &WriteTransaction,
        command_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PROCESSED_COMMANDS_TABLE)?;
        table.insert(command_id, ())?;
        Ok(())
    }

    // ========== Event Operations ==========

    /// Store an event
    pub fn store_event(&self, txn: &WriteTransaction, event: &SessionEvent) -> StorageResult<()> {
        let mut table = txn.open_table(EVENTS_TABLE)?;
        let key = (event.session_id.as_str(), event.sequence);
        let value = serde_json::to_vec(event)?;
        table.insert(key, value.as_slice())?;
        Ok(())
    }

    /// Get all events for a session, ordered by sequence
    pub fn get_events_for_session(&self, session_id: &str) -> StorageResult<Vec<SessionEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        let mut events = Vec::new();
        let range_start = (session_id, 0u64);
        let range_end = (session_id, u64::MAX);

        for result in table.range(range_start..=range_end)? {
            let (_key, value) = result?;
            let event: SessionEvent = serde_json::from_slice(value.value())?;
            events.push(event);
        }

        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    /// Get events since a given sequence (across all sessions)
    pub fn get_events_since(&self, since_sequence: u64) -> StorageResult<Vec<SessionEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        let mut events = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let event: SessionEvent = serde_json::from_slice(value.value())?;
            if event.sequence > since_sequence {
                events.push(event);
            }
        }

        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    // ========== Snapshot Operations ==========

    /// Store a snapshot
    pub fn store_snapshot(
        &self,
        txn: &WriteTransaction,
        snapshot: &SessionSnapshot,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(SNAPSHOTS_TABLE)?;
        let value = serde_json::to_vec(snapshot)?;
        table.insert(snapshot.session_id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get a snapshot by session ID
    pub fn get_snapshot(&self, session_id: &str) -> StorageResult<Option<SessionSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SNAPSHOTS_TABLE)?;

        match table.get(session_id)? {
            Some(value) => {
                let snapshot: SessionSnapshot = serde_json::from_slice(value.value())?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Get a snapshot by session ID (within transaction)
    pub fn get_snapshot_txn(
        &self,
        txn: &WriteTransaction,
        session_id: &str,
    ) -> StorageResult<Option<SessionSnapshot>> {
        let table = txn.open_table(SNAPSHOTS_TABLE)?;

        match table.get(session_id)? {
            Some(value) => {
                let snapshot: SessionSnapshot = serde_json::from_slice(value.value())?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    // ========== Open Session Index ==========

    /// Mark a session as open (pending verification or active)
    pub fn mark_session_open(&self, txn: &WriteTransaction, session_id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(ACTIVE_SESSIONS_TABLE)?;
        table.insert(session_id, ())?;
        Ok(())
    }

    /// Remove a session from the open index (on finalization)
    pub fn mark_session_closed(
        &self,
        txn: &WriteTransaction,
        session_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(ACTIVE_SESSIONS_TABLE)?;
        table.remove(session_id)?;
        Ok(())
    }

    /// Check if a session is open
    pub fn is_session_open(&self, session_id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACTIVE_SESSIONS_TABLE)?;
        Ok(table.get(session_id)?.is_some())
    }

    /// Get all open session IDs
    pub fn get_open_session_ids(&self) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACTIVE_SESSIONS_TABLE)?;

        let mut session_ids: Vec<String> = Vec::new();
        for result in table.iter()? {
            let (key, _value) = result?;
            session_ids.push(key.value().to_string());
        }

        Ok(session_ids)
    }

    /// Get all open session snapshots
    pub fn get_open_sessions(&self) -> StorageResult<Vec<SessionSnapshot>> {
        let open_ids = self.get_open_session_ids()?;
        let mut snapshots = Vec::new();

        for session_id in open_ids {
            if let Some(snapshot) = self.get_snapshot(&session_id)? {
                snapshots.push(snapshot);
            }
        }

        Ok(snapshots)
    }

    // ========== Table Registry ==========

    /// Get a table record
    pub fn get_table(&self, table_id: &str) -> StorageResult<Option<TableRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DINING_TABLES_TABLE)?;

        match table.get(table_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a table record (within transaction)
    pub fn get_table_txn(
        &self,
        txn: &WriteTransaction,
        table_id: &str,
    ) -> StorageResult<Option<TableRecord>> {
        let table = txn.open_table(DINING_TABLES_TABLE)?;

        match table.get(table_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a table record (within transaction)
    pub fn put_table(&self, txn: &WriteTransaction, record: &TableRecord) -> StorageResult<()> {
        let mut table = txn.open_table(DINING_TABLES_TABLE)?;
        let value = serde_json::to_vec(record)?;
        table.insert(record.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// List all table records, sorted by ID
    pub fn list_tables(&self) -> StorageResult<Vec<TableRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DINING_TABLES_TABLE)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            records.push(serde_json::from_slice(value.value())?);
        }

        Ok(records)
    }

    // ========== Receipt Settings ==========

    /// Get receipt settings for a store
    pub fn get_receipt_settings(&self, store_id: &str) -> StorageResult<Option<ReceiptSettings>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECEIPT_SETTINGS_TABLE)?;

        match table.get(store_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get receipt settings (within transaction)
    ///
    /// The finalizer must re-read settings inside its own transaction so
    /// the counter it increments is the one it read.
    pub fn get_receipt_settings_txn(
        &self,
        txn: &WriteTransaction,
        store_id: &str,
    ) -> StorageResult<Option<ReceiptSettings>> {
        let table = txn.open_table(RECEIPT_SETTINGS_TABLE)?;

        match table.get(store_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace receipt settings (within transaction)
    pub fn put_receipt_settings(
        &self,
        txn: &WriteTransaction,
        settings: &ReceiptSettings,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(RECEIPT_SETTINGS_TABLE)?;
        let value = serde_json::to_vec(settings)?;
        table.insert(settings.store_id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Bootstrap receipt settings if the store has none yet
    pub fn init_receipt_settings(&self, store_id: &str, prefix: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(RECEIPT_SETTINGS_TABLE)?;
            if table.get(store_id)?.is_none() {
                let settings = ReceiptSettings::new(store_id, prefix);
                let value = serde_json::to_vec(&settings)?;
                table.insert(store_id, value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Receipts ==========

    /// Store an issued receipt (within the finalization transaction)
    pub fn store_receipt(&self, txn: &WriteTransaction, receipt: &Receipt) -> StorageResult<()> {
        let mut table = txn.open_table(RECEIPTS_TABLE)?;
        let value = serde_json::to_vec(receipt)?;
        table.insert(receipt.receipt_number.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get an issued receipt by number
    pub fn get_receipt(&self, receipt_number: &str) -> StorageResult<Option<Receipt>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECEIPTS_TABLE)?;

        match table.get(receipt_number)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ========== Stats ==========

    /// Count stored events (diagnostics)
    pub fn event_count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;
        Ok(table.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::session::{EventPayload, SessionEventType};

    fn test_event(session_id: &str, sequence: u64) -> SessionEvent {
        SessionEvent::new(
            sequence,
            session_id.to_string(),
            "user-1".to_string(),
            "Test User".to_string(),
            format!("cmd-{}", sequence),
            None,
            SessionEventType::TicketClaimed,
            EventPayload::TicketClaimed {
                ticket_id: "tkt-1".to_string(),
            },
        )
    }

    #[test]
    fn test_sequence_starts_at_zero_and_persists() {
        let storage = SessionStorage::open_in_memory().unwrap();
        assert_eq!(storage.get_current_sequence().unwrap(), 0);

        let txn = storage.begin_write().unwrap();
        storage.set_sequence(&txn, 5).unwrap();
        txn.commit().unwrap();

        assert_eq!(storage.get_current_sequence().unwrap(), 5);
    }

    #[test]
    fn test_command_idempotency_marking() {
        let storage = SessionStorage::open_in_memory().unwrap();
        assert!(!storage.is_command_processed("cmd-1").unwrap());

        let txn = storage.begin_write().unwrap();
        assert!(!storage.is_command_processed_txn(&txn, "cmd-1").unwrap());
        storage.mark_command_processed(&txn, "cmd-1").unwrap();
        assert!(storage.is_command_processed_txn(&txn, "cmd-1").unwrap());
        txn.commit().unwrap();

        assert!(storage.is_command_processed("cmd-1").unwrap());
    }

    #[test]
    fn test_events_roundtrip_ordered_by_sequence() {
        let storage = SessionStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        for seq in [3u64, 1, 2] {
            storage.store_event(&txn, &test_event("session-1", seq)).unwrap();
        }
        storage.store_event(&txn, &test_event("session-2", 4)).unwrap();
        txn.commit().unwrap();

        let events = storage.get_events_for_session("session-1").unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let since = storage.get_events_since(2).unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].sequence, 3);
        assert_eq!(since[1].sequence, 4);
    }

    #[test]
    fn test_snapshot_store_and_open_index() {
        let storage = SessionStorage::open_in_memory().unwrap();

        let snapshot = SessionSnapshot::new("session-1".to_string());
        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &snapshot).unwrap();
        storage.mark_session_open(&txn, "session-1").unwrap();
        txn.commit().unwrap();

        assert!(storage.is_session_open("session-1").unwrap());
        let loaded = storage.get_snapshot("session-1").unwrap().unwrap();
        assert_eq!(loaded.session_id, "session-1");
        assert_eq!(storage.get_open_sessions().unwrap().len(), 1);

        let txn = storage.begin_write().unwrap();
        storage.mark_session_closed(&txn, "session-1").unwrap();
        txn.commit().unwrap();
        assert!(!storage.is_session_open("session-1").unwrap());
        // Closed session stays readable
        assert!(storage.get_snapshot("session-1").unwrap().is_some());
    }

    #[test]
    fn test_table_registry_roundtrip() {
        let storage = SessionStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        let mut record = TableRecord::new("T1".to_string(), "Table 1".to_string());
        storage.put_table(&txn, &record).unwrap();
        record.occupy("session-1".to_string());
        storage.put_table(&txn, &record).unwrap();
        txn.commit().unwrap();

        let loaded = storage.get_table("T1").unwrap().unwrap();
        assert_eq!(loaded.current_session_id.as_deref(), Some("session-1"));
        assert_eq!(storage.list_tables().unwrap().len(), 1);
        assert!(storage.get_table("T9").unwrap().is_none());
    }

    #[test]
    fn test_receipt_settings_init_is_idempotent() {
        let storage = SessionStorage::open_in_memory().unwrap();
        storage.init_receipt_settings("store-1", "FS-").unwrap();

        // Bump the counter, then re-init; the counter must survive
        let txn = storage.begin_write().unwrap();
        let mut settings = storage
            .get_receipt_settings_txn(&txn, "store-1")
            .unwrap()
            .unwrap();
        settings.next_receipt_number = 10;
        storage.put_receipt_settings(&txn, &settings).unwrap();
        txn.commit().unwrap();

        storage.init_receipt_settings("store-1", "FS-").unwrap();
        let settings = storage.get_receipt_settings("store-1").unwrap().unwrap();
        assert_eq!(settings.next_receipt_number, 10);
    }

    #[test]
    fn test_reopen_from_disk_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.redb");

        {
            let storage = SessionStorage::open(&path).unwrap();
            let txn = storage.begin_write().unwrap();
            storage.store_event(&txn, &test_event("session-1", 1)).unwrap();
            storage.set_sequence(&txn, 1).unwrap();
            txn.commit().unwrap();
        }

        let storage = SessionStorage::open(&path).unwrap();
        assert_eq!(storage.get_current_sequence().unwrap(), 1);
        assert_eq!(storage.get_events_for_session("session-1").unwrap().len(), 1);
        assert_eq!(storage.event_count().unwrap(), 1);
    }
}
