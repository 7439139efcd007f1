//! SessionsManager - Core command processing and event generation
//!
//! This module handles:
//! - Command validation and processing
//! - Event generation with global sequence numbers
//! - Persistence to redb (transactional)
//! - Snapshot updates
//! - Event broadcasting
//!
//! # Command Flow
//!
//! ```text
//! execute_command(cmd)
//!     ├─ 1. Idempotency check (command_id)
//!     ├─ 2. Begin write transaction
//!     ├─ 3. Create CommandContext
//!     ├─ 4. Convert command to action and execute
//!     ├─ 5. Apply events to snapshots via EventApplier
//!     ├─ 6. Persist events, snapshots and the open-session index
//!     ├─ 7. Mark command processed
//!     ├─ 8. Commit transaction
//!     ├─ 9. Broadcast event(s)
//!     └─ 10. Return response
//! ```

use super::actions::CommandAction;
use super::activity::ActivityLog;
use super::appliers::EventAction;
use super::storage::{SessionStorage, StorageError};
use super::traits::{CommandContext, CommandHandler, CommandMetadata, EventApplier, SessionError};
use crate::config::StoreConfig;
use parking_lot::RwLock;
use serde::Serialize;
use shared::models::TableRecord;
use shared::session::{
    CommandError, CommandErrorCode, CommandResponse, OrderItemSnapshot, Receipt, SessionCommand,
    SessionCommandPayload, SessionEvent, SessionSnapshot, SessionStatus, TicketStatus,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Map storage failures to an error code for the client.
fn classify_storage_error(e: &StorageError) -> CommandErrorCode {
    match e {
        StorageError::Serialization(_) => return CommandErrorCode::InternalError,
        StorageError::SessionNotFound(_) => return CommandErrorCode::SessionNotFound,
        _ => {}
    }

    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return CommandErrorCode::StorageFull;
    }

    if err_str.contains("out of memory") || err_str.contains("cannot allocate") {
        return CommandErrorCode::OutOfMemory;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return CommandErrorCode::StorageCorrupted;
    }

    // redb Database/Transaction/Table/Storage/Commit errors
    CommandErrorCode::SystemBusy
}

impl From<ManagerError> for CommandError {
    fn from(err: ManagerError) -> Self {
        let (code, message) = match err {
            ManagerError::Storage(e) => {
                let code = classify_storage_error(&e);
                let message = e.to_string();
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                (code, message)
            }
            ManagerError::Session(e) => {
                let code = match &e {
                    SessionError::SessionNotFound(_) => CommandErrorCode::SessionNotFound,
                    SessionError::TicketNotFound(_) => CommandErrorCode::TicketNotFound,
                    SessionError::TableNotFound(_) => CommandErrorCode::TableNotFound,
                    SessionError::Conflict(_) => CommandErrorCode::Conflict,
                    SessionError::Stale(_) => CommandErrorCode::Stale,
                    SessionError::SessionLocked(_) => CommandErrorCode::SessionLocked,
                    SessionError::AlreadyFinalized(_) => CommandErrorCode::AlreadyFinalized,
                    SessionError::AlreadyServed(_) => CommandErrorCode::AlreadyServed,
                    SessionError::InsufficientPayment { .. } => {
                        CommandErrorCode::InsufficientPayment
                    }
                    SessionError::PermissionDenied(_) => CommandErrorCode::PermissionDenied,
                    SessionError::Offline(_) => CommandErrorCode::Offline,
                    SessionError::InvalidOperation(_) => CommandErrorCode::InvalidOperation,
                    SessionError::Storage(_) => CommandErrorCode::InternalError,
                };
                (code, e.to_string())
            }
        };
        CommandError::new(code, message)
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;

/// A ticket joined with the session it belongs to, for floor displays.
#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    pub session_id: String,
    pub table_name: Option<String>,
    pub item: OrderItemSnapshot,
}

/// Default cap for the recently-served feed
const SERVED_RECENT_CAP: usize = 20;

/// SessionsManager for command processing
///
/// The `epoch` field is a unique identifier generated on each startup.
/// Clients use it to detect server restarts and trigger full resync.
pub struct SessionsManager {
    storage: SessionStorage,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Server instance epoch - unique ID generated on startup
    epoch: String,
    config: Arc<RwLock<StoreConfig>>,
    /// Finalization requires the engine to be online
    online: Arc<AtomicBool>,
    activity: Option<ActivityLog>,
}

impl std::fmt::Debug for SessionsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionsManager")
            .field("storage", &"<SessionStorage>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl SessionsManager {
    /// Create a new SessionsManager with the given database path
    pub fn new(db_path: impl AsRef<Path>, config: StoreConfig) -> ManagerResult<Self> {
        let storage = SessionStorage::open(db_path)?;
        storage.init_receipt_settings(&config.store_id, &config.receipt_prefix)?;
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, store_id = %config.store_id, "SessionsManager started with new epoch");
        Ok(Self {
            storage,
            event_tx,
            epoch,
            config: Arc::new(RwLock::new(config)),
            online: Arc::new(AtomicBool::new(true)),
            activity: None,
        })
    }

    /// Create a SessionsManager with existing storage (for testing)
    #[cfg(test)]
    pub fn with_storage(storage: SessionStorage, config: StoreConfig) -> Self {
        storage
            .init_receipt_settings(&config.store_id, &config.receipt_prefix)
            .unwrap();
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let epoch = uuid::Uuid::new_v4().to_string();
        Self {
            storage,
            event_tx,
            epoch,
            config: Arc::new(RwLock::new(config)),
            online: Arc::new(AtomicBool::new(true)),
            activity: None,
        }
    }

    /// Get the server epoch (unique instance ID)
    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    /// Attach the best-effort activity feed
    pub fn set_activity_log(&mut self, activity: ActivityLog) {
        self.activity = Some(activity);
    }

    /// Mark the engine online or offline
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Subscribe to event broadcasts
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Get the underlying storage
    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Execute a command and return the response
    pub fn execute_command(&self, cmd: SessionCommand) -> CommandResponse {
        let (response, _events) = self.execute_command_with_events(cmd);
        response
    }

    /// Execute a command and return both the response and generated events
    ///
    /// The events are also broadcast internally; the caller copy is for
    /// surfaces that push them onward themselves.
    pub fn execute_command_with_events(
        &self,
        cmd: SessionCommand,
    ) -> (CommandResponse, Vec<SessionEvent>) {
        match self.process_command(cmd.clone()) {
            Ok((response, events)) => {
                // Broadcast events after successful commit
                for event in &events {
                    let _ = self.event_tx.send(event.clone());
                    if let Some(activity) = &self.activity {
                        activity.record(event);
                    }
                }
                (response, events)
            }
            Err(err) => (CommandResponse::error(cmd.command_id, err.into()), vec![]),
        }
    }

    /// Process command and return response with events
    ///
    /// Uses the action-based architecture:
    /// 1. Convert command to CommandAction
    /// 2. Execute action to generate events
    /// 3. Apply events to snapshots via EventApplier
    /// 4. Persist everything atomically
    fn process_command(
        &self,
        cmd: SessionCommand,
    ) -> ManagerResult<(CommandResponse, Vec<SessionEvent>)> {
        tracing::info!(command_id = %cmd.command_id, payload = ?cmd.payload, "Processing command");

        // 1. Idempotency check (before transaction)
        if self.storage.is_command_processed(&cmd.command_id)? {
            tracing::warn!(command_id = %cmd.command_id, "Duplicate command");
            return Ok((CommandResponse::duplicate(cmd.command_id), vec![]));
        }

        // 2. Settlement needs the engine online; everything else keeps
        //    working against local storage.
        if matches!(cmd.payload, SessionCommandPayload::FinalizeSession { .. })
            && !self.is_online()
        {
            return Err(SessionError::Offline(
                "Cannot finalize while the engine is offline".to_string(),
            )
            .into());
        }

        // 3. Begin write transaction
        let txn = self.storage.begin_write()?;

        // Double-check idempotency within transaction
        if self
            .storage
            .is_command_processed_txn(&txn, &cmd.command_id)?
        {
            return Ok((CommandResponse::duplicate(cmd.command_id), vec![]));
        }

        // 4. Get current sequence for context initialization
        let current_sequence = self.storage.get_current_sequence()?;

        // 5. Create context and metadata
        let mut ctx = CommandContext::new(&txn, &self.storage, current_sequence);
        let metadata = CommandMetadata {
            command_id: cmd.command_id.clone(),
            actor_id: cmd.actor_id.clone(),
            actor_name: cmd.actor_name.clone(),
            actor_role: cmd.actor_role,
            timestamp: cmd.timestamp,
        };

        // 6. Convert to action and execute
        // OpenTable and FinalizeSession need store configuration injected
        let action: CommandAction = match &cmd.payload {
            SessionCommandPayload::OpenTable {
                table_id,
                guest_count,
                package,
                items,
            } => {
                let store_id = self.config.read().store_id.clone();
                CommandAction::OpenTable(super::actions::OpenTableAction {
                    store_id,
                    table_id: table_id.clone(),
                    guest_count: *guest_count,
                    package: package.clone(),
                    items: items.clone(),
                })
            }
            SessionCommandPayload::FinalizeSession {
                session_id,
                payments,
            } => {
                let accepted_methods = self.config.read().payment_methods.clone();
                CommandAction::FinalizeSession(super::actions::FinalizeSessionAction {
                    session_id: session_id.clone(),
                    payments: payments.clone(),
                    accepted_methods,
                })
            }
            _ => (&cmd).into(),
        };
        let events = futures::executor::block_on(action.execute(&mut ctx, &metadata))
            .map_err(ManagerError::from)?;

        // 7. Apply events to snapshots
        for event in &events {
            let mut snapshot = ctx
                .load_snapshot(&event.session_id)
                .unwrap_or_else(|_| SessionSnapshot::new(event.session_id.clone()));

            let applier: EventAction = event.into();
            applier.apply(&mut snapshot, event);

            ctx.save_snapshot(snapshot);
        }

        // 8. Persist events
        for event in &events {
            self.storage.store_event(&txn, event)?;
        }

        // 9. Persist snapshots and update the open-session index
        for snapshot in ctx.modified_snapshots() {
            self.storage.store_snapshot(&txn, snapshot)?;

            match snapshot.status {
                SessionStatus::Closed => {
                    self.storage.mark_session_closed(&txn, &snapshot.session_id)?;
                }
                SessionStatus::PendingVerification | SessionStatus::Active => {
                    self.storage.mark_session_open(&txn, &snapshot.session_id)?;
                }
            }
        }

        // 10. Update sequence counter
        let max_sequence = events
            .iter()
            .map(|e| e.sequence)
            .max()
            .unwrap_or(current_sequence);
        if max_sequence > current_sequence {
            self.storage.set_sequence(&txn, max_sequence)?;
        }

        // 11. Mark command processed
        self.storage.mark_command_processed(&txn, &cmd.command_id)?;

        // 12. Commit transaction
        txn.commit().map_err(StorageError::from)?;

        // 13. Return response
        let session_id = events.first().map(|e| e.session_id.clone());
        tracing::info!(command_id = %cmd.command_id, session_id = ?session_id, event_count = events.len(), "Command processed successfully");
        Ok((CommandResponse::success(cmd.command_id, session_id), events))
    }

    // ========== Public Query Methods ==========

    /// Get a snapshot by session ID
    pub fn get_snapshot(&self, session_id: &str) -> ManagerResult<Option<SessionSnapshot>> {
        Ok(self.storage.get_snapshot(session_id)?)
    }

    /// Get all open session snapshots
    pub fn get_open_sessions(&self) -> ManagerResult<Vec<SessionSnapshot>> {
        Ok(self.storage.get_open_sessions()?)
    }

    /// Tickets waiting to be run to the table, oldest prepared first
    pub fn ready_queue(&self) -> ManagerResult<Vec<TicketView>> {
        let mut tickets: Vec<TicketView> = Vec::new();
        for session in self.storage.get_open_sessions()? {
            for item in &session.items {
                if item.status == TicketStatus::Ready && !item.is_package_line {
                    tickets.push(TicketView {
                        session_id: session.session_id.clone(),
                        table_name: session.table_name.clone(),
                        item: item.clone(),
                    });
                }
            }
        }
        tickets.sort_by_key(|t| t.item.prepared_at.unwrap_or(i64::MAX));
        Ok(tickets)
    }

    /// Most recently served tickets across open sessions, newest first
    pub fn served_recent(&self) -> ManagerResult<Vec<TicketView>> {
        let mut tickets: Vec<TicketView> = Vec::new();
        for session in self.storage.get_open_sessions()? {
            for item in &session.items {
                if item.status == TicketStatus::Served && !item.is_package_line {
                    tickets.push(TicketView {
                        session_id: session.session_id.clone(),
                        table_name: session.table_name.clone(),
                        item: item.clone(),
                    });
                }
            }
        }
        tickets.sort_by_key(|t| std::cmp::Reverse(t.item.served_at.unwrap_or(0)));
        tickets.truncate(SERVED_RECENT_CAP);
        Ok(tickets)
    }

    /// Get current sequence number
    pub fn get_current_sequence(&self) -> ManagerResult<u64> {
        Ok(self.storage.get_current_sequence()?)
    }

    /// Get events since a given sequence
    pub fn get_events_since(&self, since_sequence: u64) -> ManagerResult<Vec<SessionEvent>> {
        Ok(self.storage.get_events_since(since_sequence)?)
    }

    /// Get the full event stream for one session
    pub fn get_session_events(&self, session_id: &str) -> ManagerResult<Vec<SessionEvent>> {
        Ok(self.storage.get_events_for_session(session_id)?)
    }

    /// Rebuild a snapshot from events (for verification)
    ///
    /// Uses EventApplier to apply each event to build the snapshot.
    pub fn rebuild_snapshot(&self, session_id: &str) -> ManagerResult<SessionSnapshot> {
        let events = self.storage.get_events_for_session(session_id)?;
        if events.is_empty() {
            return Err(SessionError::SessionNotFound(session_id.to_string()).into());
        }

        let mut snapshot = SessionSnapshot::new(session_id.to_string());
        for event in &events {
            let applier: EventAction = event.into();
            applier.apply(&mut snapshot, event);
        }

        Ok(snapshot)
    }

    // ========== Table Registry ==========

    /// List all registered tables
    pub fn list_tables(&self) -> ManagerResult<Vec<TableRecord>> {
        Ok(self.storage.list_tables()?)
    }

    /// Get one table by id
    pub fn get_table(&self, table_id: &str) -> ManagerResult<Option<TableRecord>> {
        Ok(self.storage.get_table(table_id)?)
    }

    /// Look up an issued receipt
    pub fn get_receipt(&self, receipt_number: &str) -> ManagerResult<Option<Receipt>> {
        Ok(self.storage.get_receipt(receipt_number)?)
    }

    /// Create numbered tables T{start}..=T{end}, re-enabling disabled
    /// ones. Existing tables keep their status and bound session.
    /// Returns the number of records written.
    pub fn generate_table_range(&self, start: u32, end: u32) -> ManagerResult<usize> {
        if start > end {
            return Err(SessionError::InvalidOperation(format!(
                "Invalid table range: {}..{}",
                start, end
            ))
            .into());
        }

        let txn = self.storage.begin_write()?;
        let mut written = 0;
        for n in start..=end {
            let table_id = format!("T{}", n);
            match self.storage.get_table_txn(&txn, &table_id)? {
                Some(mut record) => {
                    if !record.is_active {
                        record.is_active = true;
                        self.storage.put_table(&txn, &record)?;
                        written += 1;
                    }
                }
                None => {
                    let record = TableRecord::new(table_id, format!("Table {}", n));
                    self.storage.put_table(&txn, &record)?;
                    written += 1;
                }
            }
        }
        txn.commit().map_err(StorageError::from)?;
        tracing::info!(start, end, written, "Table range generated");
        Ok(written)
    }
}

// Make SessionsManager Clone-able via Arc internals
impl Clone for SessionsManager {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            event_tx: self.event_tx.clone(),
            epoch: self.epoch.clone(),
            config: self.config.clone(),
            online: self.online.clone(),
            activity: self.activity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{Role, TableStatus};
    use shared::session::{
        AdjustmentKind, ChangeKind, ChangeValue, OrderItemInput, PaymentLineInput, TicketKind,
    };

    fn test_config() -> StoreConfig {
        StoreConfig {
            store_id: "store-1".to_string(),
            work_dir: ".".to_string(),
            receipt_prefix: "FS-".to_string(),
            payment_methods: vec!["CASH".to_string(), "CARD".to_string()],
            event_channel_capacity: 1024,
        }
    }

    fn create_test_manager() -> SessionsManager {
        let storage = SessionStorage::open_in_memory().unwrap();
        let manager = SessionsManager::with_storage(storage, test_config());
        manager.generate_table_range(1, 5).unwrap();
        manager
    }

    fn simple_item(name: &str, price: f64) -> OrderItemInput {
        OrderItemInput {
            menu_item_id: format!("menu-{}", name),
            name: name.to_string(),
            unit_price: price,
            quantity: 1,
            tax_rate: 0.0,
            is_free: false,
            kind: TicketKind::Standard,
            station: None,
            note: None,
        }
    }

    fn open_cmd(table_id: &str, guest_count: i32, items: Vec<OrderItemInput>) -> SessionCommand {
        SessionCommand::new(
            "cashier-1",
            "Test Cashier",
            Role::Cashier,
            SessionCommandPayload::OpenTable {
                table_id: table_id.to_string(),
                guest_count,
                package: None,
                items,
            },
        )
    }

    fn open_session(manager: &SessionsManager, table_id: &str) -> String {
        let response =
            manager.execute_command(open_cmd(table_id, 2, vec![simple_item("Ramen", 100.0)]));
        assert!(response.success, "open failed: {:?}", response.error);
        response.session_id.unwrap()
    }

    fn verify_session(manager: &SessionsManager, session_id: &str) {
        let response = manager.execute_command(SessionCommand::new(
            "server-1",
            "Test Server",
            Role::Server,
            SessionCommandPayload::VerifySession {
                session_id: session_id.to_string(),
                server_count: 2,
            },
        ));
        assert!(response.success, "verify failed: {:?}", response.error);
    }

    fn first_ticket_id(manager: &SessionsManager, session_id: &str) -> String {
        let snapshot = manager.get_snapshot(session_id).unwrap().unwrap();
        snapshot
            .items
            .iter()
            .find(|i| !i.is_package_line)
            .unwrap()
            .ticket_id
            .clone()
    }

    fn run_ticket_to_served(manager: &SessionsManager, session_id: &str, ticket_id: &str) {
        for payload in [
            SessionCommandPayload::ClaimTicket {
                session_id: session_id.to_string(),
                ticket_id: ticket_id.to_string(),
            },
            SessionCommandPayload::MarkTicketReady {
                session_id: session_id.to_string(),
                ticket_id: ticket_id.to_string(),
            },
            SessionCommandPayload::MarkTicketServed {
                session_id: session_id.to_string(),
                ticket_id: ticket_id.to_string(),
            },
        ] {
            let response = manager.execute_command(SessionCommand::new(
                "kitchen-1",
                "Test Kitchen",
                Role::Kitchen,
                payload,
            ));
            assert!(response.success, "ticket step failed: {:?}", response.error);
        }
    }

    fn finalize_cmd(session_id: &str, amount: f64) -> SessionCommand {
        SessionCommand::new(
            "cashier-1",
            "Test Cashier",
            Role::Cashier,
            SessionCommandPayload::FinalizeSession {
                session_id: session_id.to_string(),
                payments: vec![PaymentLineInput {
                    method: "CASH".to_string(),
                    amount,
                    note: None,
                }],
            },
        )
    }

    #[test]
    fn test_full_session_lifecycle() {
        let manager = create_test_manager();

        let session_id = open_session(&manager, "T1");
        let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
        assert_eq!(snapshot.status, SessionStatus::PendingVerification);

        // Table bound to the session
        let table = manager.get_table("T1").unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_session_id.as_deref(), Some(&session_id[..]));

        verify_session(&manager, &session_id);
        let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
        assert_eq!(snapshot.status, SessionStatus::Active);
        assert_eq!(snapshot.guest_final, 2);

        let ticket_id = first_ticket_id(&manager, &session_id);
        run_ticket_to_served(&manager, &session_id, &ticket_id);

        let response = manager.execute_command(finalize_cmd(&session_id, 120.0));
        assert!(response.success, "finalize failed: {:?}", response.error);

        let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
        assert_eq!(snapshot.status, SessionStatus::Closed);
        assert_eq!(snapshot.receipt_number.as_deref(), Some("FS-000001"));
        assert_eq!(snapshot.total_paid, 120.0);
        assert_eq!(snapshot.change, 20.0);

        // Receipt persisted and table released
        let receipt = manager.get_receipt("FS-000001").unwrap().unwrap();
        assert_eq!(receipt.grand_total_gross, 100.0);
        let table = manager.get_table("T1").unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(table.current_session_id.is_none());

        // No longer in the open index
        assert!(manager.get_open_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_idempotency() {
        let manager = create_test_manager();
        let cmd = open_cmd("T1", 2, vec![]);

        let response1 = manager.execute_command(cmd.clone());
        assert!(response1.success);

        let response2 = manager.execute_command(cmd);
        assert!(response2.success);
        assert_eq!(response2.session_id, None);
        assert_eq!(
            response2.error.unwrap().code,
            CommandErrorCode::DuplicateCommand
        );

        assert_eq!(manager.get_open_sessions().unwrap().len(), 1);
    }

    #[test]
    fn test_occupied_table_rejected() {
        let manager = create_test_manager();
        let _first = open_session(&manager, "T1");

        let response = manager.execute_command(open_cmd("T1", 2, vec![]));
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, CommandErrorCode::Conflict);
    }

    #[test]
    fn test_finalize_before_verification_conflicts() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");

        // Session is still PendingVerification; finalize must not pass
        let response = manager.execute_command(finalize_cmd(&session_id, 200.0));
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, CommandErrorCode::Conflict);
    }

    #[test]
    fn test_second_finalize_already_finalized() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);
        let ticket_id = first_ticket_id(&manager, &session_id);
        run_ticket_to_served(&manager, &session_id, &ticket_id);

        assert!(manager.execute_command(finalize_cmd(&session_id, 100.0)).success);

        let response = manager.execute_command(finalize_cmd(&session_id, 100.0));
        assert!(!response.success);
        assert_eq!(
            response.error.unwrap().code,
            CommandErrorCode::AlreadyFinalized
        );
    }

    #[test]
    fn test_failed_finalize_keeps_receipt_counter_and_table() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);
        let ticket_id = first_ticket_id(&manager, &session_id);
        run_ticket_to_served(&manager, &session_id, &ticket_id);

        // Short payment
        let response = manager.execute_command(finalize_cmd(&session_id, 50.0));
        assert!(!response.success);
        assert_eq!(
            response.error.unwrap().code,
            CommandErrorCode::InsufficientPayment
        );
        let table = manager.get_table("T1").unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);

        // A successful finalize still draws the first number
        let response = manager.execute_command(finalize_cmd(&session_id, 100.0));
        assert!(response.success);
        let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
        assert_eq!(snapshot.receipt_number.as_deref(), Some("FS-000001"));
    }

    #[test]
    fn test_receipt_numbers_are_sequential() {
        let manager = create_test_manager();
        for (n, table) in ["T1", "T2"].iter().enumerate() {
            let session_id = open_session(&manager, table);
            verify_session(&manager, &session_id);
            let ticket_id = first_ticket_id(&manager, &session_id);
            run_ticket_to_served(&manager, &session_id, &ticket_id);
            assert!(manager.execute_command(finalize_cmd(&session_id, 100.0)).success);

            let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
            assert_eq!(
                snapshot.receipt_number.as_deref(),
                Some(format!("FS-{:06}", n + 1).as_str())
            );
        }
    }

    #[test]
    fn test_in_flight_ticket_blocks_finalize() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);

        let response = manager.execute_command(finalize_cmd(&session_id, 500.0));
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, CommandErrorCode::Conflict);
    }

    #[test]
    fn test_offline_gate_rejects_finalize_only() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);
        let ticket_id = first_ticket_id(&manager, &session_id);
        run_ticket_to_served(&manager, &session_id, &ticket_id);

        manager.set_online(false);

        // Non-settlement commands keep working offline
        let response = manager.execute_command(SessionCommand::new(
            "server-1",
            "Test Server",
            Role::Server,
            SessionCommandPayload::AddItems {
                session_id: session_id.clone(),
                items: vec![simple_item("Gyoza", 6.0)],
            },
        ));
        assert!(response.success);

        let response = manager.execute_command(finalize_cmd(&session_id, 200.0));
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, CommandErrorCode::Offline);

        manager.set_online(true);
    }

    #[test]
    fn test_change_request_round_trip() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);

        let response = manager.execute_command(SessionCommand::new(
            "server-1",
            "Test Server",
            Role::Server,
            SessionCommandPayload::SubmitChange {
                session_id: session_id.clone(),
                value: ChangeValue::GuestCount(6),
                reason_code: "MISCOUNT".to_string(),
                note: None,
            },
        ));
        assert!(response.success);

        let response = manager.execute_command(SessionCommand::new(
            "manager-1",
            "Test Manager",
            Role::Manager,
            SessionCommandPayload::ApproveChange {
                session_id: session_id.clone(),
                kind: ChangeKind::GuestCount,
            },
        ));
        assert!(response.success);

        let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
        assert_eq!(snapshot.guest_final, 6);
        assert!(!snapshot.has_pending_change(ChangeKind::GuestCount));
    }

    #[test]
    fn test_adjustments_change_the_bill() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);
        let ticket_id = first_ticket_id(&manager, &session_id);
        run_ticket_to_served(&manager, &session_id, &ticket_id);

        let response = manager.execute_command(SessionCommand::new(
            "cashier-1",
            "Test Cashier",
            Role::Cashier,
            SessionCommandPayload::AddAdjustment {
                session_id: session_id.clone(),
                kind: AdjustmentKind::Discount,
                amount: 30.0,
                note: Some("regular".to_string()),
            },
        ));
        assert!(response.success);

        let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
        assert_eq!(snapshot.grand_total_gross, 70.0);

        // Finalize at the discounted total
        let response = manager.execute_command(finalize_cmd(&session_id, 70.0));
        assert!(response.success, "finalize failed: {:?}", response.error);
    }

    #[test]
    fn test_ready_queue_orders_by_prepared_time() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);

        let response = manager.execute_command(SessionCommand::new(
            "server-1",
            "Test Server",
            Role::Server,
            SessionCommandPayload::AddItems {
                session_id: session_id.clone(),
                items: vec![simple_item("Gyoza", 6.0)],
            },
        ));
        assert!(response.success);

        let snapshot = manager.get_snapshot(&session_id).unwrap().unwrap();
        let ticket_ids: Vec<String> = snapshot
            .items
            .iter()
            .filter(|i| !i.is_package_line)
            .map(|i| i.ticket_id.clone())
            .collect();
        assert_eq!(ticket_ids.len(), 2);

        for ticket_id in &ticket_ids {
            for payload in [
                SessionCommandPayload::ClaimTicket {
                    session_id: session_id.clone(),
                    ticket_id: ticket_id.clone(),
                },
                SessionCommandPayload::MarkTicketReady {
                    session_id: session_id.clone(),
                    ticket_id: ticket_id.clone(),
                },
            ] {
                assert!(
                    manager
                        .execute_command(SessionCommand::new(
                            "kitchen-1",
                            "Test Kitchen",
                            Role::Kitchen,
                            payload,
                        ))
                        .success
                );
            }
        }

        let queue = manager.ready_queue().unwrap();
        assert_eq!(queue.len(), 2);
        // First prepared comes first
        assert_eq!(queue[0].item.ticket_id, ticket_ids[0]);
        assert!(queue[0].item.prepared_at <= queue[1].item.prepared_at);
    }

    #[test]
    fn test_served_recent_excludes_other_states() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);
        let ticket_id = first_ticket_id(&manager, &session_id);
        run_ticket_to_served(&manager, &session_id, &ticket_id);

        let served = manager.served_recent().unwrap();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0].item.ticket_id, ticket_id);
        assert!(manager.ready_queue().unwrap().is_empty());
    }

    #[test]
    fn test_broadcast_delivers_events() {
        let manager = create_test_manager();
        let mut rx = manager.subscribe();

        let session_id = open_session(&manager, "T1");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session_id, session_id);
        assert_eq!(event.sequence, 1);
    }

    #[test]
    fn test_rebuild_matches_stored_snapshot() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");
        verify_session(&manager, &session_id);
        let ticket_id = first_ticket_id(&manager, &session_id);
        run_ticket_to_served(&manager, &session_id, &ticket_id);
        assert!(manager.execute_command(finalize_cmd(&session_id, 100.0)).success);

        let stored = manager.get_snapshot(&session_id).unwrap().unwrap();
        let rebuilt = manager.rebuild_snapshot(&session_id).unwrap();

        assert_eq!(rebuilt.state_checksum, stored.state_checksum);
        assert_eq!(rebuilt.status, SessionStatus::Closed);
        assert_eq!(rebuilt.grand_total_gross, stored.grand_total_gross);
        assert_eq!(rebuilt.last_sequence, stored.last_sequence);
    }

    #[test]
    fn test_generate_table_range_preserves_existing() {
        let manager = create_test_manager();
        let session_id = open_session(&manager, "T1");

        // Re-running the range must not free the occupied table
        let written = manager.generate_table_range(1, 5).unwrap();
        assert_eq!(written, 0);
        let table = manager.get_table("T1").unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_session_id.as_deref(), Some(&session_id[..]));

        // Extending the range creates the new tables only
        let written = manager.generate_table_range(1, 7).unwrap();
        assert_eq!(written, 2);
        assert!(manager.get_table("T7").unwrap().is_some());
    }

    #[test]
    fn test_unknown_session_error_code() {
        let manager = create_test_manager();
        let response = manager.execute_command(SessionCommand::new(
            "server-1",
            "Test Server",
            Role::Server,
            SessionCommandPayload::VerifySession {
                session_id: "missing".to_string(),
                server_count: 2,
            },
        ));
        assert!(!response.success);
        assert_eq!(
            response.error.unwrap().code,
            CommandErrorCode::SessionNotFound
        );
    }
}
