//! VerifySession command handler
//!
//! The server confirms the headcount after seating. The billing count
//! floors at the cashier's initial count: a higher server count raises
//! it, a lower one never shrinks it (guest-count corrections go through
//! the change-request workflow instead).

use async_trait::async_trait;
use tracing::info;

use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{EventPayload, SessionEvent, SessionEventType, SessionStatus};

/// VerifySession action
#[derive(Debug, Clone)]
pub struct VerifySessionAction {
    pub session_id: String,
    pub server_count: i32,
}

#[async_trait]
impl CommandHandler for VerifySessionAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let snapshot = ctx.load_snapshot(&self.session_id)?;

        match snapshot.status {
            SessionStatus::PendingVerification => {}
            SessionStatus::Active => {
                return Err(SessionError::Conflict(format!(
                    "Session already verified: {}",
                    self.session_id
                )));
            }
            SessionStatus::Closed => {
                return Err(SessionError::SessionLocked(self.session_id.clone()));
            }
        }

        if self.server_count < 1 {
            return Err(SessionError::InvalidOperation(format!(
                "server_count must be at least 1, got {}",
                self.server_count
            )));
        }

        let final_count = snapshot.guest_initial.max(self.server_count);

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            self.session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::SessionVerified,
            EventPayload::SessionVerified {
                server_count: self.server_count,
                final_count,
            },
        );

        info!(
            session_id = %self.session_id,
            initial = snapshot.guest_initial,
            server_count = self.server_count,
            final_count,
            "Session verified"
        );

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::storage::SessionStorage;
    use shared::models::Role;
    use shared::session::SessionSnapshot;

    fn test_metadata() -> CommandMetadata {
        CommandMetadata {
            command_id: "cmd-1".to_string(),
            actor_id: "server-1".to_string(),
            actor_name: "Test Server".to_string(),
            actor_role: Role::Server,
            timestamp: 1234567890,
        }
    }

    fn seed_session(storage: &SessionStorage, guest_initial: i32) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::new("session-1".to_string());
        snapshot.guest_initial = guest_initial;
        snapshot.guest_final = guest_initial;
        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &snapshot).unwrap();
        txn.commit().unwrap();
        snapshot
    }

    async fn verify(storage: &SessionStorage, server_count: i32) -> Result<i32, SessionError> {
        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, storage, 1);
        let action = VerifySessionAction {
            session_id: "session-1".to_string(),
            server_count,
        };
        let events = action.execute(&mut ctx, &test_metadata()).await?;
        let EventPayload::SessionVerified { final_count, .. } = &events[0].payload else {
            panic!("Expected SessionVerified payload");
        };
        Ok(*final_count)
    }

    #[tokio::test]
    async fn test_final_count_floors_at_initial() {
        let storage = SessionStorage::open_in_memory().unwrap();
        // Cashier counted 4, server counted 2 → final stays 4
        seed_session(&storage, 4);
        assert_eq!(verify(&storage, 2).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_higher_server_count_wins() {
        let storage = SessionStorage::open_in_memory().unwrap();
        // Cashier counted 2, server counted 5 → final becomes 5
        seed_session(&storage, 2);
        assert_eq!(verify(&storage, 5).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_verify_twice_conflicts() {
        let storage = SessionStorage::open_in_memory().unwrap();
        let mut snapshot = seed_session(&storage, 4);
        snapshot.status = SessionStatus::Active;
        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &snapshot).unwrap();
        txn.commit().unwrap();

        let err = verify(&storage, 4).await.unwrap_err();
        assert!(matches!(err, SessionError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_verify_closed_session_locked() {
        let storage = SessionStorage::open_in_memory().unwrap();
        let mut snapshot = seed_session(&storage, 4);
        snapshot.status = SessionStatus::Closed;
        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &snapshot).unwrap();
        txn.commit().unwrap();

        let err = verify(&storage, 4).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionLocked(_)));
    }
}
