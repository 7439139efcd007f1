//! Kitchen ticket transition handlers
//!
//! Claim, ready, served and cancel share the same shape: load the
//! session, locate the ticket, check the transition is the one forward
//! step allowed from its current status, and emit the transition event.
//! The appliers stamp actor and time on the line.

use async_trait::async_trait;
use tracing::info;

use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{
    EventPayload, OrderItemSnapshot, SessionEvent, SessionEventType, SessionSnapshot, TicketStatus,
};

/// Locate a ticket on an open session; package lines carry no ticket.
fn find_ticket<'a>(
    snapshot: &'a SessionSnapshot,
    session_id: &str,
    ticket_id: &str,
) -> Result<&'a OrderItemSnapshot, SessionError> {
    if snapshot.is_closed() {
        return Err(SessionError::SessionLocked(session_id.to_string()));
    }
    let item = snapshot
        .find_item(ticket_id)
        .ok_or_else(|| SessionError::TicketNotFound(ticket_id.to_string()))?;
    if item.is_package_line {
        return Err(SessionError::InvalidOperation(format!(
            "Package line {} has no kitchen ticket",
            ticket_id
        )));
    }
    Ok(item)
}

fn require_kitchen_role(metadata: &CommandMetadata) -> Result<(), SessionError> {
    if !metadata.actor_role.can_work_tickets() {
        return Err(SessionError::PermissionDenied(format!(
            "Role {:?} cannot work kitchen tickets",
            metadata.actor_role
        )));
    }
    Ok(())
}

fn transition_event(
    ctx: &mut CommandContext<'_>,
    metadata: &CommandMetadata,
    session_id: &str,
    event_type: SessionEventType,
    payload: EventPayload,
) -> SessionEvent {
    let seq = ctx.next_sequence();
    SessionEvent::new(
        seq,
        session_id.to_string(),
        metadata.actor_id.clone(),
        metadata.actor_name.clone(),
        metadata.command_id.clone(),
        Some(metadata.timestamp),
        event_type,
        payload,
    )
}

/// ClaimTicket action - Pending → Preparing
#[derive(Debug, Clone)]
pub struct ClaimTicketAction {
    pub session_id: String,
    pub ticket_id: String,
}

#[async_trait]
impl CommandHandler for ClaimTicketAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        require_kitchen_role(metadata)?;
        let snapshot = ctx.load_snapshot(&self.session_id)?;
        let item = find_ticket(&snapshot, &self.session_id, &self.ticket_id)?;

        if item.status != TicketStatus::Pending {
            return Err(SessionError::InvalidOperation(format!(
                "Cannot claim ticket in {:?} status",
                item.status
            )));
        }

        info!(session_id = %self.session_id, ticket_id = %self.ticket_id, "Ticket claimed");
        Ok(vec![transition_event(
            ctx,
            metadata,
            &self.session_id,
            SessionEventType::TicketClaimed,
            EventPayload::TicketClaimed {
                ticket_id: self.ticket_id.clone(),
            },
        )])
    }
}

/// MarkTicketReady action - Preparing → Ready
#[derive(Debug, Clone)]
pub struct MarkTicketReadyAction {
    pub session_id: String,
    pub ticket_id: String,
}

#[async_trait]
impl CommandHandler for MarkTicketReadyAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        require_kitchen_role(metadata)?;
        let snapshot = ctx.load_snapshot(&self.session_id)?;
        let item = find_ticket(&snapshot, &self.session_id, &self.ticket_id)?;

        if item.status != TicketStatus::Preparing {
            return Err(SessionError::InvalidOperation(format!(
                "Cannot mark ticket ready from {:?} status",
                item.status
            )));
        }

        info!(session_id = %self.session_id, ticket_id = %self.ticket_id, "Ticket ready");
        Ok(vec![transition_event(
            ctx,
            metadata,
            &self.session_id,
            SessionEventType::TicketPrepared,
            EventPayload::TicketPrepared {
                ticket_id: self.ticket_id.clone(),
            },
        )])
    }
}

/// MarkTicketServed action - Ready → Served
#[derive(Debug, Clone)]
pub struct MarkTicketServedAction {
    pub session_id: String,
    pub ticket_id: String,
}

#[async_trait]
impl CommandHandler for MarkTicketServedAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let snapshot = ctx.load_snapshot(&self.session_id)?;
        let item = find_ticket(&snapshot, &self.session_id, &self.ticket_id)?;

        // Double-serve (and serve-after-cancel) must fail loudly; the
        // served flag is what makes the line billable.
        if item.status.is_terminal() {
            return Err(SessionError::AlreadyServed(self.ticket_id.clone()));
        }
        if item.status != TicketStatus::Ready {
            return Err(SessionError::InvalidOperation(format!(
                "Cannot serve ticket in {:?} status",
                item.status
            )));
        }

        info!(session_id = %self.session_id, ticket_id = %self.ticket_id, "Ticket served");
        Ok(vec![transition_event(
            ctx,
            metadata,
            &self.session_id,
            SessionEventType::TicketServed,
            EventPayload::TicketServed {
                ticket_id: self.ticket_id.clone(),
            },
        )])
    }
}

/// CancelTicket action - any non-terminal status → Cancelled
#[derive(Debug, Clone)]
pub struct CancelTicketAction {
    pub session_id: String,
    pub ticket_id: String,
    pub reason: String,
}

#[async_trait]
impl CommandHandler for CancelTicketAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if self.reason.trim().is_empty() {
            return Err(SessionError::InvalidOperation(
                "Cancellation requires a reason".to_string(),
            ));
        }

        let snapshot = ctx.load_snapshot(&self.session_id)?;
        let item = find_ticket(&snapshot, &self.session_id, &self.ticket_id)?;

        match item.status {
            TicketStatus::Served => {
                return Err(SessionError::AlreadyServed(self.ticket_id.clone()));
            }
            TicketStatus::Cancelled => {
                return Err(SessionError::InvalidOperation(format!(
                    "Ticket already cancelled: {}",
                    self.ticket_id
                )));
            }
            _ => {}
        }

        info!(
            session_id = %self.session_id,
            ticket_id = %self.ticket_id,
            reason = %self.reason,
            "Ticket cancelled"
        );
        Ok(vec![transition_event(
            ctx,
            metadata,
            &self.session_id,
            SessionEventType::TicketCancelled,
            EventPayload::TicketCancelled {
                ticket_id: self.ticket_id.clone(),
                reason: self.reason.clone(),
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::storage::SessionStorage;
    use shared::models::Role;
    use shared::session::{SessionStatus, TicketKind};

    fn metadata_with_role(role: Role) -> CommandMetadata {
        CommandMetadata {
            command_id: "cmd-1".to_string(),
            actor_id: "actor-1".to_string(),
            actor_name: "Test Actor".to_string(),
            actor_role: role,
            timestamp: 1234567890,
        }
    }

    fn item_with_status(ticket_id: &str, status: TicketStatus) -> OrderItemSnapshot {
        OrderItemSnapshot {
            ticket_id: ticket_id.to_string(),
            menu_item_id: "menu-1".to_string(),
            name: "Ramen".to_string(),
            unit_price: 12.5,
            quantity: 1,
            tax_rate: 12.0,
            is_free: false,
            kind: TicketKind::Standard,
            is_package_line: false,
            station: None,
            note: None,
            status,
            placed_at: Some(0),
            claimed_at: None,
            claimed_by: None,
            prepared_at: None,
            prepared_by: None,
            served_at: None,
            served_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
            line_gross: 0.0,
            line_net: 0.0,
            line_tax: 0.0,
        }
    }

    fn seed_session_with_ticket(storage: &SessionStorage, status: TicketStatus) {
        let mut snapshot = SessionSnapshot::new("session-1".to_string());
        snapshot.status = SessionStatus::Active;
        snapshot.items.push(item_with_status("tkt-1", status));
        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &snapshot).unwrap();
        txn.commit().unwrap();
    }

    #[tokio::test]
    async fn test_claim_pending_ticket() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Pending);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = ClaimTicketAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-1".to_string(),
        };

        let events = action
            .execute(&mut ctx, &metadata_with_role(Role::Kitchen))
            .await
            .unwrap();
        assert_eq!(events[0].event_type, SessionEventType::TicketClaimed);
    }

    #[tokio::test]
    async fn test_claim_requires_kitchen_role() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Pending);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = ClaimTicketAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-1".to_string(),
        };

        let err = action
            .execute(&mut ctx, &metadata_with_role(Role::Server))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_no_skipping_pending_to_served() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Pending);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = MarkTicketServedAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-1".to_string(),
        };

        let err = action
            .execute(&mut ctx, &metadata_with_role(Role::Server))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_serve_ready_ticket() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Ready);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = MarkTicketServedAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-1".to_string(),
        };

        let events = action
            .execute(&mut ctx, &metadata_with_role(Role::Server))
            .await
            .unwrap();
        assert_eq!(events[0].event_type, SessionEventType::TicketServed);
    }

    #[tokio::test]
    async fn test_double_serve_fails_already_served() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Served);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = MarkTicketServedAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-1".to_string(),
        };

        let err = action
            .execute(&mut ctx, &metadata_with_role(Role::Server))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyServed(_)));
    }

    #[tokio::test]
    async fn test_cancel_requires_reason() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Preparing);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = CancelTicketAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-1".to_string(),
            reason: "  ".to_string(),
        };

        let err = action
            .execute(&mut ctx, &metadata_with_role(Role::Server))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_cancel_served_ticket_fails() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Served);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = CancelTicketAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-1".to_string(),
            reason: "out of stock".to_string(),
        };

        let err = action
            .execute(&mut ctx, &metadata_with_role(Role::Server))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyServed(_)));
    }

    #[tokio::test]
    async fn test_unknown_ticket() {
        let storage = SessionStorage::open_in_memory().unwrap();
        seed_session_with_ticket(&storage, TicketStatus::Pending);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 1);
        let action = ClaimTicketAction {
            session_id: "session-1".to_string(),
            ticket_id: "tkt-missing".to_string(),
        };

        let err = action
            .execute(&mut ctx, &metadata_with_role(Role::Kitchen))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::TicketNotFound(_)));
    }
}
