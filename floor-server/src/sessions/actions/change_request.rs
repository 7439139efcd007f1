//! Change request handlers
//!
//! A session holds at most one pending request per kind (guest count,
//! package). Submitting while one is pending is a Conflict; resolving
//! one that is no longer pending is Stale. Approval applies the value
//! in the same atomic pass that flips the request status.

use async_trait::async_trait;
use tracing::info;

use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{
    ChangeKind, ChangeRequest, ChangeStatus, ChangeValue, EventPayload, SessionEvent,
    SessionEventType, SessionSnapshot,
};

fn require_resolver_role(metadata: &CommandMetadata) -> Result<(), SessionError> {
    if !metadata.actor_role.can_resolve_changes() {
        return Err(SessionError::PermissionDenied(format!(
            "Role {:?} cannot resolve change requests",
            metadata.actor_role
        )));
    }
    Ok(())
}

/// The pending request of a kind, or Stale.
fn pending_request(
    snapshot: &SessionSnapshot,
    kind: ChangeKind,
) -> Result<&ChangeRequest, SessionError> {
    match snapshot.change_slot(kind) {
        Some(request) if request.is_pending() => Ok(request),
        Some(_) => Err(SessionError::Stale(format!(
            "{:?} change request already resolved",
            kind
        ))),
        None => Err(SessionError::Stale(format!(
            "No {:?} change request on session {}",
            kind, snapshot.session_id
        ))),
    }
}

/// SubmitChange action
#[derive(Debug, Clone)]
pub struct SubmitChangeAction {
    pub session_id: String,
    pub value: ChangeValue,
    pub reason_code: String,
    pub note: Option<String>,
}

#[async_trait]
impl CommandHandler for SubmitChangeAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let snapshot = ctx.load_snapshot(&self.session_id)?;
        let kind = self.value.kind();

        if snapshot.is_closed() {
            return Err(SessionError::Conflict(format!(
                "Session is closed: {}",
                self.session_id
            )));
        }
        if snapshot.has_pending_change(kind) {
            return Err(SessionError::Conflict(format!(
                "A {:?} change request is already pending",
                kind
            )));
        }
        if self.reason_code.trim().is_empty() {
            return Err(SessionError::InvalidOperation(
                "Change request requires a reason code".to_string(),
            ));
        }
        if let ChangeValue::GuestCount(count) = self.value
            && count < 1
        {
            return Err(SessionError::InvalidOperation(format!(
                "guest count must be at least 1, got {}",
                count
            )));
        }

        let request = ChangeRequest {
            kind,
            value: self.value.clone(),
            reason_code: self.reason_code.clone(),
            note: self.note.clone(),
            requested_by: metadata.actor_id.clone(),
            requested_by_name: metadata.actor_name.clone(),
            requested_at: metadata.timestamp,
            status: ChangeStatus::Pending,
            resolved_by: None,
            resolved_at: None,
        };

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            self.session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::ChangeRequested,
            EventPayload::ChangeRequested { request },
        );

        info!(
            session_id = %self.session_id,
            kind = ?kind,
            reason_code = %self.reason_code,
            "Change requested"
        );

        Ok(vec![event])
    }
}

/// ApproveChange action
#[derive(Debug, Clone)]
pub struct ApproveChangeAction {
    pub session_id: String,
    pub kind: ChangeKind,
}

#[async_trait]
impl CommandHandler for ApproveChangeAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        require_resolver_role(metadata)?;
        let snapshot = ctx.load_snapshot(&self.session_id)?;
        if snapshot.is_closed() {
            return Err(SessionError::SessionLocked(self.session_id.clone()));
        }
        let request = pending_request(&snapshot, self.kind)?;
        let value = request.value.clone();

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            self.session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::ChangeApproved,
            EventPayload::ChangeApproved {
                kind: self.kind,
                value,
            },
        );

        info!(session_id = %self.session_id, kind = ?self.kind, "Change approved");
        Ok(vec![event])
    }
}

/// RejectChange action
#[derive(Debug, Clone)]
pub struct RejectChangeAction {
    pub session_id: String,
    pub kind: ChangeKind,
}

#[async_trait]
impl CommandHandler for RejectChangeAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        require_resolver_role(metadata)?;
        let snapshot = ctx.load_snapshot(&self.session_id)?;
        if snapshot.is_closed() {
            return Err(SessionError::SessionLocked(self.session_id.clone()));
        }
        pending_request(&snapshot, self.kind)?;

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            self.session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::ChangeRejected,
            EventPayload::ChangeRejected { kind: self.kind },
        );

        info!(session_id = %self.session_id, kind = ?self.kind, "Change rejected");
        Ok(vec![event])
    }
}
