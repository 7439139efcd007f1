//! AddAdjustment command handler
//!
//! Records a manual discount or charge on the session ledger. Entries
//! are append-only; the settlement pass nets them against the bill.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::sessions::money;
use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{
    AdjustmentKind, AdjustmentRecord, EventPayload, SessionEvent, SessionEventType,
};

/// AddAdjustment action
#[derive(Debug, Clone)]
pub struct AddAdjustmentAction {
    pub session_id: String,
    pub kind: AdjustmentKind,
    pub amount: f64,
    pub note: Option<String>,
}

#[async_trait]
impl CommandHandler for AddAdjustmentAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if !metadata.actor_role.can_adjust() {
            return Err(SessionError::PermissionDenied(format!(
                "Role {:?} cannot record adjustments",
                metadata.actor_role
            )));
        }

        let snapshot = ctx.load_snapshot(&self.session_id)?;
        if snapshot.is_closed() {
            return Err(SessionError::SessionLocked(self.session_id.clone()));
        }
        money::validate_adjustment(self.amount)?;

        let record = AdjustmentRecord {
            adjustment_id: Uuid::new_v4().to_string(),
            kind: self.kind,
            amount: self.amount,
            note: self.note.clone(),
            actor_id: metadata.actor_id.clone(),
            actor_name: metadata.actor_name.clone(),
            timestamp: metadata.timestamp,
        };

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            self.session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::AdjustmentAdded,
            EventPayload::AdjustmentAdded { record },
        );

        info!(
            session_id = %self.session_id,
            kind = ?self.kind,
            amount = self.amount,
            "Adjustment added"
        );

        Ok(vec![event])
    }
}
