//! AddItems command handler
//!
//! Places additional items on an open session. Each item gets a fresh
//! kitchen ticket in Pending.

use async_trait::async_trait;
use tracing::info;

use crate::sessions::money;
use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{EventPayload, OrderItemInput, SessionEvent, SessionEventType};

/// AddItems action
#[derive(Debug, Clone)]
pub struct AddItemsAction {
    pub session_id: String,
    pub items: Vec<OrderItemInput>,
}

#[async_trait]
impl CommandHandler for AddItemsAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let snapshot = ctx.load_snapshot(&self.session_id)?;

        if snapshot.is_closed() {
            return Err(SessionError::SessionLocked(self.session_id.clone()));
        }
        if self.items.is_empty() {
            return Err(SessionError::InvalidOperation(
                "no items to add".to_string(),
            ));
        }
        for item in &self.items {
            money::validate_order_item(item)?;
        }

        let items = self.items.iter().map(super::input_to_item).collect::<Vec<_>>();

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            self.session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::ItemsAdded,
            EventPayload::ItemsAdded { items },
        );

        info!(
            session_id = %self.session_id,
            item_count = self.items.len(),
            "Items added"
        );

        Ok(vec![event])
    }
}
