//! OpenTable command handler
//!
//! Claims the table, creates the session in PendingVerification and
//! places the first round of items. The optional package becomes an
//! automatic billable line whose quantity tracks the guest count.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::sessions::money;
use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{
    EventPayload, OrderItemInput, OrderItemSnapshot, PackageSnapshot, SessionEvent,
    SessionEventType, TicketKind, TicketStatus,
};

/// Build the automatic package line for a selected package.
///
/// It never enters the kitchen pipeline; its quantity is the billing
/// guest count and is maintained by the appliers.
pub(crate) fn package_line(
    session_id: &str,
    package: &PackageSnapshot,
    guest_count: i32,
    timestamp: i64,
) -> OrderItemSnapshot {
    OrderItemSnapshot {
        ticket_id: format!("pkg-{}", session_id),
        menu_item_id: package.package_id.clone(),
        name: package.name.clone(),
        unit_price: package.unit_price,
        quantity: guest_count,
        tax_rate: package.tax_rate,
        is_free: false,
        kind: TicketKind::Standard,
        is_package_line: true,
        station: None,
        note: None,
        status: TicketStatus::Pending,
        placed_at: Some(timestamp),
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

fn validate_package(package: &PackageSnapshot) -> Result<(), SessionError> {
    if !package.unit_price.is_finite() || package.unit_price < 0.0 {
        return Err(SessionError::InvalidOperation(format!(
            "package unit_price out of range: {}",
            package.unit_price
        )));
    }
    if !package.tax_rate.is_finite() || !(0.0..=100.0).contains(&package.tax_rate) {
        return Err(SessionError::InvalidOperation(format!(
            "package tax_rate out of range: {}",
            package.tax_rate
        )));
    }
    Ok(())
}

/// OpenTable action
#[derive(Debug, Clone)]
pub struct OpenTableAction {
    /// Store the session bills under (injected by SessionsManager)
    pub store_id: String,
    pub table_id: String,
    pub guest_count: i32,
    pub package: Option<PackageSnapshot>,
    pub items: Vec<OrderItemInput>,
}

#[async_trait]
impl CommandHandler for OpenTableAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if self.guest_count < 1 {
            return Err(SessionError::InvalidOperation(format!(
                "guest_count must be at least 1, got {}",
                self.guest_count
            )));
        }
        for item in &self.items {
            money::validate_order_item(item)?;
        }
        if let Some(package) = &self.package {
            validate_package(package)?;
        }

        let session_id = Uuid::new_v4().to_string();

        // Claiming fails with Conflict unless the table is free; the
        // registry write rides this transaction.
        let record = ctx.claim_table(&self.table_id, &session_id)?;

        let mut items: Vec<OrderItemSnapshot> =
            self.items.iter().map(super::input_to_item).collect();
        if let Some(package) = &self.package {
            items.push(package_line(
                &session_id,
                package,
                self.guest_count,
                metadata.timestamp,
            ));
        }

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::TableOpened,
            EventPayload::TableOpened {
                store_id: self.store_id.clone(),
                table_id: self.table_id.clone(),
                table_name: record.display_name.clone(),
                guest_count: self.guest_count,
                package: self.package.clone(),
                items,
            },
        );

        info!(
            session_id = %session_id,
            table_id = %self.table_id,
            guest_count = self.guest_count,
            "Table opened"
        );

        Ok(vec![event])
    }
}
