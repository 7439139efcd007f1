//! FinalizeSession command handler
//!
//! One atomic settlement pass: recompute the billable totals, check the
//! tender covers them, allocate the receipt number, write the immutable
//! receipt, release the table and close the session. Everything rides
//! the surrounding write transaction; any failure rolls the whole pass
//! back, including the receipt counter.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::sessions::money::{
    self, is_payment_sufficient, round_money, sum_payment_lines, to_decimal, to_f64,
};
use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{
    EventPayload, PaymentLineInput, PaymentRecord, Receipt, SessionEvent, SessionEventType,
    SessionStatus,
};
use shared::util::now_millis;

/// FinalizeSession action
#[derive(Debug, Clone)]
pub struct FinalizeSessionAction {
    pub session_id: String,
    pub payments: Vec<PaymentLineInput>,
    /// Payment methods the store accepts (injected by SessionsManager)
    pub accepted_methods: Vec<String>,
}

#[async_trait]
impl CommandHandler for FinalizeSessionAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        // 1. Load and gate on status. A second finalize sees Closed here
        //    and fails without touching the counter.
        let snapshot = ctx.load_snapshot(&self.session_id)?;
        match snapshot.status {
            SessionStatus::Active => {}
            SessionStatus::Closed => {
                return Err(SessionError::AlreadyFinalized(self.session_id.clone()));
            }
            SessionStatus::PendingVerification => {
                return Err(SessionError::Conflict(format!(
                    "Session not verified: {}",
                    self.session_id
                )));
            }
        }

        if !metadata.actor_role.can_finalize() {
            return Err(SessionError::PermissionDenied(format!(
                "Role {:?} cannot finalize sessions",
                metadata.actor_role
            )));
        }

        // 2. The kitchen must owe nothing: every ticket served or
        //    cancelled before the bill can close.
        let in_flight = snapshot.in_flight_items().count();
        if in_flight > 0 {
            return Err(SessionError::Conflict(format!(
                "{} ticket(s) still in flight on session {}",
                in_flight, self.session_id
            )));
        }

        // 3. Validate tender legs.
        if self.payments.is_empty() {
            return Err(SessionError::InvalidOperation(
                "at least one payment line required".to_string(),
            ));
        }
        for line in &self.payments {
            money::validate_payment_line(line)?;
            if !self.accepted_methods.is_empty()
                && !self.accepted_methods.iter().any(|m| m == &line.method)
            {
                return Err(SessionError::InvalidOperation(format!(
                    "Payment method not accepted: {}",
                    line.method
                )));
            }
        }

        // 4. Settle on a working copy; the applier repeats this fold
        //    deterministically from the event.
        let mut working = snapshot.clone();
        money::recalculate_totals(&mut working);

        // 5. Tender sufficiency, within the money tolerance. Checked
        //    before any write so a short payment leaves no trace.
        let paid = sum_payment_lines(&self.payments);
        let required = to_decimal(working.grand_total_gross);
        if !is_payment_sufficient(paid, required) {
            return Err(SessionError::InsufficientPayment {
                paid: to_f64(paid),
                required: working.grand_total_gross,
            });
        }

        // 6. Allocate the receipt number and advance the counter inside
        //    this transaction.
        let receipt_number = ctx.allocate_receipt_number(&working.store_id)?;

        // 7. One payment record per tender leg.
        let now = now_millis();
        let payments: Vec<PaymentRecord> = self
            .payments
            .iter()
            .map(|line| PaymentRecord {
                payment_id: Uuid::new_v4().to_string(),
                method: line.method.clone(),
                amount: line.amount,
                note: line.note.clone(),
                timestamp: now,
            })
            .collect();

        let payment_summary = money::summarize_payments(&payments);
        let change = to_f64(round_money((paid - required).max(rust_decimal::Decimal::ZERO)));

        // 8. Immutable receipt document.
        let receipt = Receipt {
            receipt_number: receipt_number.clone(),
            session_id: self.session_id.clone(),
            store_id: working.store_id.clone(),
            table_name: working.table_name.clone(),
            guest_count: working.guest_final,
            subtotal_gross: working.subtotal_gross,
            subtotal_net: working.subtotal_net,
            subtotal_tax: working.subtotal_tax,
            discount_total: working.discount_total,
            charge_total: working.charge_total,
            grand_total_gross: working.grand_total_gross,
            grand_total_net: working.grand_total_net,
            grand_total_tax: working.grand_total_tax,
            total_paid: to_f64(paid),
            change,
            payments: payment_summary,
            created_by: metadata.actor_id.clone(),
            created_by_name: metadata.actor_name.clone(),
            created_at: now,
        };
        ctx.store_receipt(&receipt)?;

        // 9. Free the table in the same transaction; the release only
        //    becomes visible if the whole settlement commits.
        if let Some(table_id) = &working.table_id {
            ctx.release_table(table_id)?;
        }

        let seq = ctx.next_sequence();
        let event = SessionEvent::new(
            seq,
            self.session_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            SessionEventType::SessionFinalized,
            EventPayload::SessionFinalized { receipt, payments },
        );

        info!(
            session_id = %self.session_id,
            receipt_number = %receipt_number,
            total = working.grand_total_gross,
            paid = to_f64(paid),
            "Session finalized"
        );

        Ok(vec![event])
    }
}
