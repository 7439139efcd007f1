//! Command action implementations
//!
//! Each action implements the `CommandHandler` trait and handles
//! one specific command type.

use async_trait::async_trait;

use crate::sessions::traits::{CommandContext, CommandHandler, CommandMetadata, SessionError};
use shared::session::{OrderItemInput, OrderItemSnapshot, SessionCommand, SessionCommandPayload,
    SessionEvent, TicketStatus};
use shared::util::{now_millis, snowflake_id};

mod add_adjustment;
mod add_items;
mod change_request;
mod finalize_session;
pub mod open_table;
mod ticket_progress;
mod verify_session;

pub use add_adjustment::AddAdjustmentAction;
pub use add_items::AddItemsAction;
pub use change_request::{ApproveChangeAction, RejectChangeAction, SubmitChangeAction};
pub use finalize_session::FinalizeSessionAction;
pub use open_table::OpenTableAction;
pub use ticket_progress::{
    CancelTicketAction, ClaimTicketAction, MarkTicketReadyAction, MarkTicketServedAction,
};
pub use verify_session::VerifySessionAction;

/// Build the stored item line (with its fresh kitchen ticket) from an
/// incoming order item.
pub(crate) fn input_to_item(input: &OrderItemInput) -> OrderItemSnapshot {
    OrderItemSnapshot {
        ticket_id: format!("tkt-{}", snowflake_id()),
        menu_item_id: input.menu_item_id.clone(),
        name: input.name.clone(),
        unit_price: input.unit_price,
        quantity: input.quantity,
        tax_rate: input.tax_rate,
        is_free: input.is_free,
        kind: input.kind,
        is_package_line: false,
        station: input.station.clone(),
        note: input.note.clone(),
        status: TicketStatus::Pending,
        placed_at: Some(now_millis()),
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

/// CommandAction enum - dispatches to concrete action implementations
pub enum CommandAction {
    OpenTable(OpenTableAction),
    VerifySession(VerifySessionAction),
    AddItems(AddItemsAction),
    ClaimTicket(ClaimTicketAction),
    MarkTicketReady(MarkTicketReadyAction),
    MarkTicketServed(MarkTicketServedAction),
    CancelTicket(CancelTicketAction),
    SubmitChange(SubmitChangeAction),
    ApproveChange(ApproveChangeAction),
    RejectChange(RejectChangeAction),
    AddAdjustment(AddAdjustmentAction),
    FinalizeSession(FinalizeSessionAction),
}

/// Manual implementation of CommandHandler for CommandAction
#[async_trait]
impl CommandHandler for CommandAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        match self {
            CommandAction::OpenTable(action) => action.execute(ctx, metadata).await,
            CommandAction::VerifySession(action) => action.execute(ctx, metadata).await,
            CommandAction::AddItems(action) => action.execute(ctx, metadata).await,
            CommandAction::ClaimTicket(action) => action.execute(ctx, metadata).await,
            CommandAction::MarkTicketReady(action) => action.execute(ctx, metadata).await,
            CommandAction::MarkTicketServed(action) => action.execute(ctx, metadata).await,
            CommandAction::CancelTicket(action) => action.execute(ctx, metadata).await,
            CommandAction::SubmitChange(action) => action.execute(ctx, metadata).await,
            CommandAction::ApproveChange(action) => action.execute(ctx, metadata).await,
            CommandAction::RejectChange(action) => action.execute(ctx, metadata).await,
            CommandAction::AddAdjustment(action) => action.execute(ctx, metadata).await,
            CommandAction::FinalizeSession(action) => action.execute(ctx, metadata).await,
        }
    }
}

/// Convert SessionCommand to CommandAction
///
/// This is the ONLY place with a match on SessionCommandPayload.
impl From<&SessionCommand> for CommandAction {
    fn from(cmd: &SessionCommand) -> Self {
        match &cmd.payload {
            SessionCommandPayload::OpenTable { .. } => {
                // OpenTable is handled in SessionsManager to inject the store id
                unreachable!("OpenTable is built by SessionsManager, not From<&SessionCommand>")
            }
            SessionCommandPayload::VerifySession {
                session_id,
                server_count,
            } => CommandAction::VerifySession(VerifySessionAction {
                session_id: session_id.clone(),
                server_count: *server_count,
            }),
            SessionCommandPayload::AddItems { session_id, items } => {
                CommandAction::AddItems(AddItemsAction {
                    session_id: session_id.clone(),
                    items: items.clone(),
                })
            }
            SessionCommandPayload::ClaimTicket {
                session_id,
                ticket_id,
            } => CommandAction::ClaimTicket(ClaimTicketAction {
                session_id: session_id.clone(),
                ticket_id: ticket_id.clone(),
            }),
            SessionCommandPayload::MarkTicketReady {
                session_id,
                ticket_id,
            } => CommandAction::MarkTicketReady(MarkTicketReadyAction {
                session_id: session_id.clone(),
                ticket_id: ticket_id.clone(),
            }),
            SessionCommandPayload::MarkTicketServed {
                session_id,
                ticket_id,
            } => CommandAction::MarkTicketServed(MarkTicketServedAction {
                session_id: session_id.clone(),
                ticket_id: ticket_id.clone(),
            }),
            SessionCommandPayload::CancelTicket {
                session_id,
                ticket_id,
                reason,
            } => CommandAction::CancelTicket(CancelTicketAction {
                session_id: session_id.clone(),
                ticket_id: ticket_id.clone(),
                reason: reason.clone(),
            }),
            SessionCommandPayload::SubmitChange {
                session_id,
                value,
                reason_code,
                note,
            } => CommandAction::SubmitChange(SubmitChangeAction {
                session_id: session_id.clone(),
                value: value.clone(),
                reason_code: reason_code.clone(),
                note: note.clone(),
            }),
            SessionCommandPayload::ApproveChange { session_id, kind } => {
                CommandAction::ApproveChange(ApproveChangeAction {
                    session_id: session_id.clone(),
                    kind: *kind,
                })
            }
            SessionCommandPayload::RejectChange { session_id, kind } => {
                CommandAction::RejectChange(RejectChangeAction {
                    session_id: session_id.clone(),
                    kind: *kind,
                })
            }
            SessionCommandPayload::AddAdjustment {
                session_id,
                kind,
                amount,
                note,
            } => CommandAction::AddAdjustment(AddAdjustmentAction {
                session_id: session_id.clone(),
                kind: *kind,
                amount: *amount,
                note: note.clone(),
            }),
            SessionCommandPayload::FinalizeSession {
                session_id,
                payments,
            } => CommandAction::FinalizeSession(FinalizeSessionAction {
                session_id: session_id.clone(),
                payments: payments.clone(),
                // Accepted methods are injected by SessionsManager
                accepted_methods: vec![],
            }),
        }
    }
}
