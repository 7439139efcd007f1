//! TableOpened event applier
//!
//! Seeds a fresh snapshot from the opening event. The session starts in
//! PendingVerification; the floor server confirms the headcount later.

use crate::sessions::traits::EventApplier;
use shared::session::{EventPayload, SessionEvent, SessionSnapshot, SessionStatus};

/// TableOpened applier
pub struct TableOpenedApplier;

impl EventApplier for TableOpenedApplier {
    fn apply(&self, snapshot: &mut SessionSnapshot, event: &SessionEvent) {
        if let EventPayload::TableOpened {
            store_id,
            table_id,
            table_name,
            guest_count,
            package,
            items,
        } = &event.payload
        {
            snapshot.store_id = store_id.clone();
            snapshot.table_id = Some(table_id.clone());
            snapshot.table_name = Some(table_name.clone());
            snapshot.status = SessionStatus::PendingVerification;
            snapshot.guest_initial = *guest_count;
            snapshot.guest_final = *guest_count;
            snapshot.package = package.clone();
            snapshot.items = items.clone();
            snapshot.start_time = event.timestamp;
            snapshot.created_at = event.timestamp;

            super::stamp(snapshot, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::session::{
        OrderItemSnapshot, PackageSnapshot, SessionEventType, TicketKind, TicketStatus,
    };

    fn package_line(session_id: &str, quantity: i32) -> OrderItemSnapshot {
        OrderItemSnapshot {
            ticket_id: format!("pkg-{}", session_id),
            menu_item_id: "pkg-dinner".to_string(),
            name: "Dinner Buffet".to_string(),
            unit_price: 49.9,
            quantity,
            tax_rate: 12.0,
            is_free: false,
            kind: TicketKind::Standard,
            is_package_line: true,
            station: None,
            note: None,
            status: TicketStatus::Pending,
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

    fn opened_event(guest_count: i32, items: Vec<OrderItemSnapshot>) -> SessionEvent {
        SessionEvent::new(
            1,
            "session-1".to_string(),
            "cashier-1".to_string(),
            "Cashier".to_string(),
            "cmd-1".to_string(),
            Some(1234567890),
            SessionEventType::TableOpened,
            EventPayload::TableOpened {
                store_id: "store-1".to_string(),
                table_id: "T1".to_string(),
                table_name: "Table 1".to_string(),
                guest_count,
                package: Some(PackageSnapshot {
                    package_id: "pkg-dinner".to_string(),
                    name: "Dinner Buffet".to_string(),
                    unit_price: 49.9,
                    tax_rate: 12.0,
                }),
                items,
            },
        )
    }

    #[test]
    fn test_seeds_snapshot_pending_verification() {
        let mut snapshot = SessionSnapshot::new("session-1".to_string());
        let event = opened_event(4, vec![package_line("session-1", 4)]);

        TableOpenedApplier.apply(&mut snapshot, &event);

        assert_eq!(snapshot.status, SessionStatus::PendingVerification);
        assert_eq!(snapshot.store_id, "store-1");
        assert_eq!(snapshot.table_id.as_deref(), Some("T1"));
        assert_eq!(snapshot.guest_initial, 4);
        assert_eq!(snapshot.guest_final, 4);
        assert_eq!(snapshot.last_sequence, 1);
        assert!(snapshot.verify_checksum());
    }

    #[test]
    fn test_package_line_billable_before_any_service() {
        let mut snapshot = SessionSnapshot::new("session-1".to_string());
        let event = opened_event(2, vec![package_line("session-1", 2)]);

        TableOpenedApplier.apply(&mut snapshot, &event);

        // 2 guests at 49.90 gross, billable while still Pending
        assert_eq!(snapshot.subtotal_gross, 99.8);
    }
}
