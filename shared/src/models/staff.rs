//! Staff Model
//!
//! Identity arrives on every command as a pre-authenticated actor;
//! the engine only checks roles, it never authenticates.

use serde::{Deserialize, Serialize};

/// Staff role, ordered roughly by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Server,
    Cashier,
    Kitchen,
    Manager,
    Admin,
}

impl Role {
    /// Approve or reject pending change requests.
    pub fn can_resolve_changes(self) -> bool {
        matches!(self, Role::Cashier | Role::Manager | Role::Admin)
    }

    /// Run the billing finalizer.
    pub fn can_finalize(self) -> bool {
        matches!(self, Role::Cashier | Role::Manager | Role::Admin)
    }

    /// Claim kitchen tickets and mark them ready.
    pub fn can_work_tickets(self) -> bool {
        matches!(self, Role::Kitchen | Role::Manager | Role::Admin)
    }

    /// Record manual discounts / charges on a session.
    pub fn can_adjust(self) -> bool {
        matches!(self, Role::Cashier | Role::Manager | Role::Admin)
    }
}

/// The staff member a command acts as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gates() {
        assert!(Role::Cashier.can_finalize());
        assert!(Role::Manager.can_resolve_changes());
        assert!(!Role::Server.can_finalize());
        assert!(!Role::Server.can_resolve_changes());
        assert!(Role::Kitchen.can_work_tickets());
        assert!(!Role::Cashier.can_work_tickets());
        assert!(Role::Admin.can_work_tickets() && Role::Admin.can_adjust());
    }
}
