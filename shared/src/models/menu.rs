//! Menu catalog lookup
//!
//! The engine never owns the menu; items arrive on commands already
//! denormalized (name, price, tax rate frozen at order time). This meta
//! type is the shape a catalog lookup hands the caller.

use serde::{Deserialize, Serialize};

/// Denormalized menu item metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemMeta {
    pub id: String,
    pub name: String,
    /// Gross (tax-inclusive) unit price.
    pub unit_price: f64,
    /// Tax rate in percent (e.g. 12.0 for 12%).
    pub tax_rate: f64,
    /// Kitchen station routing hint.
    pub station: Option<String>,
}
