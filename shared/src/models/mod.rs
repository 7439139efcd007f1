//! Data models
//!
//! Narrow read models the session engine consumes: the table registry,
//! the acting staff member on each command, the menu catalog lookup, and
//! per-store receipt settings. Full CRUD on these lives elsewhere.

pub mod dining_table;
pub mod menu;
pub mod staff;
pub mod store_settings;

pub use dining_table::{TableRecord, TableStatus};
pub use menu::MenuItemMeta;
pub use staff::{Actor, Role};
pub use store_settings::ReceiptSettings;
