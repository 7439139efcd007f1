//! Floor Server - dine-in session & order lifecycle engine
//!
//! # Architecture
//!
//! Event-sourced core over an embedded redb store. Every state change
//! goes through the same pipeline: a command is validated against the
//! current snapshot, emits immutable events inside one write
//! transaction, the events are folded into the snapshot by pure
//! appliers, and only after commit are they broadcast to subscribers.
//!
//! # Module structure
//!
//! ```text
//! floor-server/src/
//! ├── config.rs      # StoreConfig (env-driven)
//! ├── logger.rs      # tracing-subscriber setup
//! └── sessions/      # session event sourcing
//!     ├── storage.rs # redb tables
//!     ├── traits.rs  # CommandContext / CommandHandler / EventApplier
//!     ├── money.rs   # decimal settlement math
//!     ├── actions/   # one handler per command
//!     ├── appliers/  # one pure applier per event
//!     ├── manager.rs # command pipeline + queries + broadcast
//!     └── activity.rs# best-effort activity log
//! ```

pub mod config;
pub mod logger;
pub mod sessions;

// Re-export public types
pub use config::StoreConfig;
pub use sessions::{SessionStorage, SessionsManager};
