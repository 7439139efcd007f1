//! Shared types for the floor engine
//!
//! Domain models and the session command / event / snapshot vocabulary
//! used by the engine and any front end talking to it.

pub mod models;
pub mod session;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
