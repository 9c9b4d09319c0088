//! Data models
//!
//! Shared between the server and its web/mobile clients (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! Wire format is camelCase to match the JavaScript clients.

pub mod issue;
pub mod payment;
pub mod user;

// Re-exports
pub use issue::*;
pub use payment::*;
pub use user::*;
