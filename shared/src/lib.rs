//! Shared types for UrbanFix
//!
//! Domain models, the unified error system and response envelopes used by
//! the server and its clients.

pub mod error;
pub mod models;
pub mod query;
pub mod util;

pub use error::{AppError, ErrorCategory, ErrorCode};
pub use query::PaginatedResponse;
