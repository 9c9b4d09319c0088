//! urbanfix-server: municipal issue-reporting backend
//!
//! - Citizens report issues and upvote each other's reports
//! - Staff triage (assign, reject, boost) and resolve them
//! - Admins manage accounts, staff and premium subscriptions
//!
//! Authentication is delegated to an external identity provider and
//! payments to Stripe; both sit behind capability traits in [`integrations`].

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod integrations;
pub mod policy;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use state::AppState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Security audit log (target = "security")
#[macro_export]
macro_rules! security_log {
    (WARN, $event:expr, $($arg:tt)*) => {
        tracing::warn!(target: "security", event = $event, $($arg)*)
    };
    (INFO, $event:expr, $($arg:tt)*) => {
        tracing::info!(target: "security", event = $event, $($arg)*)
    };
}
