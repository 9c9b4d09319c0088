//! Services
//!
//! Stateless rule sets over the stores. Each service owns clones of the
//! handles it needs (pool, capability traits); nothing is global.

pub mod accounts;
pub mod issues;
pub mod payments;

pub use accounts::{AccountService, PhotoUpload, ProfileUpdate};
pub use issues::{IssueListing, IssueService};
pub use payments::{CheckoutSettings, CompletedCheckout, PaymentService};
