//! External collaborators
//!
//! Each capability is an async trait held as `Arc<dyn …>` in [`crate::AppState`],
//! with a real HTTP/filesystem implementation and, for identity, an in-process
//! implementation used in development and tests.

pub mod blob;
pub mod identity;
pub mod payment;

pub use blob::{BlobError, BlobStore, LocalBlobStore, MAX_FILE_SIZE};
pub use identity::{
    AccountUpdate, FirebaseIdentity, IdentityAccount, IdentityError, IdentityProvider,
    InMemoryIdentity, NewAccount,
};
pub use payment::{CheckoutItem, PaymentError, PaymentProvider, StripeCheckout};
