//! Caller authentication
//!
//! Callers send `Authorization: Bearer <id token>`. The token is verified by
//! the identity provider and resolved to the local user record, which
//! handlers receive as [`CurrentUser`].

mod extractor;

pub use extractor::CurrentUser;
