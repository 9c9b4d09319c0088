//! Bearer token extractor

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::error::AppError;
use shared::models::User;
use shared::util::normalize_email;

use crate::db::users;
use crate::policy;
use crate::security_log;
use crate::state::AppState;

/// Authenticated caller (local user record)
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn email(&self) -> &str {
        &self.0.email
    }

    /// Staff or admin
    pub fn require_moderator(&self) -> Result<(), AppError> {
        policy::can_moderate(&self.0).map_err(|denial| {
            security_log!(WARN, "moderation_denied", email = %self.0.email, role = self.0.role.as_str());
            denial.into()
        })
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        policy::require_admin(&self.0).map_err(|denial| {
            security_log!(WARN, "admin_denied", email = %self.0.email, role = self.0.role.as_str());
            denial.into()
        })
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match header {
            Some(header) => bearer_token(header)
                .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
            None => {
                security_log!(WARN, "auth_missing", uri = ?parts.uri);
                return Err(AppError::not_authenticated());
            }
        };

        let email = state
            .identity
            .verify_token(token)
            .await
            .map(|email| normalize_email(&email))
            .map_err(|e| {
                security_log!(WARN, "auth_failed", error = %e, uri = ?parts.uri);
                AppError::from(e)
            })?;

        let user = users::find_by_email(&state.pool, &email)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "User lookup failed during authentication");
                AppError::database("User lookup failed")
            })?
            .ok_or_else(|| {
                security_log!(WARN, "auth_unknown_user", email = %email);
                AppError::not_authenticated()
            })?;

        tracing::debug!(email = %user.email, role = user.role.as_str(), "User authenticated");

        let user = CurrentUser(user);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
