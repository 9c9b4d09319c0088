//! Identity provider
//!
//! Firebase Authentication via the Identity Toolkit REST API (no SDK
//! dependency). Admin operations authenticate with a service-account OAuth
//! access token; id token verification uses the project's web API key.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use thiserror::Error;
use tokio::sync::RwLock;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Account as known to the identity provider
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityAccount {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
    pub photo_url: Option<&'a str>,
}

/// Attribute/password change (None = unchanged)
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub password: Option<String>,
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.photo_url.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Email is already registered with the identity provider")]
    EmailExists,
    #[error("Identity account not found")]
    NotFound,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Identity provider request failed: {0}")]
    Upstream(String),
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::EmailExists => AppError::with_message(ErrorCode::AlreadyExists, e.to_string()),
            IdentityError::NotFound => AppError::with_message(ErrorCode::UserNotFound, e.to_string()),
            IdentityError::InvalidToken => AppError::invalid_token(e.to_string()),
            IdentityError::Upstream(detail) => {
                tracing::warn!(detail = %detail, "Identity provider call failed");
                AppError::new(ErrorCode::IdentityProviderError)
            }
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, account: &NewAccount<'_>) -> Result<IdentityAccount, IdentityError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, IdentityError>;

    async fn update_account(&self, uid: &str, update: &AccountUpdate) -> Result<(), IdentityError>;

    async fn delete_account(&self, uid: &str) -> Result<(), IdentityError>;

    /// Verify an id token and return the email it was issued to
    async fn verify_token(&self, token: &str) -> Result<String, IdentityError>;
}

// =============================================================================
// Firebase
// =============================================================================

pub struct FirebaseIdentity {
    client: reqwest::Client,
    project_id: String,
    api_key: String,
    access_token: String,
}

impl FirebaseIdentity {
    pub fn new(project_id: &str, api_key: &str, access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            project_id: project_id.to_string(),
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn admin_url(&self, method: &str) -> String {
        format!("{IDENTITY_TOOLKIT_URL}/projects/{}/{method}", self.project_id)
    }

    /// POST an admin request (service-account bearer token)
    async fn admin_call(&self, method: &str, body: Value) -> Result<Value, IdentityError> {
        let resp = self
            .client
            .post(self.admin_url(method))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;
        Self::parse(resp).await
    }

    async fn parse(resp: reqwest::Response) -> Result<Value, IdentityError> {
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }

        // Error messages look like "EMAIL_EXISTS" or "WEAK_PASSWORD : Password should be …"
        let message = body["error"]["message"].as_str().unwrap_or("");
        let reason = message.split(' ').next().unwrap_or("");
        Err(match reason {
            "EMAIL_EXISTS" | "DUPLICATE_EMAIL" => IdentityError::EmailExists,
            "USER_NOT_FOUND" | "EMAIL_NOT_FOUND" => IdentityError::NotFound,
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_DISABLED" => IdentityError::InvalidToken,
            _ => IdentityError::Upstream(format!("{status}: {body}")),
        })
    }

    fn account_from(user: &Value) -> Option<IdentityAccount> {
        Some(IdentityAccount {
            uid: user["localId"].as_str()?.to_string(),
            email: user["email"].as_str().unwrap_or_default().to_string(),
            display_name: user["displayName"].as_str().map(String::from),
            photo_url: user["photoUrl"].as_str().map(String::from),
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn create_account(&self, account: &NewAccount<'_>) -> Result<IdentityAccount, IdentityError> {
        let mut body = json!({
            "email": account.email,
            "password": account.password,
            "displayName": account.display_name,
        });
        if let Some(photo) = account.photo_url {
            body["photoUrl"] = json!(photo);
        }

        let resp = self.admin_call("accounts", body).await?;
        let uid = resp["localId"]
            .as_str()
            .ok_or_else(|| IdentityError::Upstream(format!("create account returned no localId: {resp}")))?;

        Ok(IdentityAccount {
            uid: uid.to_string(),
            email: account.email.to_string(),
            display_name: Some(account.display_name.to_string()),
            photo_url: account.photo_url.map(String::from),
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, IdentityError> {
        let resp = match self.admin_call("accounts:lookup", json!({ "email": [email] })).await {
            Ok(resp) => resp,
            Err(IdentityError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(resp["users"]
            .as_array()
            .and_then(|users| users.first())
            .and_then(Self::account_from))
    }

    async fn update_account(&self, uid: &str, update: &AccountUpdate) -> Result<(), IdentityError> {
        let mut body = json!({ "localId": uid });
        if let Some(name) = &update.display_name {
            body["displayName"] = json!(name);
        }
        if let Some(photo) = &update.photo_url {
            body["photoUrl"] = json!(photo);
        }
        if let Some(password) = &update.password {
            body["password"] = json!(password);
        }
        self.admin_call("accounts:update", body).await?;
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> Result<(), IdentityError> {
        self.admin_call("accounts:delete", json!({ "localId": uid })).await?;
        Ok(())
    }

    async fn verify_token(&self, token: &str) -> Result<String, IdentityError> {
        let resp = self
            .client
            .post(format!("{IDENTITY_TOOLKIT_URL}/accounts:lookup"))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "idToken": token }))
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let status = resp.status();
        let body = Self::parse(resp)
            .await
            .map_err(|e| token_lookup_error(status, e))?;

        body["users"][0]["email"]
            .as_str()
            .map(String::from)
            .ok_or(IdentityError::InvalidToken)
    }
}

/// Malformed tokens come back as plain 4xx; a 5xx stays an upstream failure
fn token_lookup_error(status: reqwest::StatusCode, err: IdentityError) -> IdentityError {
    match err {
        IdentityError::Upstream(_) if status.is_client_error() => IdentityError::InvalidToken,
        other => other,
    }
}

// =============================================================================
// In-memory (development / tests)
// =============================================================================

/// Process-local identity provider
///
/// Tokens are `dev:<email>`; any such token is accepted.
#[derive(Default)]
pub struct InMemoryIdentity {
    accounts: RwLock<HashMap<String, (IdentityAccount, String)>>,
}

impl InMemoryIdentity {
    pub const TOKEN_PREFIX: &'static str = "dev:";

    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer token accepted for `email`
    pub fn token_for(email: &str) -> String {
        format!("{}{email}", Self::TOKEN_PREFIX)
    }

    /// Current password of an account (the provider's view)
    pub async fn password_of(&self, email: &str) -> Option<String> {
        self.accounts
            .read()
            .await
            .get(email)
            .map(|(_, password)| password.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn create_account(&self, account: &NewAccount<'_>) -> Result<IdentityAccount, IdentityError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(account.email) {
            return Err(IdentityError::EmailExists);
        }
        let created = IdentityAccount {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            email: account.email.to_string(),
            display_name: Some(account.display_name.to_string()),
            photo_url: account.photo_url.map(String::from),
        };
        accounts.insert(
            account.email.to_string(),
            (created.clone(), account.password.to_string()),
        );
        Ok(created)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, IdentityError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(email)
            .map(|(account, _)| account.clone()))
    }

    async fn update_account(&self, uid: &str, update: &AccountUpdate) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.write().await;
        let (account, password) = accounts
            .values_mut()
            .find(|(account, _)| account.uid == uid)
            .ok_or(IdentityError::NotFound)?;
        if let Some(name) = &update.display_name {
            account.display_name = Some(name.clone());
        }
        if let Some(photo) = &update.photo_url {
            account.photo_url = Some(photo.clone());
        }
        if let Some(new_password) = &update.password {
            *password = new_password.clone();
        }
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|_, (account, _)| account.uid != uid);
        if accounts.len() == before {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn verify_token(&self, token: &str) -> Result<String, IdentityError> {
        token
            .strip_prefix(Self::TOKEN_PREFIX)
            .map(shared::util::normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or(IdentityError::InvalidToken)
    }
}
