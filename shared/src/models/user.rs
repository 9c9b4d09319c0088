//! User Model

use serde::{Deserialize, Serialize};

/// Account role
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum Role {
    #[default]
    Citizen,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }
}

/// User account, keyed by email
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct User {
    pub email: String,
    /// Identity provider account id; server-side only
    #[serde(skip_serializing, default)]
    pub uid: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub role: Role,
    pub is_premium: bool,
    pub is_blocked: bool,
    pub created_at: i64,
}

/// Register-or-fetch payload
///
/// Carries no identity account id: the link is resolved from the email.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegister {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub phone: Option<String>,
    pub photo: Option<String>,
}

/// Staff provisioning payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub photo: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// `GET /users` filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
}
