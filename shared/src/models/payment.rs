//! Payment Record Model

use serde::{Deserialize, Serialize};

/// What a payment bought
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum PaymentPurpose {
    #[default]
    Premium,
    Boost,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Boost => "boost",
        }
    }
}

/// Completed payment (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PaymentRecord {
    pub id: i64,
    pub email: String,
    /// Amount in the currency's minor unit
    pub amount: i64,
    pub currency: String,
    pub purpose: PaymentPurpose,
    /// Boosted issue, for boost payments
    pub issue_id: Option<String>,
    /// Provider transaction / session id
    pub transaction_id: Option<String>,
    pub paid_at: i64,
}

/// Record payment payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreate {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub amount: i64,
    pub currency: Option<String>,
    #[serde(default)]
    pub purpose: PaymentPurpose,
    pub issue_id: Option<String>,
    pub transaction_id: Option<String>,
}

/// `POST /create-checkout-session` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub purpose: PaymentPurpose,
    pub issue_id: Option<String>,
}

/// Hosted checkout page returned by the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// `GET /payments` filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentListQuery {
    pub email: Option<String>,
}
