//! Stripe integration via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::error::{AppError, ErrorCode};
use shared::models::{CheckoutSession, PaymentPurpose};
use thiserror::Error;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

/// Webhook events older than this are rejected (seconds)
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// One-off purchase to start a hosted checkout for
pub struct CheckoutItem<'a> {
    pub email: &'a str,
    /// Product name shown on the checkout page
    pub name: &'a str,
    /// Minor units
    pub amount: i64,
    pub currency: &'a str,
    pub purpose: PaymentPurpose,
    pub issue_id: Option<&'a str>,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider request failed: {0}")]
    Upstream(String),
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        tracing::warn!(error = %e, "Payment provider call failed");
        AppError::new(ErrorCode::PaymentProviderError)
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, item: &CheckoutItem<'_>) -> Result<CheckoutSession, PaymentError>;
}

pub struct StripeCheckout {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeCheckout {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeCheckout {
    /// Create a Stripe Checkout Session (payment mode, inline price)
    ///
    /// The payer email, purpose and issue id travel in the session metadata
    /// so the webhook can apply the purchase.
    async fn create_checkout_session(&self, item: &CheckoutItem<'_>) -> Result<CheckoutSession, PaymentError> {
        let amount = item.amount.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("customer_email", item.email),
            ("line_items[0][price_data][currency]", item.currency),
            ("line_items[0][price_data][unit_amount]", &amount),
            ("line_items[0][price_data][product_data][name]", item.name),
            ("line_items[0][quantity]", "1"),
            ("success_url", item.success_url),
            ("cancel_url", item.cancel_url),
            ("metadata[email]", item.email),
            ("metadata[purpose]", item.purpose.as_str()),
        ];
        if let Some(issue_id) = item.issue_id {
            form.push(("metadata[issue_id]", issue_id));
        }

        let resp: serde_json::Value = self
            .client
            .post(format!("{STRIPE_API_URL}/checkout/sessions"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;

        match (resp["id"].as_str(), resp["url"].as_str()) {
            (Some(id), Some(url)) => Ok(CheckoutSession {
                id: id.to_string(),
                url: url.to_string(),
            }),
            _ => Err(PaymentError::Upstream(format!(
                "Stripe create_checkout failed: {resp}"
            ))),
        }
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let payload = std::str::from_utf8(payload).map_err(|_| "Payload is not UTF-8")?;
    let signed_payload = format!("{timestamp}.{payload}");
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    // Constant-time comparison via verify_slice
    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// Build a `Stripe-Signature` header value for `payload` (local tooling, tests)
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => return String::new(),
    };
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}
