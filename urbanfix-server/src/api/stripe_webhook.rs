//! Stripe webhook handler
//!
//! POST /stripe/webhook: raw body for signature verification

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use shared::models::PaymentPurpose;

use crate::error::ServiceError;
use crate::integrations::payment::verify_webhook_signature;
use crate::services::CompletedCheckout;
use crate::state::AppState;

/// Handle incoming Stripe webhook events
///
/// Must receive raw body (not JSON) for HMAC signature verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let sig_header = match headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Err(e) = verify_webhook_signature(&body, sig_header, &state.stripe_webhook_secret) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    let event: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    let event_type = event["type"].as_str().unwrap_or("");
    tracing::info!(event_type = event_type, "Received Stripe webhook");

    match event_type {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        _ => {
            tracing::debug!(event_type = event_type, "Unhandled webhook event type");
            StatusCode::OK
        }
    }
}

/// checkout.session.completed → record payment, then upgrade or boost
async fn handle_checkout_completed(state: &AppState, event: &Value) -> StatusCode {
    let obj = match event.get("data").and_then(|d| d.get("object")) {
        Some(o) => o,
        None => return StatusCode::OK,
    };

    if obj["payment_status"].as_str().is_some_and(|s| s != "paid") {
        tracing::info!(session_id = ?obj["id"].as_str(), "Checkout session not paid yet");
        return StatusCode::OK;
    }

    let Some(checkout) = parse_completed_checkout(obj) else {
        tracing::warn!("checkout.session.completed missing id, email or purpose");
        return StatusCode::OK;
    };

    match state.payments.complete_checkout(checkout).await {
        Ok(_) => StatusCode::OK,
        // Business failures (unknown user, deleted issue) will not succeed on retry
        Err(ServiceError::App(e)) => {
            tracing::warn!(code = %e.code, message = %e.message, "Checkout completion rejected");
            StatusCode::OK
        }
        Err(ServiceError::Db(e)) => {
            tracing::error!(error = %e, "Checkout completion failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Extract the paid session from a `checkout.session` object
fn parse_completed_checkout(obj: &Value) -> Option<CompletedCheckout> {
    let session_id = obj["id"].as_str()?;
    let metadata = obj.get("metadata");
    let meta = |key: &str| {
        metadata
            .and_then(|m| m[key].as_str())
            .filter(|s| !s.is_empty())
    };

    let email = meta("email")
        .or_else(|| obj["customer_details"]["email"].as_str())
        .or_else(|| obj["customer_email"].as_str())?;

    let purpose = match meta("purpose").unwrap_or("premium") {
        "premium" => PaymentPurpose::Premium,
        "boost" => PaymentPurpose::Boost,
        other => {
            tracing::warn!(purpose = other, "Unknown checkout purpose");
            return None;
        }
    };

    Some(CompletedCheckout {
        session_id: session_id.to_string(),
        email: email.to_string(),
        amount: obj["amount_total"].as_i64().unwrap_or(0),
        currency: obj["currency"].as_str().unwrap_or("usd").to_string(),
        purpose,
        issue_id: meta("issue_id").map(str::to_string),
    })
}
