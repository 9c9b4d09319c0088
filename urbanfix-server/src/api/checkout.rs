//! Hosted checkout

use axum::Json;
use axum::extract::State;
use shared::models::{CheckoutRequest, CheckoutSession};

use crate::state::AppState;

use super::ApiResult;

/// POST /create-checkout-session
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<CheckoutSession> {
    Ok(Json(state.payments.start_checkout(request).await?))
}
