//! Payment ledger endpoints

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use shared::error::AppError;
use shared::models::{PaymentCreate, PaymentListQuery, PaymentRecord};
use shared::util::normalize_email;

use crate::auth::CurrentUser;
use crate::policy;
use crate::state::AppState;

use super::ApiResult;

/// GET /payments (admin)
pub async fn list(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<PaymentListQuery>,
) -> ApiResult<Vec<PaymentRecord>> {
    caller.require_admin()?;
    Ok(Json(state.payments.list(query.email.as_deref()).await?))
}

/// POST /payments
///
/// Records a payment for the caller (admins may record for anyone).
/// Recording does not change premium status.
pub async fn record(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(input): Json<PaymentCreate>,
) -> Result<(StatusCode, Json<PaymentRecord>), AppError> {
    policy::can_act_for(&caller.0, &normalize_email(&input.email))?;
    let record = state.payments.record(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
