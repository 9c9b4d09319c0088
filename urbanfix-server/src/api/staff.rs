//! Staff directory and provisioning

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use shared::error::AppError;
use shared::models::{StaffCreate, User};

use crate::auth::CurrentUser;
use crate::security_log;
use crate::state::AppState;

use super::ApiResult;

/// GET /staff
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(Json(state.accounts.list_staff().await?))
}

/// POST /staff
///
/// Creates the identity account and the local staff record.
pub async fn create(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(input): Json<StaffCreate>,
) -> Result<(StatusCode, Json<User>), AppError> {
    caller.require_admin()?;
    let staff = state.accounts.provision_staff(input).await?;
    security_log!(INFO, "staff_provisioned", email = %staff.email, by = %caller.email());
    Ok((StatusCode::CREATED, Json(staff)))
}
