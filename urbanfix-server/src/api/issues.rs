//! Issue endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use shared::error::AppError;
use shared::models::{AssignRequest, Issue, IssueCreate, IssueListQuery, IssuePatch, UpvoteRequest};

use crate::auth::CurrentUser;
use crate::policy;
use crate::services::IssueListing;
use crate::state::AppState;

use super::ApiResult;

/// GET /issues
///
/// Returns a plain array, or a page envelope when `page` or `limit` is present.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<IssueListQuery>,
) -> ApiResult<IssueListing> {
    Ok(Json(state.issues.list(query).await?))
}

/// POST /issues
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<IssueCreate>,
) -> Result<(StatusCode, Json<Issue>), AppError> {
    let issue = state.issues.create(input).await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

/// GET /issues/{id}
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Issue> {
    Ok(Json(state.issues.get(&id).await?))
}

/// PATCH /issues/{id}
pub async fn update(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<IssuePatch>,
) -> ApiResult<Issue> {
    let issue = state.issues.get(&id).await?;
    policy::can_edit_issue(&caller.0, &issue)?;
    Ok(Json(state.issues.update(&id, patch).await?))
}

/// DELETE /issues/{id}
pub async fn delete(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    caller.require_moderator()?;
    state.issues.delete(&id).await?;
    tracing::info!(issue_id = %id, by = %caller.email(), "Issue deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /issues/assign/{id}
pub async fn assign(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Issue> {
    caller.require_moderator()?;
    let issue = state
        .issues
        .assign(&id, &req.staff_email, Some(caller.email()))
        .await?;
    Ok(Json(issue))
}

/// PATCH /issues/reject/{id}
pub async fn reject(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Issue> {
    caller.require_moderator()?;
    Ok(Json(state.issues.reject(&id, Some(caller.email())).await?))
}

/// PATCH /issues/boost/{id}
pub async fn boost(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Issue> {
    caller.require_moderator()?;
    Ok(Json(state.issues.boost(&id, Some(caller.email())).await?))
}

/// PATCH /issues/upvote/{id}
pub async fn upvote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpvoteRequest>,
) -> ApiResult<Issue> {
    Ok(Json(state.issues.upvote(&id, req.email.as_deref()).await?))
}
