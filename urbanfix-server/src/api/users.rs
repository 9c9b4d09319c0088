//! User endpoints: registration, lookup, moderation flags, profile edits

use axum::Json;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::extract::{Path, Query, State};
use shared::error::{AppError, ErrorCode};
use shared::models::{User, UserListQuery, UserRegister};

use crate::auth::CurrentUser;
use crate::security_log;
use crate::services::{PhotoUpload, ProfileUpdate};
use crate::state::AppState;

use super::ApiResult;

/// GET /users
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Vec<User>> {
    Ok(Json(state.accounts.list(query.role).await?))
}

/// GET /users/{email}
pub async fn get(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult<User> {
    Ok(Json(state.accounts.get(&email).await?))
}

/// POST /users
///
/// Idempotent: an already registered email returns the stored record.
pub async fn register(
    State(state): State<AppState>,
    Json(profile): Json<UserRegister>,
) -> ApiResult<User> {
    Ok(Json(state.accounts.register_or_fetch(profile).await?))
}

/// PATCH /users/subscribe/{email}
pub async fn subscribe(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(email): Path<String>,
) -> ApiResult<User> {
    caller.require_admin()?;
    Ok(Json(state.accounts.set_premium(&email).await?))
}

/// PATCH /users/block/{email}
pub async fn block(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(email): Path<String>,
) -> ApiResult<User> {
    caller.require_admin()?;
    let user = state.accounts.block(&email).await?;
    security_log!(INFO, "user_blocked", email = %user.email, by = %caller.email());
    Ok(Json(user))
}

/// PATCH /users/unblock/{email}
pub async fn unblock(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(email): Path<String>,
) -> ApiResult<User> {
    caller.require_admin()?;
    let user = state.accounts.unblock(&email).await?;
    security_log!(INFO, "user_unblocked", email = %user.email, by = %caller.email());
    Ok(Json(user))
}

/// PATCH /users/update (multipart: name, password, photo)
pub async fn update_own(
    State(state): State<AppState>,
    caller: CurrentUser,
    multipart: Multipart,
) -> ApiResult<User> {
    let form = read_profile_form(multipart).await?;
    if let Some(email) = form.email.as_deref()
        && shared::util::normalize_email(email) != caller.email()
    {
        return Err(AppError::permission_denied(
            "Use /users/updateadmin to edit another account",
        ));
    }
    Ok(Json(
        state
            .accounts
            .update_profile(caller.email(), form.update)
            .await?,
    ))
}

/// PATCH /users/updateadmin (multipart: email, name, password, photo)
pub async fn update_any(
    State(state): State<AppState>,
    caller: CurrentUser,
    multipart: Multipart,
) -> ApiResult<User> {
    caller.require_admin()?;
    let form = read_profile_form(multipart).await?;
    let email = form
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::InvalidEmail).with_detail("field", "email"))?;

    let user = state.accounts.update_profile(&email, form.update).await?;
    security_log!(INFO, "profile_updated_by_admin", email = %user.email, by = %caller.email());
    Ok(Json(user))
}

struct ProfileForm {
    email: Option<String>,
    update: ProfileUpdate,
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::with_message(ErrorCode::InvalidRequest, format!("Invalid multipart body: {e}"))
}

async fn field_text(field: Field<'_>) -> Result<Option<String>, AppError> {
    let text = field.text().await.map_err(multipart_error)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Collect the profile form; empty text fields and an empty file part count as absent
async fn read_profile_form(mut multipart: Multipart) -> Result<ProfileForm, AppError> {
    let mut email = None;
    let mut update = ProfileUpdate::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "email" => email = field_text(field).await?,
            "name" => update.name = field_text(field).await?,
            "password" => update.password = field_text(field).await?,
            "photo" | "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                if !data.is_empty() {
                    update.photo = Some(PhotoUpload {
                        data: data.to_vec(),
                        file_name,
                        content_type,
                    });
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown profile form field"),
        }
    }

    Ok(ProfileForm { email, update })
}
