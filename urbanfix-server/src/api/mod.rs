//! HTTP routes for the UrbanFix server

pub mod checkout;
pub mod health;
pub mod issues;
pub mod payments;
pub mod staff;
pub mod stripe_webhook;
pub mod users;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use shared::error::AppError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::integrations::MAX_FILE_SIZE;
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

/// Multipart profile forms carry one photo plus a few text fields
const PROFILE_FORM_LIMIT: usize = MAX_FILE_SIZE + 1024 * 1024;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    let issues = Router::new()
        .route("/issues", get(issues::list).post(issues::create))
        .route(
            "/issues/{id}",
            get(issues::get).patch(issues::update).delete(issues::delete),
        )
        .route("/issues/assign/{id}", patch(issues::assign))
        .route("/issues/reject/{id}", patch(issues::reject))
        .route("/issues/boost/{id}", patch(issues::boost))
        .route("/issues/upvote/{id}", patch(issues::upvote));

    let users = Router::new()
        .route("/users", get(users::list).post(users::register))
        .route("/users/{email}", get(users::get))
        .route("/users/subscribe/{email}", patch(users::subscribe))
        .route("/users/block/{email}", patch(users::block))
        .route("/users/unblock/{email}", patch(users::unblock))
        .route("/users/update", patch(users::update_own))
        .route("/users/updateadmin", patch(users::update_any))
        .layer(DefaultBodyLimit::max(PROFILE_FORM_LIMIT));

    let staff = Router::new().route("/staff", get(staff::list).post(staff::create));

    let payments = Router::new()
        .route("/payments", get(payments::list).post(payments::record))
        .route("/create-checkout-session", post(checkout::create_session));

    // Stripe webhook (signature-verified, raw body)
    let webhook = Router::new().route("/stripe/webhook", post(stripe_webhook::handle_webhook));

    let uploads = ServeDir::new(&state.upload_dir);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .merge(issues)
        .merge(users)
        .merge(staff)
        .merge(payments)
        .merge(webhook)
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
