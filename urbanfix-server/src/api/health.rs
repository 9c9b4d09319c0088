//! Liveness endpoints

use axum::Json;

/// GET /
pub async fn root() -> &'static str {
    "UrbanFix server is running"
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "urbanfix-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
