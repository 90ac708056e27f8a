//! Health and readiness check endpoints
//!
//! GET /health  - liveness probe (server is up)
//! GET /ready   - readiness probe (model loaded, can serve traffic)

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health - liveness probe
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// GET /ready - readiness probe
///
/// The router is only built after the model loaded, so a listening server
/// is always ready.
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "model": state.model_description,
        })),
    )
}

/// Build the health router sub-tree
pub fn health_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
}
