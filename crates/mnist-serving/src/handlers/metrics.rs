//! GET /metrics - Prometheus text exposition

use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::metrics::{CONTENT_TYPE, render};
use crate::state::AppState;

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = render(&state.metrics.snapshot());
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

pub fn metrics_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new().route("/metrics", get(metrics))
}
