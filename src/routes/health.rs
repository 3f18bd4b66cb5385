use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

pub async fn health_check(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.uptime_secs(),
        "sseConnections": state.sse_connections().load(Ordering::Relaxed),
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready once the session lock can be taken; reports what the remote is doing.
pub async fn readiness(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let session = state.session().lock().await;
    Json(serde_json::json!({
        "ready": true,
        "enabled": session.settings.enabled,
        "mode": session.remote.mode(),
        "calibrated": session.remote.profile().is_calibrated,
        "combos": session.remote.combos().len(),
        "targets": session.targets.len(),
    }))
}
