use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;

use crate::extractors::JsonBody;
use crate::remote::calibration::{CalibrationSession, CorrespondencePoint};
use crate::response::{ok, AppError};
use crate::state::{AppState, Session};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_status))
        .route("/profile", get(get_profile))
        .route("/start", post(start))
        .route("/sample", post(record_sample))
        .route("/next", post(next_stage))
        .route("/finish", post(finish))
        .route("/cancel", post(cancel))
        .route("/points", post(calibrate_from_points))
        .route("/reset", post(reset))
        .route("/auto", put(set_auto))
}

/// Sensor time used to stamp a finished calibration; zero before any frame.
fn stamp(session: &Session) -> i64 {
    session.sensor_now().unwrap_or(0)
}

async fn get_status(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let session = state.session().lock().await;
    ok(serde_json::json!({
        "mode": session.remote.mode(),
        "session": session.remote.calibration_status(),
        "profile": session.remote.profile(),
    }))
}

async fn get_profile(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let profile = state.session().lock().await.remote.profile().clone();
    ok(profile)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    /// Screen points to show, in order. Defaults to four corners and center.
    #[serde(default)]
    targets: Option<Vec<(f64, f64)>>,
}

async fn start(
    State(state): State<AppState>,
    body: Option<JsonBody<StartRequest>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let req = body.map(|JsonBody(r)| r).unwrap_or_default();
    let calibration = match req.targets {
        Some(targets) => {
            if targets.is_empty() {
                return Err(AppError::bad_request(
                    "INVALID_CALIBRATION_TARGETS",
                    "At least one calibration target is required",
                ));
            }
            if targets.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                return Err(AppError::bad_request(
                    "INVALID_CALIBRATION_TARGETS",
                    "Calibration targets must be finite",
                ));
            }
            CalibrationSession::new(targets)
        }
        None => CalibrationSession::four_corner(),
    };
    let status = state
        .session()
        .lock()
        .await
        .remote
        .begin_calibration(calibration)?;
    Ok(ok(status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SampleRequest {
    raw_x: f64,
    raw_y: f64,
}

async fn record_sample(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SampleRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let status = state
        .session()
        .lock()
        .await
        .remote
        .record_calibration_sample(req.raw_x, req.raw_y)?;
    Ok(ok(status))
}

async fn next_stage(State(state): State<AppState>) -> Result<impl axum::response::IntoResponse, AppError> {
    let status = state.session().lock().await.remote.advance_calibration()?;
    Ok(ok(status))
}

async fn finish(State(state): State<AppState>) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut session = state.session().lock().await;
    let now = stamp(&session);
    let report = session.remote.finish_calibration(now)?;
    tracing::info!(
        points = report.points_used,
        rms_error = report.rms_error,
        "Calibration finished"
    );
    Ok(ok(report))
}

async fn cancel(State(state): State<AppState>) -> Result<impl axum::response::IntoResponse, AppError> {
    state.session().lock().await.remote.cancel_calibration()?;
    Ok(ok(serde_json::json!({ "cancelled": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsRequest {
    points: Vec<CorrespondencePoint>,
}

async fn calibrate_from_points(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PointsRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut session = state.session().lock().await;
    let now = stamp(&session);
    let report = session.remote.calibrate(&req.points, now)?;
    Ok(ok(report))
}

async fn reset(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let mut session = state.session().lock().await;
    session.remote.reset_calibration();
    ok(session.remote.profile().clone())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoRequest {
    enabled: bool,
}

async fn set_auto(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AutoRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut session = state.session().lock().await;
    session.remote.set_auto_calibration(req.enabled);
    Ok(ok(session.remote.profile().clone()))
}
