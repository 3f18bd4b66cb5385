use std::collections::HashSet;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::extractors::JsonBody;
use crate::remote::orchestrator::{Mode, TickOutcome, TickOutput};
use crate::remote::types::{Command, ComboProgress, Direction, DwellUpdate, ScreenTarget, SensorFrame};
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/frames", post(ingest_frames))
        .route("/targets", put(replace_targets).get(list_targets))
        .route("/status", get(status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FramesRequest {
    frames: Vec<SensorFrame>,
    /// Replaces the registered targets before the first frame is ticked.
    targets: Option<Vec<ScreenTarget>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FramesResponse {
    processed: usize,
    skipped: usize,
    commands: Vec<Command>,
    last: TickOutput,
}

fn validate_targets(targets: &[ScreenTarget]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for target in targets {
        if target.id.trim().is_empty() {
            return Err(AppError::bad_request("INVALID_TARGET", "Target id must not be empty"));
        }
        if !seen.insert(target.id.as_str()) {
            return Err(AppError::bad_request(
                "INVALID_TARGET",
                &format!("Duplicate target id '{}'", target.id),
            ));
        }
        let r = &target.rect;
        let finite = [r.left, r.top, r.width, r.height].iter().all(|v| v.is_finite());
        if !finite || r.width < 0.0 || r.height < 0.0 {
            return Err(AppError::bad_request(
                "INVALID_TARGET",
                &format!("Target '{}' has an invalid rect", target.id),
            ));
        }
        if target.blink_actions.keys().any(|&n| !(1..=3).contains(&n)) {
            return Err(AppError::bad_request(
                "INVALID_TARGET",
                &format!("Target '{}' maps a blink count outside 1..=3", target.id),
            ));
        }
    }
    Ok(())
}

async fn ingest_frames(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<FramesRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let max = state.config().limits.max_frames_per_request;
    if req.frames.is_empty() {
        return Err(AppError::bad_request("NO_FRAMES", "At least one frame is required"));
    }
    if req.frames.len() > max {
        return Err(AppError::payload_too_large(&format!(
            "At most {max} frames per request"
        )));
    }
    if let Some(targets) = &req.targets {
        validate_targets(targets)?;
    }

    let response = {
        let mut guard = state.session().lock().await;
        let session = &mut *guard;
        if let Some(targets) = req.targets {
            session.targets = targets;
        }

        let mut commands = Vec::new();
        let mut processed = 0;
        let mut skipped = 0;
        let mut last = None;
        let mut span: Option<(i64, i64)> = None;
        for frame in &req.frames {
            let output = session.remote.tick(frame, &session.targets, &session.settings);
            match output.outcome {
                TickOutcome::Skipped => skipped += 1,
                _ => {
                    processed += 1;
                    let first = span.map_or(frame.timestamp_ms, |(first, _)| first);
                    span = Some((first, frame.timestamp_ms));
                }
            }
            commands.extend(output.commands.iter().cloned());
            last = Some(output);
        }
        if let Some((first, last_ms)) = span {
            session.observe_batch(first, last_ms);
        }

        let Some(last) = last else {
            return Err(AppError::internal("frame batch produced no tick"));
        };
        FramesResponse {
            processed,
            skipped,
            commands,
            last,
        }
    };

    if response.skipped > 0 {
        tracing::debug!(skipped = response.skipped, "Frames skipped as input anomalies");
    }
    state.publish(&response.commands);
    Ok(ok(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetsRequest {
    targets: Vec<ScreenTarget>,
}

async fn replace_targets(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TargetsRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    validate_targets(&req.targets)?;
    let count = req.targets.len();
    state.session().lock().await.targets = req.targets;
    tracing::debug!(count, "Targets replaced");
    Ok(ok(serde_json::json!({ "count": count })))
}

async fn list_targets(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let targets = state.session().lock().await.targets.clone();
    ok(targets)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    enabled: bool,
    mode: Mode,
    direction: Direction,
    dwell: DwellUpdate,
    combo: ComboProgress,
    target_count: usize,
    sensor_time_ms: Option<i64>,
}

async fn status(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let session = state.session().lock().await;
    ok(StatusResponse {
        enabled: session.settings.enabled,
        mode: session.remote.mode(),
        direction: session.remote.direction(),
        dwell: session.remote.dwell(&session.settings),
        combo: session.remote.combo_progress(&session.settings),
        target_count: session.targets.len(),
        sensor_time_ms: session.sensor_now(),
    })
}
