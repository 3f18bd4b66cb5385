mod common;

use axum::http::{Method, StatusCode};
use std::time::Duration;

use serde_json::{json, Value};

use gaze_remote::config::LimitsConfig;
use gaze_remote::remote::orchestrator::RemoteControl;
use gaze_remote::workers::flush;

use common::app::{spawn_test_app, spawn_with};
use common::fixtures::{blinks, frame, frame_json, frames_json, idle, OPEN, SHUT};
use common::http::{assert_json_error, call, ok_data, request, request_with_headers, response_json};

fn target_json() -> Value {
    json!({
        "id": "T",
        "rect": { "left": 0.0, "top": 0.0, "width": 0.25, "height": 0.25 },
        "requiredDwellMs": 600,
        "action": "select",
        "blinkActions": { "2": "open" }
    })
}

#[tokio::test]
async fn it_settings_round_trip_and_clamp() {
    let app = spawn_test_app().await;

    let (status, body) = call(&app.app, Method::GET, "/api/settings", None).await;
    let data = ok_data(status, &body);
    assert_eq!(data["sensitivity"], 5);
    assert_eq!(data["gazeHoldTimeMs"], 800);

    let (status, body) = call(
        &app.app,
        Method::PUT,
        "/api/settings",
        Some(json!({ "gazeHoldTimeMs": -50, "sensitivity": 42, "rapidMovementEnabled": true })),
    )
    .await;
    let data = ok_data(status, &body);
    assert_eq!(data["settings"]["gazeHoldTimeMs"], 100);
    assert_eq!(data["settings"]["sensitivity"], 10);
    assert_eq!(data["settings"]["rapidMovementEnabled"], true);
    let clamped: Vec<&str> = data["clamped"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(clamped.contains(&"gazeHoldTimeMs"));
    assert!(clamped.contains(&"sensitivity"));

    let settings = app.state.session().lock().await.settings.clone();
    assert_eq!(settings.gaze_hold_time_ms, 100);
}

#[tokio::test]
async fn it_frames_drive_dwell_and_activation() {
    let app = spawn_test_app().await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({
            "targets": [target_json()],
            "frames": [
                frame_json(0.5, 0.5, OPEN, 0),
                frame_json(0.1, 0.1, OPEN, 200),
                frame_json(0.1, 0.1, OPEN, 400),
                frame_json(0.1, 0.1, OPEN, 600),
            ]
        })),
    )
    .await;
    let data = ok_data(status, &body);
    assert_eq!(data["processed"], 4);
    assert_eq!(data["skipped"], 0);
    assert_eq!(data["last"]["outcome"], "processed");
    assert_eq!(data["last"]["dwell"]["targetId"], "T");
    assert_eq!(data["last"]["dwell"]["isGhost"], true);

    // double blink, then a frame after the pattern window resolves it
    let (mut blink, reopened) = blinks(0.1, 0.1, 2, 700);
    blink.push(frame(0.1, 0.1, OPEN, reopened + 601));
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({ "frames": frames_json(&blink) })),
    )
    .await;
    let data = ok_data(status, &body);
    let commands = data["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["kind"], "targetActivated");
    assert_eq!(commands[0]["payload"]["targetId"], "T");
    assert_eq!(commands[0]["payload"]["action"], "open");
    assert_eq!(commands[0]["payload"]["blinkCount"], 2);
}

#[tokio::test]
async fn it_disable_via_settings_drops_pending_activation() {
    let app = spawn_test_app().await;

    let mut frames = vec![frame(0.5, 0.5, OPEN, 0)];
    frames.extend([200, 400, 600].map(|t| frame(0.1, 0.1, OPEN, t)));
    frames.extend([frame(0.1, 0.1, SHUT, 700), frame(0.1, 0.1, OPEN, 800)]);
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({ "targets": [target_json()], "frames": frames_json(&frames) })),
    )
    .await;
    let data = ok_data(status, &body);
    assert_eq!(data["last"]["dwell"]["isGhost"], true);

    let (status, body) = call(&app.app, Method::PUT, "/api/settings", Some(json!({ "enabled": false }))).await;
    ok_data(status, &body);

    let (status, body) = call(&app.app, Method::GET, "/api/status", None).await;
    let data = ok_data(status, &body);
    assert_eq!(data["enabled"], false);
    assert_eq!(data["dwell"]["targetId"], Value::Null);
    assert_eq!(data["dwell"]["progress"], 0.0);

    let (status, body) = call(&app.app, Method::PUT, "/api/settings", Some(json!({ "enabled": true }))).await;
    ok_data(status, &body);

    let mut session = app.state.session().lock().await;
    assert!(session.remote.is_quiescent());
    let targets = session.targets.clone();
    let settings = session.settings.clone();
    let out = session.remote.flush(2_000, &targets, &settings);
    assert!(out.commands.is_empty());
}

#[tokio::test(start_paused = true)]
async fn it_blink_pattern_spans_two_batches() {
    let app = spawn_test_app().await;

    let mut first: Vec<_> = (0..8).map(|i| idle(i * 100)).collect();
    first.extend([
        frame(0.05, 0.5, OPEN, 800),
        frame(0.05, 0.5, SHUT, 850),
        frame(0.05, 0.5, OPEN, 950),
        frame(0.05, 0.5, OPEN, 1_000),
    ]);
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({ "frames": frames_json(&first) })),
    )
    .await;
    ok_data(status, &body);

    // the next batch is still in flight; the flush must not close the window
    tokio::time::advance(Duration::from_millis(700)).await;
    assert_eq!(flush::run(&app.state).await, 0);

    let second = [
        frame(0.05, 0.5, SHUT, 1_200),
        frame(0.05, 0.5, OPEN, 1_300),
        frame(0.05, 0.5, OPEN, 2_500),
    ];
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({ "frames": frames_json(&second) })),
    )
    .await;
    let data = ok_data(status, &body);
    let commands = data["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["kind"], "comboMatched");
    assert_eq!(commands[0]["payload"]["comboId"], "go-back");
}

#[tokio::test]
async fn it_frames_skip_anomalies() {
    let app = spawn_test_app().await;
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({
            "frames": [
                frame_json(0.5, 0.5, OPEN, 100),
                frame_json(5.0, 0.5, OPEN, 200),
                frame_json(0.5, 0.5, OPEN, 50),
            ]
        })),
    )
    .await;
    let data = ok_data(status, &body);
    assert_eq!(data["processed"], 1);
    assert_eq!(data["skipped"], 2);
    assert_eq!(data["last"]["outcome"], "skipped");
}

#[tokio::test]
async fn it_frames_reject_empty_and_oversized_batches() {
    let limits = LimitsConfig {
        max_frames_per_request: 2,
        ..LimitsConfig::default()
    };
    let app = spawn_with(RemoteControl::default(), limits).await;

    let (status, body) = call(&app.app, Method::POST, "/api/frames", Some(json!({ "frames": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "NO_FRAMES");

    let frames: Vec<_> = (0..3).map(|i| frame_json(0.5, 0.5, OPEN, i * 10)).collect();
    let (status, body) = call(&app.app, Method::POST, "/api/frames", Some(json!({ "frames": frames }))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_json_error(&body, "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn it_targets_are_validated_and_listed() {
    let app = spawn_test_app().await;

    let dup = json!({ "targets": [target_json(), target_json()] });
    let (status, body) = call(&app.app, Method::PUT, "/api/targets", Some(dup)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_TARGET");

    let (status, body) = call(
        &app.app,
        Method::PUT,
        "/api/targets",
        Some(json!({ "targets": [target_json()] })),
    )
    .await;
    assert_eq!(ok_data(status, &body)["count"], 1);

    let (status, body) = call(&app.app, Method::GET, "/api/targets", None).await;
    let data = ok_data(status, &body);
    assert_eq!(data[0]["id"], "T");
    assert_eq!(data[0]["blinkActions"]["2"], "open");
}

#[tokio::test]
async fn it_combo_lifecycle() {
    let app = spawn_test_app().await;

    let (status, body) = call(&app.app, Method::GET, "/api/combos", None).await;
    assert_eq!(ok_data(status, &body).as_array().unwrap().len(), 5);

    let peek = json!({
        "id": "peek",
        "steps": [{ "type": "direction", "value": "up" }, { "type": "blink", "value": 1 }],
        "action": "peek"
    });
    let (status, body) = call(&app.app, Method::POST, "/api/combos", Some(peek)).await;
    assert_eq!(status, StatusCode::CREATED);
    let data = ok_data(status, &body);
    assert_eq!(data["source"], "custom");
    assert_eq!(data["name"], "peek");
    assert_eq!(data["enabled"], true);

    let (status, body) = call(
        &app.app,
        Method::PUT,
        "/api/combos/peek/enabled",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(ok_data(status, &body)["enabled"], false);

    let (status, body) = call(&app.app, Method::GET, "/api/combos/peek", None).await;
    assert_eq!(ok_data(status, &body)["enabled"], false);

    let (status, body) = call(&app.app, Method::DELETE, "/api/combos/peek", None).await;
    assert_eq!(ok_data(status, &body)["id"], "peek");

    let (status, body) = call(&app.app, Method::DELETE, "/api/combos/peek", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn it_invalid_combos_are_rejected() {
    let app = spawn_test_app().await;

    let bad_blink = json!({
        "id": "x",
        "steps": [{ "type": "blink", "value": 5 }],
        "action": "noop"
    });
    let (status, body) = call(&app.app, Method::POST, "/api/combos", Some(bad_blink)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_COMBO");

    let leading_hold = json!({
        "id": "x",
        "steps": [{ "type": "hold", "value": 300 }, { "type": "direction", "value": "up" }],
        "action": "noop"
    });
    let (status, body) = call(&app.app, Method::POST, "/api/combos", Some(leading_hold)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_COMBO");

    let (status, body) = call(&app.app, Method::POST, "/api/combos", Some(json!({ "id": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_REQUEST_BODY");
}

#[tokio::test]
async fn it_staged_calibration_flow() {
    let app = spawn_test_app().await;
    let (off_x, off_y) = (0.06, -0.03);

    let (status, body) = call(&app.app, Method::POST, "/api/calibration/start", None).await;
    let data = ok_data(status, &body);
    assert_eq!(data["totalStages"], 5);
    assert_eq!(data["stage"], 0);

    let (status, body) = call(&app.app, Method::POST, "/api/calibration/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "ALREADY_CALIBRATING");

    // frames are consumed as samples, not as live input
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({ "frames": [frame_json(0.99, 0.5, OPEN, 0)] })),
    )
    .await;
    let data = ok_data(status, &body);
    assert_eq!(data["last"]["outcome"], "calibrating");
    assert!(data["commands"].as_array().unwrap().is_empty());

    // restart cleanly so the stray frame does not skew stage 0
    let (status, _) = call(&app.app, Method::POST, "/api/calibration/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app.app, Method::POST, "/api/calibration/start", None).await;
    assert_eq!(status, StatusCode::OK);

    for (x, y) in [(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9), (0.5, 0.5)] {
        for _ in 0..3 {
            let sample = json!({ "rawX": x + off_x, "rawY": y + off_y });
            let (status, _) = call(&app.app, Method::POST, "/api/calibration/sample", Some(sample)).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = call(&app.app, Method::POST, "/api/calibration/next", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(&app.app, Method::POST, "/api/calibration/finish", None).await;
    let report = ok_data(status, &body);
    assert_eq!(report["pointsUsed"], 5);
    assert!((report["offsetX"].as_f64().unwrap() - off_x).abs() < 1e-9);
    assert!((report["offsetY"].as_f64().unwrap() - off_y).abs() < 1e-9);

    let (status, body) = call(&app.app, Method::GET, "/api/calibration/profile", None).await;
    assert_eq!(ok_data(status, &body)["isCalibrated"], true);

    let (status, body) = call(&app.app, Method::POST, "/api/calibration/finish", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "NOT_CALIBRATING");

    let (status, body) = call(&app.app, Method::POST, "/api/calibration/reset", None).await;
    assert_eq!(ok_data(status, &body)["isCalibrated"], false);
}

#[tokio::test]
async fn it_calibration_from_points_refuses_too_few() {
    let app = spawn_test_app().await;
    let points = json!({
        "points": [
            { "rawX": 0.1, "rawY": 0.1, "screenX": 0.1, "screenY": 0.1 },
            { "rawX": 0.9, "rawY": 0.9, "screenX": 0.9, "screenY": 0.9 },
        ]
    });
    let (status, body) = call(&app.app, Method::POST, "/api/calibration/points", Some(points)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "CALIBRATION_REFUSED");

    let (status, body) = call(&app.app, Method::GET, "/api/calibration", None).await;
    let data = ok_data(status, &body);
    assert_eq!(data["mode"], "live");
    assert_eq!(data["profile"]["isCalibrated"], false);
    assert!(data["session"].is_null());
}

#[tokio::test]
async fn it_auto_calibration_toggle() {
    let app = spawn_test_app().await;
    let (status, body) = call(
        &app.app,
        Method::PUT,
        "/api/calibration/auto",
        Some(json!({ "enabled": true })),
    )
    .await;
    assert_eq!(ok_data(status, &body)["autoCalibrationEnabled"], true);
}

#[tokio::test]
async fn it_status_reports_live_state() {
    let app = spawn_test_app().await;
    call(
        &app.app,
        Method::POST,
        "/api/frames",
        Some(json!({ "frames": [frame_json(0.05, 0.5, OPEN, 1_000)] })),
    )
    .await;

    let (status, body) = call(&app.app, Method::GET, "/api/status", None).await;
    let data = ok_data(status, &body);
    assert_eq!(data["enabled"], true);
    assert_eq!(data["mode"], "live");
    assert_eq!(data["direction"], "left");
    assert_eq!(data["combo"]["candidateCombo"], "go-back");
    assert!(data["sensorTimeMs"].as_i64().unwrap() >= 1_000);

    let (status, body) = call(&app.app, Method::GET, "/api/combos/progress", None).await;
    assert_eq!(ok_data(status, &body)["observedSteps"][0]["value"], "left");
}

#[tokio::test]
async fn it_json_errors_carry_request_id() {
    let app = spawn_test_app().await;
    let resp = request_with_headers(
        &app.app,
        Method::GET,
        "/api/nope",
        None,
        &[("x-request-id", "probe-42")],
    )
    .await;
    let (status, headers, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get("x-request-id").unwrap(), "probe-42");
    assert_json_error(&body, "NOT_FOUND");
    assert_eq!(body["traceId"], "probe-42");
}

#[tokio::test]
async fn it_missing_content_type_is_rejected() {
    let app = spawn_test_app().await;
    let resp = request(&app.app, Method::PUT, "/api/settings", None).await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "UNSUPPORTED_CONTENT_TYPE");
}
