use serde_json::{json, Value};

use gaze_remote::remote::types::{Rect, ScreenTarget, SensorFrame};

pub const OPEN: f64 = 0.9;
pub const SHUT: f64 = 0.05;

pub fn frame(x: f64, y: f64, openness: f64, t: i64) -> SensorFrame {
    SensorFrame {
        raw_x: x,
        raw_y: y,
        openness,
        timestamp_ms: t,
    }
}

/// Eyes open at the screen center.
pub fn idle(t: i64) -> SensorFrame {
    frame(0.5, 0.5, OPEN, t)
}

/// `count` blinks at `(x, y)` starting at `t`, 100 ms closed and 200 ms
/// between closures. Returns the frames and the time of the last reopen.
pub fn blinks(x: f64, y: f64, count: u8, t: i64) -> (Vec<SensorFrame>, i64) {
    let mut frames = Vec::new();
    let mut now = t;
    let mut reopened = t;
    for _ in 0..count {
        frames.push(frame(x, y, SHUT, now));
        reopened = now + 100;
        frames.push(frame(x, y, OPEN, reopened));
        now += 300;
    }
    (frames, reopened)
}

/// Target near the top-left corner, 600 ms dwell, 2 blinks mapped to "open".
pub fn corner_target() -> ScreenTarget {
    ScreenTarget::new("T", Rect::new(0.0, 0.0, 0.25, 0.25), "select")
        .with_dwell_ms(600)
        .with_blink_action(2, "open")
}

pub fn frame_json(x: f64, y: f64, openness: f64, t: i64) -> Value {
    json!({ "rawX": x, "rawY": y, "openness": openness, "timestampMs": t })
}

pub fn frames_json(frames: &[SensorFrame]) -> Value {
    Value::Array(
        frames
            .iter()
            .map(|f| frame_json(f.raw_x, f.raw_y, f.openness, f.timestamp_ms))
            .collect(),
    )
}
