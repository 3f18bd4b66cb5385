/// Hysteresis ratio: a reported direction is held until deviation drops
/// below `edge_threshold * DIRECTION_RELEASE_RATIO`.
pub const DIRECTION_RELEASE_RATIO: f64 = 0.7;

/// Deviations closer than this are treated as an axis tie.
pub const AXIS_TIE_EPSILON: f64 = 1e-9;

/// Bounds applied after sensitivity scales the edge threshold.
pub const EFFECTIVE_EDGE_THRESHOLD_MIN: f64 = 0.05;
pub const EFFECTIVE_EDGE_THRESHOLD_MAX: f64 = 0.95;

/// Openness must rise this far above the closure threshold to count as reopened.
pub const REOPEN_HYSTERESIS: f64 = 0.1;

/// Largest blink count any command maps to; more resets the window.
pub const MAX_BLINK_COUNT: u8 = 3;

/// Upper bound on the frame interval credited to a freshly entered dwell.
pub const MAX_FRAME_CREDIT_MS: i64 = 250;

/// Fraction of the residual applied per auto-calibration nudge.
pub const AUTO_ADJUST_RATE: f64 = 0.05;

/// Minimum spacing between two auto-calibration nudges.
pub const AUTO_ADJUST_MIN_INTERVAL_MS: i64 = 2_000;

/// Residuals smaller than this are considered an exact hit (no nudge).
pub const AUTO_ADJUST_MIN_RESIDUAL: f64 = 0.01;

/// Residuals larger than this are not "near" the target (no nudge).
pub const AUTO_ADJUST_MAX_RESIDUAL: f64 = 0.2;

/// Minimum correspondence points accepted by a calibration fit.
pub const MIN_CALIBRATION_POINTS: usize = 4;

/// Fitted scales with a smaller magnitude are rejected as degenerate.
pub const MIN_CALIBRATION_SCALE: f64 = 1e-3;

/// Raw coordinates outside this range are treated as sensor garbage.
pub const RAW_COORD_MIN: f64 = -1.0;
pub const RAW_COORD_MAX: f64 = 2.0;

/// Interval between repeated navigation commands while a direction is held
/// with rapid movement enabled (before sensitivity scaling).
pub const RAPID_REPEAT_MS: i64 = 400;

/// A combo sequence older than this is dropped regardless of gaps.
pub const MAX_SEQUENCE_MS: i64 = 10_000;

/// Minimum raw samples averaged into one staged calibration point.
pub const MIN_SAMPLES_PER_STAGE: usize = 3;

/// Cap on the batch span the flush clock waits out before advancing sensor
/// time past the newest delivered frame.
pub const MAX_BATCH_LAG_MS: i64 = 5_000;
