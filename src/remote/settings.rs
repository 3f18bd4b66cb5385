use serde::{Deserialize, Serialize};

use crate::constants::{EFFECTIVE_EDGE_THRESHOLD_MAX, EFFECTIVE_EDGE_THRESHOLD_MIN};

/// How to pick among combos whose full sequences are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComboTieBreak {
    /// Most recently registered definition wins.
    #[default]
    LatestRegistered,
    EarliestRegistered,
    /// Custom definitions beat built-ins, then most recent.
    PreferCustom,
}

/// User-facing remote control settings, read on every tick.
///
/// Millisecond fields are signed so that out-of-range input (e.g. a negative
/// hold time from a settings form) deserializes and is then clamped by
/// [`RemoteControlSettings::sanitized`] instead of being rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteControlSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 1 (least sensitive) ..= 10 (most sensitive); 5 is neutral.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: i32,
    #[serde(default = "default_gaze_hold_time_ms")]
    pub gaze_hold_time_ms: i64,
    /// Fraction of the half-screen the gaze must deviate from center.
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: f64,
    #[serde(default = "default_blink_pattern_timeout_ms")]
    pub blink_pattern_timeout_ms: i64,
    #[serde(default = "default_ghost_opacity")]
    pub ghost_opacity: f64,
    #[serde(default)]
    pub rapid_movement_enabled: bool,
    /// Openness below this counts as a closed eye.
    #[serde(default = "default_closure_threshold")]
    pub closure_threshold: f64,
    #[serde(default = "default_min_blink_gap_ms")]
    pub min_blink_gap_ms: i64,
    /// Maximum gap between direction steps of one combo.
    #[serde(default = "default_direction_gap_ms")]
    pub direction_gap_ms: i64,
    #[serde(default)]
    pub combo_tie_break: ComboTieBreak,
    /// Number of recent calibrated points averaged; 1 disables smoothing.
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: i64,
}

fn default_enabled() -> bool {
    true
}
fn default_sensitivity() -> i32 {
    5
}
fn default_gaze_hold_time_ms() -> i64 {
    800
}
fn default_edge_threshold() -> f64 {
    0.6
}
fn default_blink_pattern_timeout_ms() -> i64 {
    600
}
fn default_ghost_opacity() -> f64 {
    0.6
}
fn default_closure_threshold() -> f64 {
    0.2
}
fn default_min_blink_gap_ms() -> i64 {
    150
}
fn default_direction_gap_ms() -> i64 {
    1500
}
fn default_smoothing_window() -> i64 {
    1
}

impl Default for RemoteControlSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sensitivity: default_sensitivity(),
            gaze_hold_time_ms: default_gaze_hold_time_ms(),
            edge_threshold: default_edge_threshold(),
            blink_pattern_timeout_ms: default_blink_pattern_timeout_ms(),
            ghost_opacity: default_ghost_opacity(),
            rapid_movement_enabled: false,
            closure_threshold: default_closure_threshold(),
            min_blink_gap_ms: default_min_blink_gap_ms(),
            direction_gap_ms: default_direction_gap_ms(),
            combo_tie_break: ComboTieBreak::default(),
            smoothing_window: default_smoothing_window(),
        }
    }
}

fn clamp_i64(value: i64, min: i64, max: i64, field: &'static str, out: &mut Vec<&'static str>) -> i64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        out.push(field);
    }
    clamped
}

fn clamp_f64(
    value: f64,
    min: f64,
    max: f64,
    fallback: f64,
    field: &'static str,
    out: &mut Vec<&'static str>,
) -> f64 {
    if !value.is_finite() {
        out.push(field);
        return fallback;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        out.push(field);
    }
    clamped
}

impl RemoteControlSettings {
    /// Returns a copy with every field clamped into its valid range, plus the
    /// names of the fields that had to be changed.
    pub fn sanitized(&self) -> (Self, Vec<&'static str>) {
        let (settings, clamped) = self.clamp_fields();
        if !clamped.is_empty() {
            tracing::warn!(fields = ?clamped, "Remote control settings clamped to valid range");
        }
        (settings, clamped)
    }

    /// Same as [`sanitized`](Self::sanitized) without logging; used on the
    /// per-tick path.
    pub fn clamped(&self) -> Self {
        self.clamp_fields().0
    }

    fn clamp_fields(&self) -> (Self, Vec<&'static str>) {
        let mut clamped = Vec::new();
        let sensitivity = {
            let v = self.sensitivity.clamp(1, 10);
            if v != self.sensitivity {
                clamped.push("sensitivity");
            }
            v
        };

        let settings = Self {
            enabled: self.enabled,
            sensitivity,
            gaze_hold_time_ms: clamp_i64(self.gaze_hold_time_ms, 100, 10_000, "gazeHoldTimeMs", &mut clamped),
            edge_threshold: clamp_f64(
                self.edge_threshold,
                0.0,
                1.0,
                default_edge_threshold(),
                "edgeThreshold",
                &mut clamped,
            ),
            blink_pattern_timeout_ms: clamp_i64(
                self.blink_pattern_timeout_ms,
                200,
                3_000,
                "blinkPatternTimeoutMs",
                &mut clamped,
            ),
            ghost_opacity: clamp_f64(
                self.ghost_opacity,
                0.0,
                1.0,
                default_ghost_opacity(),
                "ghostOpacity",
                &mut clamped,
            ),
            rapid_movement_enabled: self.rapid_movement_enabled,
            closure_threshold: clamp_f64(
                self.closure_threshold,
                0.05,
                0.9,
                default_closure_threshold(),
                "closureThreshold",
                &mut clamped,
            ),
            min_blink_gap_ms: clamp_i64(self.min_blink_gap_ms, 0, 1_000, "minBlinkGapMs", &mut clamped),
            direction_gap_ms: clamp_i64(self.direction_gap_ms, 200, 10_000, "directionGapMs", &mut clamped),
            combo_tie_break: self.combo_tie_break,
            smoothing_window: clamp_i64(self.smoothing_window, 1, 30, "smoothingWindow", &mut clamped),
        };
        (settings, clamped)
    }

    /// Multiplier derived from sensitivity: 1.0 at 5, smaller (faster,
    /// tighter) when more sensitive, larger when less.
    pub fn sensitivity_factor(&self) -> f64 {
        1.0 + (5 - self.sensitivity.clamp(1, 10)) as f64 * 0.1
    }

    pub fn effective_edge_threshold(&self) -> f64 {
        (self.edge_threshold * self.sensitivity_factor())
            .clamp(EFFECTIVE_EDGE_THRESHOLD_MIN, EFFECTIVE_EDGE_THRESHOLD_MAX)
    }

    /// Scales a hold time (the global default or a target's own) by the
    /// sensitivity factor.
    pub fn effective_hold_ms(&self, base_ms: u64) -> u64 {
        ((base_ms as f64) * self.sensitivity_factor()).round().max(1.0) as u64
    }

    pub fn default_hold_ms(&self) -> u64 {
        self.gaze_hold_time_ms.max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_need_no_clamping() {
        let (s, clamped) = RemoteControlSettings::default().sanitized();
        assert!(clamped.is_empty());
        assert_eq!(s, RemoteControlSettings::default());
    }

    #[test]
    fn negative_hold_time_is_clamped() {
        let raw = RemoteControlSettings {
            gaze_hold_time_ms: -50,
            sensitivity: 42,
            edge_threshold: f64::NAN,
            ..RemoteControlSettings::default()
        };
        let (s, clamped) = raw.sanitized();
        assert_eq!(s.gaze_hold_time_ms, 100);
        assert_eq!(s.sensitivity, 10);
        assert_eq!(s.edge_threshold, 0.6);
        assert!(clamped.contains(&"gazeHoldTimeMs"));
        assert!(clamped.contains(&"sensitivity"));
        assert!(clamped.contains(&"edgeThreshold"));
    }

    #[test]
    fn neutral_sensitivity_leaves_values_untouched() {
        let s = RemoteControlSettings::default();
        assert!((s.sensitivity_factor() - 1.0).abs() < 1e-12);
        assert_eq!(s.effective_hold_ms(600), 600);
        assert!((s.effective_edge_threshold() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn higher_sensitivity_shortens_hold_and_threshold() {
        let s = RemoteControlSettings {
            sensitivity: 10,
            ..RemoteControlSettings::default()
        };
        assert_eq!(s.effective_hold_ms(800), 400);
        assert!(s.effective_edge_threshold() < 0.6);

        let low = RemoteControlSettings {
            sensitivity: 1,
            ..RemoteControlSettings::default()
        };
        assert_eq!(low.effective_hold_ms(800), 1120);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let s: RemoteControlSettings =
            serde_json::from_value(serde_json::json!({ "sensitivity": 7 })).unwrap();
        assert_eq!(s.sensitivity, 7);
        assert_eq!(s.gaze_hold_time_ms, 800);
        assert!(s.enabled);
        assert_eq!(s.combo_tie_break, ComboTieBreak::LatestRegistered);
    }
}
