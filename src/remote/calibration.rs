//! Affine raw-to-screen gaze correction: explicit least-squares calibration,
//! staged calibration sessions, and rate-limited auto-adjustment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    AUTO_ADJUST_MAX_RESIDUAL, AUTO_ADJUST_MIN_INTERVAL_MS, AUTO_ADJUST_MIN_RESIDUAL,
    AUTO_ADJUST_RATE, MIN_CALIBRATION_POINTS, MIN_CALIBRATION_SCALE, MIN_SAMPLES_PER_STAGE,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("insufficient calibration points: got {got}, need at least {required}")]
    InsufficientPoints { got: usize, required: usize },
    #[error("calibration points must cover opposing screen corners")]
    MissingCorners,
    #[error("calibration is degenerate along the {axis} axis")]
    DegenerateAxis { axis: &'static str },
    #[error("calibration point contains a non-finite value")]
    NonFinitePoint,
    #[error("no calibration session in progress")]
    NotCalibrating,
    #[error("a calibration session is already in progress")]
    AlreadyCalibrating,
}

/// A raw sensor reading paired with the screen point the user was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrespondencePoint {
    pub raw_x: f64,
    pub raw_y: f64,
    pub screen_x: f64,
    pub screen_y: f64,
}

impl CorrespondencePoint {
    pub fn new(raw: (f64, f64), screen: (f64, f64)) -> Self {
        Self {
            raw_x: raw.0,
            raw_y: raw.1,
            screen_x: screen.0,
            screen_y: screen.1,
        }
    }

    fn is_finite(&self) -> bool {
        self.raw_x.is_finite()
            && self.raw_y.is_finite()
            && self.screen_x.is_finite()
            && self.screen_y.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfile {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub is_calibrated: bool,
    pub calibrated_at: Option<i64>,
    pub auto_calibration_enabled: bool,
    pub auto_adjustments: u32,
    #[serde(default)]
    pub last_auto_adjust_at: Option<i64>,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            is_calibrated: false,
            calibrated_at: None,
            auto_calibration_enabled: false,
            auto_adjustments: 0,
            last_auto_adjust_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub points_used: usize,
    /// Root-mean-square residual of the fit in screen units.
    pub rms_error: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Least-squares fit of `screen = a * raw + b` for one axis.
fn fit_axis(raw: &[f64], screen: &[f64], axis: &'static str) -> Result<(f64, f64), CalibrationError> {
    let n = raw.len() as f64;
    let mean_r = raw.iter().sum::<f64>() / n;
    let mean_s = screen.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (r, s) in raw.iter().zip(screen) {
        cov += (r - mean_r) * (s - mean_s);
        var += (r - mean_r).powi(2);
    }

    if var <= f64::EPSILON {
        return Err(CalibrationError::DegenerateAxis { axis });
    }
    let a = cov / var;
    if !a.is_finite() || a.abs() < MIN_CALIBRATION_SCALE {
        return Err(CalibrationError::DegenerateAxis { axis });
    }
    Ok((a, mean_s - a * mean_r))
}

fn covers_opposing_corners(points: &[CorrespondencePoint]) -> bool {
    let quadrant = |left: bool, top: bool| {
        points.iter().any(|p| {
            (p.screen_x < 0.5) == left && (p.screen_y < 0.5) == top && p.screen_x != 0.5 && p.screen_y != 0.5
        })
    };
    (quadrant(true, true) && quadrant(false, false)) || (quadrant(false, true) && quadrant(true, false))
}

impl CalibrationProfile {
    /// Map a raw gaze coordinate to screen-normalized space, clamped to [0, 1].
    pub fn apply(&self, raw_x: f64, raw_y: f64) -> (f64, f64) {
        let x = (raw_x - self.offset_x) * self.scale_x;
        let y = (raw_y - self.offset_y) * self.scale_y;
        (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
    }

    /// Fit offset and scale from correspondence points. On error the profile
    /// is left exactly as it was.
    pub fn calibrate(
        &mut self,
        points: &[CorrespondencePoint],
        now_ms: i64,
    ) -> Result<CalibrationReport, CalibrationError> {
        if points.len() < MIN_CALIBRATION_POINTS {
            return Err(CalibrationError::InsufficientPoints {
                got: points.len(),
                required: MIN_CALIBRATION_POINTS,
            });
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(CalibrationError::NonFinitePoint);
        }
        if !covers_opposing_corners(points) {
            return Err(CalibrationError::MissingCorners);
        }

        let raw_x: Vec<f64> = points.iter().map(|p| p.raw_x).collect();
        let raw_y: Vec<f64> = points.iter().map(|p| p.raw_y).collect();
        let screen_x: Vec<f64> = points.iter().map(|p| p.screen_x).collect();
        let screen_y: Vec<f64> = points.iter().map(|p| p.screen_y).collect();

        let (ax, bx) = fit_axis(&raw_x, &screen_x, "x")?;
        let (ay, by) = fit_axis(&raw_y, &screen_y, "y")?;

        let sq_err: f64 = points
            .iter()
            .map(|p| (ax * p.raw_x + bx - p.screen_x).powi(2) + (ay * p.raw_y + by - p.screen_y).powi(2))
            .sum();
        let rms_error = (sq_err / points.len() as f64).sqrt();

        self.scale_x = ax;
        self.scale_y = ay;
        self.offset_x = -bx / ax;
        self.offset_y = -by / ay;
        self.is_calibrated = true;
        self.calibrated_at = Some(now_ms);

        tracing::info!(
            points = points.len(),
            rms_error,
            offset_x = self.offset_x,
            offset_y = self.offset_y,
            scale_x = self.scale_x,
            scale_y = self.scale_y,
            "Gaze calibration applied"
        );

        Ok(CalibrationReport {
            points_used: points.len(),
            rms_error,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        })
    }

    /// Nudge the offset toward the value that would have mapped `observed_raw`
    /// onto `actual_point`. Returns whether an adjustment was made.
    pub fn auto_adjust(&mut self, observed_raw: (f64, f64), actual_point: (f64, f64), now_ms: i64) -> bool {
        if !self.auto_calibration_enabled {
            return false;
        }
        if let Some(last) = self.last_auto_adjust_at {
            if now_ms.saturating_sub(last) < AUTO_ADJUST_MIN_INTERVAL_MS {
                return false;
            }
        }
        if self.scale_x.abs() < MIN_CALIBRATION_SCALE || self.scale_y.abs() < MIN_CALIBRATION_SCALE {
            return false;
        }

        let (cal_x, cal_y) = self.apply(observed_raw.0, observed_raw.1);
        let residual = ((actual_point.0 - cal_x).powi(2) + (actual_point.1 - cal_y).powi(2)).sqrt();
        if !(AUTO_ADJUST_MIN_RESIDUAL..=AUTO_ADJUST_MAX_RESIDUAL).contains(&residual) {
            return false;
        }

        let ideal_x = observed_raw.0 - actual_point.0 / self.scale_x;
        let ideal_y = observed_raw.1 - actual_point.1 / self.scale_y;
        self.offset_x += AUTO_ADJUST_RATE * (ideal_x - self.offset_x);
        self.offset_y += AUTO_ADJUST_RATE * (ideal_y - self.offset_y);
        self.auto_adjustments += 1;
        self.last_auto_adjust_at = Some(now_ms);

        tracing::debug!(
            residual,
            adjustments = self.auto_adjustments,
            "Auto-calibration nudge applied"
        );
        true
    }

    pub fn set_auto_calibration(&mut self, enabled: bool) {
        self.auto_calibration_enabled = enabled;
    }

    /// Restore the identity mapping. The auto-calibration preference survives.
    pub fn reset(&mut self) {
        *self = Self {
            auto_calibration_enabled: self.auto_calibration_enabled,
            ..Self::default()
        };
        tracing::info!("Gaze calibration reset to identity");
    }
}

/// Staged calibration flow: the UI shows one target at a time while raw
/// samples are collected for it, then averages each stage into one point.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    targets: Vec<(f64, f64)>,
    samples: Vec<Vec<(f64, f64)>>,
    stage: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub stage: usize,
    pub total_stages: usize,
    pub target: Option<(f64, f64)>,
    pub samples_in_stage: usize,
    pub complete: bool,
}

impl CalibrationSession {
    pub fn new(targets: Vec<(f64, f64)>) -> Self {
        let samples = vec![Vec::new(); targets.len()];
        Self {
            targets,
            samples,
            stage: 0,
        }
    }

    /// Four inset corners followed by the screen center.
    pub fn four_corner() -> Self {
        Self::new(vec![(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9), (0.5, 0.5)])
    }

    pub fn current_target(&self) -> Option<(f64, f64)> {
        self.targets.get(self.stage).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.stage >= self.targets.len()
    }

    /// Record a raw sample for the current stage. Non-finite samples and
    /// samples after the last stage are ignored.
    pub fn record(&mut self, raw_x: f64, raw_y: f64) -> bool {
        if !raw_x.is_finite() || !raw_y.is_finite() {
            return false;
        }
        match self.samples.get_mut(self.stage) {
            Some(stage) => {
                stage.push((raw_x, raw_y));
                true
            }
            None => false,
        }
    }

    /// Move to the next stage, returning its target if any.
    pub fn advance(&mut self) -> Option<(f64, f64)> {
        if !self.is_complete() {
            self.stage += 1;
        }
        self.current_target()
    }

    /// One averaged correspondence point per stage with enough samples.
    pub fn points(&self) -> Vec<CorrespondencePoint> {
        self.targets
            .iter()
            .zip(&self.samples)
            .filter(|(_, s)| s.len() >= MIN_SAMPLES_PER_STAGE)
            .map(|(&target, s)| {
                let n = s.len() as f64;
                let mx = s.iter().map(|p| p.0).sum::<f64>() / n;
                let my = s.iter().map(|p| p.1).sum::<f64>() / n;
                CorrespondencePoint::new((mx, my), target)
            })
            .collect()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            stage: self.stage,
            total_stages: self.targets.len(),
            target: self.current_target(),
            samples_in_stage: self.samples.get(self.stage).map_or(0, Vec::len),
            complete: self.is_complete(),
        }
    }
}
