use serde::{Deserialize, Serialize};

use crate::constants::{RAPID_REPEAT_MS, RAW_COORD_MAX, RAW_COORD_MIN};
use crate::remote::blink::BlinkPatternDetector;
use crate::remote::calibration::{
    CalibrationError, CalibrationProfile, CalibrationReport, CalibrationSession,
    CorrespondencePoint, SessionStatus,
};
use crate::remote::combo::{ComboLibrary, ComboMatcher};
use crate::remote::direction;
use crate::remote::dwell::DwellTracker;
use crate::remote::settings::RemoteControlSettings;
use crate::remote::smoothing::GazeSmoother;
use crate::remote::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Live,
    Calibrating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TickOutcome {
    Processed,
    /// The sample was rejected as an input anomaly; nothing changed.
    Skipped,
    Disabled,
    Calibrating,
}

/// Everything a UI needs after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutput {
    pub outcome: TickOutcome,
    pub commands: Vec<Command>,
    pub dwell: DwellUpdate,
    pub combo: ComboProgress,
    pub direction: Direction,
}

impl TickOutput {
    fn idle(outcome: TickOutcome) -> Self {
        Self {
            outcome,
            commands: Vec::new(),
            dwell: DwellUpdate::idle(),
            combo: ComboProgress::default(),
            direction: Direction::Center,
        }
    }
}

/// Push-style delivery of tick results. All methods default to no-ops.
pub trait RemoteObserver: Send {
    fn on_command(&mut self, _command: &Command) {}
    fn on_dwell(&mut self, _update: &DwellUpdate) {}
    fn on_combo_progress(&mut self, _progress: &ComboProgress) {}
}

/// The single state object mutated by `tick`. Settings and targets are
/// passed in on every call; nothing here reads ambient state.
pub struct RemoteControl {
    profile: CalibrationProfile,
    combos: ComboLibrary,
    dwell: DwellTracker,
    blink: BlinkPatternDetector,
    matcher: ComboMatcher,
    smoother: GazeSmoother,
    direction: Direction,
    last_repeat_ms: Option<i64>,
    last_sample: Option<GazeSample>,
    enabled: bool,
    calibration: Option<CalibrationSession>,
    observers: Vec<Box<dyn RemoteObserver>>,
}

impl Default for RemoteControl {
    fn default() -> Self {
        Self::new(CalibrationProfile::default(), ComboLibrary::builtin())
    }
}

fn is_valid_frame(frame: &SensorFrame) -> bool {
    let raw_ok = |v: f64| v.is_finite() && (RAW_COORD_MIN..=RAW_COORD_MAX).contains(&v);
    raw_ok(frame.raw_x)
        && raw_ok(frame.raw_y)
        && frame.openness.is_finite()
        && (0.0..=1.0).contains(&frame.openness)
}

impl RemoteControl {
    pub fn new(profile: CalibrationProfile, combos: ComboLibrary) -> Self {
        Self {
            profile,
            combos,
            dwell: DwellTracker::new(),
            blink: BlinkPatternDetector::new(),
            matcher: ComboMatcher::new(),
            smoother: GazeSmoother::new(),
            direction: Direction::Center,
            last_repeat_ms: None,
            last_sample: None,
            enabled: true,
            calibration: None,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn RemoteObserver>) {
        self.observers.push(observer);
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Install a profile loaded by an external store.
    pub fn restore_profile(&mut self, profile: CalibrationProfile) {
        self.profile = profile;
        self.smoother.clear();
    }

    pub fn combos(&self) -> &ComboLibrary {
        &self.combos
    }

    /// Mutable access to the library. A live partial match against a removed
    /// or disabled combo is dropped on the next tick.
    pub fn combos_mut(&mut self) -> &mut ComboLibrary {
        &mut self.combos
    }

    pub fn mode(&self) -> Mode {
        if self.calibration.is_some() {
            Mode::Calibrating
        } else {
            Mode::Live
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn dwell(&self, settings: &RemoteControlSettings) -> DwellUpdate {
        self.dwell.snapshot(&settings.clamped())
    }

    pub fn combo_progress(&self, settings: &RemoteControlSettings) -> ComboProgress {
        self.matcher.progress(&self.combos, settings.combo_tie_break)
    }

    /// True when no dwell, blink count, combo match or held direction survives.
    pub fn is_quiescent(&self) -> bool {
        self.dwell.current().is_none()
            && self.blink.is_idle()
            && self.matcher.state().is_empty()
            && self.direction.is_center()
    }

    /// Take a settings change into account without waiting for the next
    /// frame. Turning processing off clears every transient state at once.
    pub fn apply_settings(&mut self, settings: &RemoteControlSettings) {
        self.set_enabled(settings.enabled);
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        if !enabled {
            self.clear_transient();
        }
        self.enabled = enabled;
        tracing::info!(enabled, "Remote control toggled");
    }

    fn clear_transient(&mut self) {
        self.dwell.clear();
        self.blink.cancel();
        self.matcher.reset();
        self.smoother.clear();
        self.direction = Direction::Center;
        self.last_repeat_ms = None;
    }

    /// Process one sensor frame.
    pub fn tick(
        &mut self,
        frame: &SensorFrame,
        targets: &[ScreenTarget],
        settings: &RemoteControlSettings,
    ) -> TickOutput {
        let settings = settings.clamped();

        self.set_enabled(settings.enabled);
        if !self.enabled {
            return TickOutput::idle(TickOutcome::Disabled);
        }

        if !is_valid_frame(frame) {
            tracing::debug!(
                raw_x = frame.raw_x,
                raw_y = frame.raw_y,
                openness = frame.openness,
                "Invalid sample skipped"
            );
            return self.skipped(&settings);
        }
        if let Some(last) = self.last_sample {
            if frame.timestamp_ms < last.timestamp_ms {
                tracing::debug!(
                    timestamp_ms = frame.timestamp_ms,
                    last_ms = last.timestamp_ms,
                    "Out-of-order sample skipped"
                );
                return self.skipped(&settings);
            }
        }

        let sample = frame.gaze();
        self.last_sample = Some(sample);
        if let Some(session) = self.calibration.as_mut() {
            session.record(sample.raw_x, sample.raw_y);
            return TickOutput::idle(TickOutcome::Calibrating);
        }

        let now = sample.timestamp_ms;
        let mut commands = Vec::new();

        let calibrated = self.profile.apply(sample.raw_x, sample.raw_y);
        let point = self
            .smoother
            .push(calibrated, settings.smoothing_window as usize);

        self.step_direction(point, now, &settings, &mut commands);

        if let Some(blink) = self.blink.update(frame.openness, now, &settings) {
            self.on_blink(blink, targets, &settings, &mut commands);
        }

        let dwelled_before = self.dwell.current_target_id().map(str::to_owned);
        let dwell = self.dwell.update(point, targets, now, &settings);
        if dwell.target_id != dwelled_before && !self.blink.is_idle() {
            self.blink.cancel();
        }

        if let Some(cmd) = self
            .matcher
            .flush(now, &self.combos, &settings, !self.blink.is_idle())
        {
            commands.push(cmd);
        }

        self.finish(TickOutcome::Processed, commands, dwell, &settings)
    }

    /// Periodic no-op tick: resolves lapsed blink windows, combo timeouts and
    /// trailing holds when no sample arrives.
    pub fn flush(
        &mut self,
        now_ms: i64,
        targets: &[ScreenTarget],
        settings: &RemoteControlSettings,
    ) -> TickOutput {
        let settings = settings.clamped();
        if !settings.enabled || !self.enabled {
            return TickOutput::idle(TickOutcome::Disabled);
        }
        if self.calibration.is_some() {
            return TickOutput::idle(TickOutcome::Calibrating);
        }
        if self.last_sample.is_some_and(|s| now_ms < s.timestamp_ms) {
            return self.skipped(&settings);
        }

        let mut commands = Vec::new();
        if let Some(blink) = self.blink.flush(now_ms, &settings) {
            self.on_blink(blink, targets, &settings, &mut commands);
        }
        if let Some(cmd) = self
            .matcher
            .flush(now_ms, &self.combos, &settings, !self.blink.is_idle())
        {
            commands.push(cmd);
        }
        let dwell = self.dwell.snapshot(&settings);
        self.finish(TickOutcome::Processed, commands, dwell, &settings)
    }

    fn step_direction(
        &mut self,
        point: (f64, f64),
        now: i64,
        settings: &RemoteControlSettings,
        commands: &mut Vec<Command>,
    ) {
        let next = direction::classify(
            point.0,
            point.1,
            settings.effective_edge_threshold(),
            self.direction,
        );

        if next != self.direction {
            tracing::debug!(from = %self.direction, to = %next, "Gaze direction changed");
            self.direction = next;
            self.last_repeat_ms = Some(now);
            if next.is_center() {
                return;
            }
            commands.push(Command::DirectionNavigated {
                direction: next,
                repeat: false,
            });
            let step = ObservedStep {
                step: InputStep::Direction(next),
                started_at_ms: now,
                at_ms: now,
            };
            commands.extend(self.matcher.observe(step, &self.combos, settings));
            return;
        }

        if !settings.rapid_movement_enabled || next.is_center() {
            return;
        }
        let interval = ((RAPID_REPEAT_MS as f64) * settings.sensitivity_factor()).round() as i64;
        let due = self
            .last_repeat_ms
            .map_or(true, |last| now.saturating_sub(last) >= interval);
        if due {
            self.last_repeat_ms = Some(now);
            commands.push(Command::DirectionNavigated {
                direction: next,
                repeat: true,
            });
        }
    }

    fn on_blink(
        &mut self,
        blink: BlinkEvent,
        targets: &[ScreenTarget],
        settings: &RemoteControlSettings,
        commands: &mut Vec<Command>,
    ) {
        tracing::debug!(count = blink.count, "Blink pattern observed");

        if let Some(cmd) = self.dwell.confirm(&blink, targets) {
            if let Command::TargetActivated { target_id, .. } = &cmd {
                self.nudge_toward(target_id, targets, blink.resolved_at_ms);
            }
            commands.push(cmd);
        }

        let step = ObservedStep {
            step: InputStep::Blink(blink.count),
            started_at_ms: blink.started_at_ms,
            at_ms: blink.resolved_at_ms,
        };
        commands.extend(self.matcher.observe(step, &self.combos, settings));
    }

    /// The user confirmed `target_id`, so its center is where they were
    /// looking; let auto-calibration learn from the residual.
    fn nudge_toward(&mut self, target_id: &str, targets: &[ScreenTarget], now_ms: i64) {
        let (Some(target), Some(last)) = (targets.iter().find(|t| t.id == target_id), self.last_sample)
        else {
            return;
        };
        if self
            .profile
            .auto_adjust((last.raw_x, last.raw_y), target.rect.center(), now_ms)
        {
            tracing::info!(
                target_id,
                adjustments = self.profile.auto_adjustments,
                "Calibration auto-adjusted"
            );
        }
    }

    fn skipped(&self, settings: &RemoteControlSettings) -> TickOutput {
        TickOutput {
            outcome: TickOutcome::Skipped,
            commands: Vec::new(),
            dwell: self.dwell.snapshot(settings),
            combo: self.matcher.progress(&self.combos, settings.combo_tie_break),
            direction: self.direction,
        }
    }

    fn finish(
        &mut self,
        outcome: TickOutcome,
        commands: Vec<Command>,
        dwell: DwellUpdate,
        settings: &RemoteControlSettings,
    ) -> TickOutput {
        let combo = self.matcher.progress(&self.combos, settings.combo_tie_break);
        for observer in &mut self.observers {
            for cmd in &commands {
                observer.on_command(cmd);
            }
            observer.on_dwell(&dwell);
            observer.on_combo_progress(&combo);
        }
        TickOutput {
            outcome,
            commands,
            dwell,
            combo,
            direction: self.direction,
        }
    }

    // ── calibration mode ──

    /// Enter calibration mode. Live processing is suspended and all transient
    /// state is dropped until the session finishes or is cancelled.
    pub fn begin_calibration(
        &mut self,
        session: CalibrationSession,
    ) -> Result<SessionStatus, CalibrationError> {
        if self.calibration.is_some() {
            return Err(CalibrationError::AlreadyCalibrating);
        }
        self.clear_transient();
        let status = session.status();
        self.calibration = Some(session);
        tracing::info!(stages = status.total_stages, "Calibration started");
        Ok(status)
    }

    pub fn calibration_status(&self) -> Option<SessionStatus> {
        self.calibration.as_ref().map(CalibrationSession::status)
    }

    pub fn record_calibration_sample(
        &mut self,
        raw_x: f64,
        raw_y: f64,
    ) -> Result<SessionStatus, CalibrationError> {
        let session = self
            .calibration
            .as_mut()
            .ok_or(CalibrationError::NotCalibrating)?;
        if !session.record(raw_x, raw_y) {
            tracing::debug!(raw_x, raw_y, "Calibration sample ignored");
        }
        Ok(session.status())
    }

    pub fn advance_calibration(&mut self) -> Result<SessionStatus, CalibrationError> {
        let session = self
            .calibration
            .as_mut()
            .ok_or(CalibrationError::NotCalibrating)?;
        session.advance();
        Ok(session.status())
    }

    /// Fit the profile from the session. A refused fit keeps the session open
    /// so more samples can be collected, and leaves the profile untouched.
    pub fn finish_calibration(&mut self, now_ms: i64) -> Result<CalibrationReport, CalibrationError> {
        let session = self
            .calibration
            .as_ref()
            .ok_or(CalibrationError::NotCalibrating)?;
        match self.profile.calibrate(&session.points(), now_ms) {
            Ok(report) => {
                self.calibration = None;
                self.smoother.clear();
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Calibration refused");
                Err(e)
            }
        }
    }

    pub fn cancel_calibration(&mut self) -> Result<(), CalibrationError> {
        self.calibration
            .take()
            .ok_or(CalibrationError::NotCalibrating)?;
        tracing::info!("Calibration cancelled");
        Ok(())
    }

    /// Calibrate directly from externally supplied correspondences.
    pub fn calibrate(
        &mut self,
        points: &[CorrespondencePoint],
        now_ms: i64,
    ) -> Result<CalibrationReport, CalibrationError> {
        let report = self.profile.calibrate(points, now_ms).map_err(|e| {
            tracing::warn!(error = %e, "Calibration refused");
            e
        })?;
        self.smoother.clear();
        Ok(report)
    }

    pub fn reset_calibration(&mut self) {
        self.profile.reset();
        self.smoother.clear();
    }

    pub fn set_auto_calibration(&mut self, enabled: bool) {
        self.profile.set_auto_calibration(enabled);
        tracing::info!(enabled, "Auto-calibration toggled");
    }
}
