//! Dwell activation for on-screen targets ("ghost buttons").
//!
//! Gaze resting on a target accumulates progress; at full progress the target
//! is armed (ghost) and waits for a confirming blink. Only one target is ever
//! dwelled at a time.

use crate::constants::MAX_FRAME_CREDIT_MS;
use crate::remote::settings::RemoteControlSettings;
use crate::remote::types::{BlinkEvent, Command, DwellState, DwellUpdate, ScreenTarget};

#[derive(Debug, Clone, Default)]
pub struct DwellTracker {
    state: Option<DwellState>,
    last_tick_ms: Option<i64>,
}

impl DwellTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DwellState> {
        self.state.as_ref()
    }

    pub fn current_target_id(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.target_id.as_str())
    }

    /// Forget all dwell state, including the previous tick time.
    pub fn clear(&mut self) {
        self.state = None;
        self.last_tick_ms = None;
    }

    fn hit<'a>(&self, point: (f64, f64), targets: &'a [ScreenTarget]) -> Option<&'a ScreenTarget> {
        // stay on the current target while it still contains the point, so
        // overlapping rects do not steal an in-progress dwell
        if let Some(state) = &self.state {
            if let Some(current) = targets
                .iter()
                .find(|t| t.id == state.target_id && t.rect.contains(point.0, point.1))
            {
                return Some(current);
            }
        }
        targets.iter().find(|t| t.rect.contains(point.0, point.1))
    }

    /// Advance dwell for the calibrated gaze point against the targets
    /// currently on screen.
    pub fn update(
        &mut self,
        point: (f64, f64),
        targets: &[ScreenTarget],
        now_ms: i64,
        settings: &RemoteControlSettings,
    ) -> DwellUpdate {
        let previous_tick = self.last_tick_ms.replace(now_ms);
        let hit = self.hit(point, targets);

        let Some(target) = hit else {
            if let Some(old) = self.state.take() {
                if targets.iter().any(|t| t.id == old.target_id) {
                    tracing::debug!(target_id = %old.target_id, "Gaze left target, dwell cleared");
                } else {
                    tracing::debug!(target_id = %old.target_id, "Dwelled target vanished, dwell cleared");
                }
            }
            return self.snapshot(settings);
        };

        let same_target = self
            .state
            .as_ref()
            .is_some_and(|s| s.target_id == target.id);
        if !same_target {
            // credit the frame interval in which the gaze crossed into the rect
            let started_at_ms = match previous_tick {
                Some(prev) if prev <= now_ms => prev.max(now_ms.saturating_sub(MAX_FRAME_CREDIT_MS)),
                _ => now_ms,
            };
            if let Some(old) = &self.state {
                tracing::debug!(from = %old.target_id, to = %target.id, "Dwell moved to new target");
            }
            self.state = Some(DwellState {
                target_id: target.id.clone(),
                started_at_ms,
                progress: 0.0,
                is_ghost: false,
            });
        }

        let base = target
            .required_dwell_ms
            .unwrap_or_else(|| settings.default_hold_ms());
        let required = settings.effective_hold_ms(base) as f64;

        if let Some(state) = self.state.as_mut() {
            let progress = (now_ms.saturating_sub(state.started_at_ms) as f64 / required).clamp(0.0, 1.0);
            state.progress = state.progress.max(progress);
            if state.progress >= 1.0 && !state.is_ghost {
                state.is_ghost = true;
                tracing::info!(target_id = %state.target_id, "Target armed, awaiting blink");
            }
        }

        self.snapshot(settings)
    }

    /// Offer a resolved blink to the armed target. Fires and clears only when
    /// the dwelled target is in ghost state and still registered.
    pub fn confirm(&mut self, blink: &BlinkEvent, targets: &[ScreenTarget]) -> Option<Command> {
        let state = self.state.as_ref()?;
        if !state.is_ghost {
            return None;
        }

        let Some(target) = targets.iter().find(|t| t.id == state.target_id) else {
            tracing::debug!(target_id = %state.target_id, "Armed target vanished before blink");
            self.state = None;
            return None;
        };

        let command = Command::TargetActivated {
            target_id: target.id.clone(),
            action: target.action_for(blink.count).to_string(),
            blink_count: blink.count,
        };
        tracing::info!(target_id = %target.id, blink_count = blink.count, "Target activated");
        self.state = None;
        Some(command)
    }

    pub fn snapshot(&self, settings: &RemoteControlSettings) -> DwellUpdate {
        match &self.state {
            Some(s) => DwellUpdate {
                target_id: Some(s.target_id.clone()),
                progress: s.progress,
                is_ghost: s.is_ghost,
                opacity: if s.is_ghost {
                    settings.ghost_opacity
                } else {
                    settings.ghost_opacity * s.progress
                },
            },
            None => DwellUpdate::idle(),
        }
    }
}
