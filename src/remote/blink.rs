//! Multi-blink pattern detection.
//!
//! Edge-triggered state machine over the eyelid openness scalar:
//! Idle → Closing → Counting (eye open, window running) → back to Closing on
//! the next closure, or resolved into a `BlinkEvent` once the window lapses.
//! A prolonged closure is one cycle and counts once.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BLINK_COUNT, REOPEN_HYSTERESIS};
use crate::remote::settings::RemoteControlSettings;
use crate::remote::types::BlinkEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum BlinkPhase {
    #[default]
    Idle,
    /// Eye is closed; `count_before` cycles were already completed.
    #[serde(rename_all = "camelCase")]
    Closing {
        closed_at_ms: i64,
        count_before: u8,
        pattern_started_at_ms: i64,
    },
    /// Eye reopened after `count` cycles; waiting for another or the timeout.
    #[serde(rename_all = "camelCase")]
    Counting {
        count: u8,
        reopened_at_ms: i64,
        pattern_started_at_ms: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Thresholds {
    closed_below: f64,
    open_at: f64,
    timeout_ms: i64,
    min_gap_ms: i64,
}

impl Thresholds {
    fn from_settings(settings: &RemoteControlSettings) -> Self {
        Self {
            closed_below: settings.closure_threshold,
            open_at: settings.closure_threshold + REOPEN_HYSTERESIS,
            timeout_ms: settings.blink_pattern_timeout_ms,
            min_gap_ms: settings.min_blink_gap_ms,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlinkPatternDetector {
    phase: BlinkPhase,
}

impl BlinkPatternDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BlinkPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == BlinkPhase::Idle
    }

    /// Completed cycles not yet resolved into an event.
    pub fn pending_count(&self) -> u8 {
        match self.phase {
            BlinkPhase::Idle => 0,
            BlinkPhase::Closing { count_before, .. } => count_before,
            BlinkPhase::Counting { count, .. } => count,
        }
    }

    /// Feed one openness sample. Returns a resolved event when a counting
    /// window lapsed before this sample.
    pub fn update(
        &mut self,
        openness: f64,
        now_ms: i64,
        settings: &RemoteControlSettings,
    ) -> Option<BlinkEvent> {
        let t = Thresholds::from_settings(settings);
        let resolved = self.expire(now_ms, t.timeout_ms);

        let closed = openness < t.closed_below;
        let reopened = openness >= t.open_at;

        match self.phase {
            BlinkPhase::Idle => {
                if closed {
                    self.phase = BlinkPhase::Closing {
                        closed_at_ms: now_ms,
                        count_before: 0,
                        pattern_started_at_ms: now_ms,
                    };
                }
            }
            BlinkPhase::Closing {
                closed_at_ms,
                count_before,
                pattern_started_at_ms,
            } => {
                if reopened {
                    let count = count_before + 1;
                    if count > MAX_BLINK_COUNT {
                        tracing::debug!(count, "Blink pattern overflow, resetting");
                        self.phase = BlinkPhase::Idle;
                    } else {
                        tracing::debug!(
                            count,
                            closed_ms = now_ms.saturating_sub(closed_at_ms),
                            "Blink cycle completed"
                        );
                        self.phase = BlinkPhase::Counting {
                            count,
                            reopened_at_ms: now_ms,
                            pattern_started_at_ms,
                        };
                    }
                }
            }
            BlinkPhase::Counting {
                count,
                reopened_at_ms,
                pattern_started_at_ms,
            } => {
                if closed {
                    let gap_ms = now_ms.saturating_sub(reopened_at_ms);
                    if gap_ms < t.min_gap_ms {
                        // bounce of the blink that just ended
                        tracing::trace!(gap_ms, "Blink debounced");
                    } else {
                        self.phase = BlinkPhase::Closing {
                            closed_at_ms: now_ms,
                            count_before: count,
                            pattern_started_at_ms,
                        };
                    }
                }
            }
        }

        resolved
    }

    /// Resolve a lapsed window without a new openness sample.
    pub fn flush(&mut self, now_ms: i64, settings: &RemoteControlSettings) -> Option<BlinkEvent> {
        self.expire(now_ms, settings.blink_pattern_timeout_ms)
    }

    /// Drop any pending count without emitting an event.
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            tracing::debug!(pending = self.pending_count(), "Blink pattern cancelled");
        }
        self.phase = BlinkPhase::Idle;
    }

    fn expire(&mut self, now_ms: i64, timeout_ms: i64) -> Option<BlinkEvent> {
        if let BlinkPhase::Counting {
            count,
            reopened_at_ms,
            pattern_started_at_ms,
        } = self.phase
        {
            if now_ms.saturating_sub(reopened_at_ms) > timeout_ms {
                self.phase = BlinkPhase::Idle;
                tracing::debug!(count, "Blink pattern resolved");
                return Some(BlinkEvent {
                    count,
                    started_at_ms: pattern_started_at_ms,
                    resolved_at_ms: now_ms,
                });
            }
        }
        None
    }
}
