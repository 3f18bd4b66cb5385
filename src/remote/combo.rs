//! Gesture combos: ordered sequences of directions, blink patterns and holds
//! that map to a single action.
//!
//! The library owns the registered definitions, compiled into input steps
//! with the minimum gap each one requires. The matcher keeps the steps
//! observed so far and resolves them against the library on every step and
//! every flush.

use thiserror::Error;

use crate::constants::{MAX_BLINK_COUNT, MAX_SEQUENCE_MS};
use crate::remote::settings::{ComboTieBreak, RemoteControlSettings};
use crate::remote::types::{
    ComboDefinition, ComboMatchState, ComboProgress, ComboSource, ComboStep, Command, Direction,
    InputStep, ObservedStep,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboError {
    #[error("combo has no steps")]
    Empty,
    #[error("combo id must not be empty")]
    EmptyId,
    #[error("combo action must not be empty")]
    EmptyAction,
    #[error("combo cannot start with a hold")]
    LeadingHold,
    #[error("blink count {0} is outside 1..=3")]
    InvalidBlinkCount(u8),
    #[error("hold duration must be positive")]
    ZeroHold,
    #[error("center is not a combo direction")]
    CenterStep,
    #[error("combo not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlannedStep {
    step: InputStep,
    /// Accumulated `Hold` time required between the previous step and this one.
    min_gap_ms: i64,
}

#[derive(Debug, Clone)]
struct CompiledCombo {
    def: ComboDefinition,
    plan: Vec<PlannedStep>,
    trailing_hold_ms: i64,
    seq: u64,
}

impl CompiledCombo {
    fn compile(def: ComboDefinition, seq: u64) -> Result<Self, ComboError> {
        if def.id.trim().is_empty() {
            return Err(ComboError::EmptyId);
        }
        if def.action.trim().is_empty() {
            return Err(ComboError::EmptyAction);
        }
        if def.steps.is_empty() {
            return Err(ComboError::Empty);
        }

        let mut plan = Vec::with_capacity(def.steps.len());
        let mut pending_hold: i64 = 0;
        for step in &def.steps {
            let input = match *step {
                ComboStep::Hold(0) => return Err(ComboError::ZeroHold),
                ComboStep::Hold(ms) => {
                    if plan.is_empty() {
                        return Err(ComboError::LeadingHold);
                    }
                    pending_hold = pending_hold.saturating_add(i64::try_from(ms).unwrap_or(i64::MAX));
                    continue;
                }
                ComboStep::Direction(Direction::Center) => return Err(ComboError::CenterStep),
                ComboStep::Direction(d) => InputStep::Direction(d),
                ComboStep::Blink(n) if n == 0 || n > MAX_BLINK_COUNT => {
                    return Err(ComboError::InvalidBlinkCount(n))
                }
                ComboStep::Blink(n) => InputStep::Blink(n),
            };
            plan.push(PlannedStep {
                step: input,
                min_gap_ms: pending_hold,
            });
            pending_hold = 0;
        }

        Ok(Self {
            def,
            plan,
            trailing_hold_ms: pending_hold,
            seq,
        })
    }

    fn accepts(&self, observed: &[ObservedStep]) -> bool {
        if !self.def.enabled || observed.len() > self.plan.len() {
            return false;
        }
        observed.iter().enumerate().all(|(i, obs)| {
            let planned = &self.plan[i];
            if planned.step != obs.step {
                return false;
            }
            match i.checked_sub(1).map(|p| &observed[p]) {
                Some(prev) => obs.started_at_ms.saturating_sub(prev.at_ms) >= planned.min_gap_ms,
                None => true,
            }
        })
    }

    fn command(&self) -> Command {
        Command::ComboMatched {
            combo_id: self.def.id.clone(),
            action: self.def.action.clone(),
        }
    }
}

/// Registered combo definitions in registration order.
#[derive(Debug, Clone, Default)]
pub struct ComboLibrary {
    entries: Vec<CompiledCombo>,
    next_seq: u64,
}

impl ComboLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock combos every session starts with.
    pub fn builtin() -> Self {
        use ComboStep::{Blink, Direction as Dir, Hold};
        use Direction::{Down, Left, Right, Up};

        let mut library = Self::new();
        let defaults = [
            ("go-back", "Go back", vec![Dir(Left), Blink(2)], "navigate_back"),
            ("go-forward", "Go forward", vec![Dir(Right), Blink(2)], "navigate_forward"),
            ("open-menu", "Open menu", vec![Dir(Down), Blink(2)], "open_menu"),
            ("go-home", "Go home", vec![Dir(Up), Blink(3)], "go_home"),
            ("scroll-top", "Scroll to top", vec![Dir(Up), Dir(Up), Hold(500)], "scroll_to_top"),
        ];
        for (id, name, steps, action) in defaults {
            let mut def = ComboDefinition::new(id, steps, action);
            def.name = name.to_string();
            if let Err(e) = library.register(def) {
                tracing::error!(combo_id = id, error = %e, "Built-in combo rejected");
            }
        }
        library
    }

    /// Add a combo, or fully replace the one with the same id. The new
    /// definition counts as the most recently registered.
    pub fn register(&mut self, def: ComboDefinition) -> Result<(), ComboError> {
        let compiled = CompiledCombo::compile(def, self.next_seq)?;
        self.next_seq += 1;

        let replaced = self.take(&compiled.def.id).is_some();
        tracing::info!(
            combo_id = %compiled.def.id,
            steps = compiled.def.steps.len(),
            replaced,
            "Combo registered"
        );
        self.entries.push(compiled);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<ComboDefinition, ComboError> {
        let removed = self
            .take(id)
            .ok_or_else(|| ComboError::NotFound(id.to_string()))?;
        tracing::info!(combo_id = %id, "Combo removed");
        Ok(removed.def)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), ComboError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.def.id == id)
            .ok_or_else(|| ComboError::NotFound(id.to_string()))?;
        entry.def.enabled = enabled;
        tracing::info!(combo_id = %id, enabled, "Combo toggled");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ComboDefinition> {
        self.entries.iter().find(|e| e.def.id == id).map(|e| &e.def)
    }

    pub fn list(&self) -> Vec<ComboDefinition> {
        self.entries.iter().map(|e| e.def.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self, id: &str) -> Option<CompiledCombo> {
        let idx = self.entries.iter().position(|e| e.def.id == id)?;
        Some(self.entries.remove(idx))
    }

    fn candidates(&self, observed: &[ObservedStep]) -> Candidates<'_> {
        Candidates {
            entries: self.entries.iter().filter(|e| e.accepts(observed)).collect(),
            observed_len: observed.len(),
        }
    }
}

struct Candidates<'a> {
    entries: Vec<&'a CompiledCombo>,
    observed_len: usize,
}

impl<'a> Candidates<'a> {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidates whose input steps are all observed.
    fn complete(&self) -> impl Iterator<Item = &'a CompiledCombo> + '_ {
        self.entries
            .iter()
            .copied()
            .filter(move |e| e.plan.len() == self.observed_len)
    }

    /// Candidates that still expect more input steps.
    fn longer(&self) -> impl Iterator<Item = &'a CompiledCombo> + '_ {
        self.entries
            .iter()
            .copied()
            .filter(move |e| e.plan.len() > self.observed_len)
    }

    /// Complete candidates whose trailing hold has elapsed `elapsed_ms`.
    fn ready(&self, elapsed_ms: i64) -> Vec<&'a CompiledCombo> {
        self.complete()
            .filter(|e| elapsed_ms >= e.trailing_hold_ms)
            .collect()
    }

    fn next_steps(&self) -> impl Iterator<Item = &'a PlannedStep> + '_ {
        self.longer().map(move |e| &e.plan[self.observed_len])
    }
}

/// Pick one combo among `entries`: the longest definitions first, then the
/// tie-break policy.
fn choose<'a>(entries: &[&'a CompiledCombo], policy: ComboTieBreak) -> Option<&'a CompiledCombo> {
    let longest = entries.iter().map(|e| e.def.steps.len()).max()?;
    let pool = entries
        .iter()
        .copied()
        .filter(move |e| e.def.steps.len() == longest);
    match policy {
        ComboTieBreak::LatestRegistered => pool.max_by_key(|e| e.seq),
        ComboTieBreak::EarliestRegistered => pool.min_by_key(|e| e.seq),
        ComboTieBreak::PreferCustom => {
            pool.max_by_key(|e| (e.def.source == ComboSource::Custom, e.seq))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComboMatcher {
    state: ComboMatchState,
}

impl ComboMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ComboMatchState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = ComboMatchState::default();
    }

    /// Feed one observed input step. Usually yields at most one command; two
    /// when a deferred match lapses right before a new one-step combo fires.
    pub fn observe(
        &mut self,
        observed: ObservedStep,
        library: &ComboLibrary,
        settings: &RemoteControlSettings,
    ) -> Vec<Command> {
        let mut fired = Vec::new();
        if let Some(cmd) = self.expire(observed.started_at_ms, library, settings, false) {
            fired.push(cmd);
        }

        // a deferred full match survives the next step going astray
        let deferred = self.state.observed.last().and_then(|last| {
            let candidates = library.candidates(&self.state.observed);
            let ready = candidates.ready(observed.started_at_ms.saturating_sub(last.at_ms));
            choose(&ready, settings.combo_tie_break)
        });

        self.state.observed.push(observed);
        self.state.started_at_ms.get_or_insert(observed.started_at_ms);

        let candidates = library.candidates(&self.state.observed);
        if candidates.is_empty() {
            match deferred {
                Some(winner) => fired.push(self.resolve(winner)),
                None => {
                    tracing::debug!(step = ?observed.step, "Combo sequence mismatch, reset");
                    self.reset();
                }
            }
            return fired;
        }

        let immediate: Vec<_> = candidates
            .complete()
            .filter(|e| e.trailing_hold_ms == 0)
            .collect();
        let waiting = candidates.longer().next().is_some()
            || candidates.complete().any(|e| e.trailing_hold_ms > 0);
        if !waiting {
            if let Some(winner) = choose(&immediate, settings.combo_tie_break) {
                fired.push(self.resolve(winner));
                return fired;
            }
        }

        self.state.match_progress = Self::progress_of(&candidates);
        fired
    }

    /// Resolve timeouts, deferred matches and trailing holds at `now_ms`.
    /// `input_pending` suspends the gap timeout while a blink pattern is still
    /// being counted upstream.
    pub fn flush(
        &mut self,
        now_ms: i64,
        library: &ComboLibrary,
        settings: &RemoteControlSettings,
        input_pending: bool,
    ) -> Option<Command> {
        self.expire(now_ms, library, settings, input_pending)
    }

    pub fn progress(&self, library: &ComboLibrary, policy: ComboTieBreak) -> ComboProgress {
        if self.state.is_empty() {
            return ComboProgress::default();
        }
        let candidates = library.candidates(&self.state.observed);
        ComboProgress {
            observed_steps: self.state.observed.iter().map(|o| o.step).collect(),
            match_progress: Self::progress_of(&candidates),
            candidate_combo: choose(&candidates.entries, policy).map(|e| e.def.id.clone()),
        }
    }

    fn progress_of(candidates: &Candidates<'_>) -> f64 {
        let longest = candidates
            .entries
            .iter()
            .map(|e| e.plan.len())
            .max()
            .unwrap_or(0);
        if longest == 0 {
            0.0
        } else {
            candidates.observed_len as f64 / longest as f64
        }
    }

    /// Allowed silence after the last observed step before the sequence
    /// times out.
    fn window_ms(candidates: &Candidates<'_>, last: &ObservedStep, settings: &RemoteControlSettings) -> i64 {
        let blink_adjacent =
            last.step.is_blink() || candidates.next_steps().any(|p| p.step.is_blink());
        let base = if blink_adjacent {
            settings.blink_pattern_timeout_ms
        } else {
            settings.direction_gap_ms
        };
        let hold = candidates
            .next_steps()
            .map(|p| p.min_gap_ms)
            .chain(candidates.complete().map(|e| e.trailing_hold_ms))
            .max()
            .unwrap_or(0);
        base.saturating_add(hold)
    }

    fn expire(
        &mut self,
        now_ms: i64,
        library: &ComboLibrary,
        settings: &RemoteControlSettings,
        input_pending: bool,
    ) -> Option<Command> {
        let last = *self.state.observed.last()?;
        let candidates = library.candidates(&self.state.observed);
        if candidates.is_empty() {
            // definitions changed underneath the sequence
            self.reset();
            return None;
        }

        let elapsed = now_ms.saturating_sub(last.at_ms);
        let started = self.state.started_at_ms.unwrap_or(last.started_at_ms);
        let window = Self::window_ms(&candidates, &last, settings);
        let timed_out = (!input_pending && elapsed > window) || now_ms.saturating_sub(started) > MAX_SEQUENCE_MS;

        let ready = candidates.ready(elapsed);
        let waiting = candidates.longer().next().is_some()
            || candidates.complete().any(|e| elapsed < e.trailing_hold_ms);
        if timed_out || !waiting {
            if let Some(winner) = choose(&ready, settings.combo_tie_break) {
                return Some(self.resolve(winner));
            }
        }

        if timed_out {
            tracing::debug!(
                steps = self.state.observed.len(),
                elapsed_ms = elapsed,
                "Combo sequence timed out"
            );
            self.reset();
        }
        None
    }

    fn resolve(&mut self, winner: &CompiledCombo) -> Command {
        tracing::info!(
            combo_id = %winner.def.id,
            action = %winner.def.action,
            steps = self.state.observed.len(),
            "Combo matched"
        );
        self.reset();
        winner.command()
    }
}
