use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GazeSample {
    pub raw_x: f64,
    pub raw_y: f64,
    pub timestamp_ms: i64,
}

/// One camera frame as delivered by the face-tracking collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorFrame {
    pub raw_x: f64,
    pub raw_y: f64,
    /// Eyelid openness, 0 = fully closed, 1 = fully open.
    pub openness: f64,
    pub timestamp_ms: i64,
}

impl SensorFrame {
    pub fn gaze(&self) -> GazeSample {
        GazeSample {
            raw_x: self.raw_x,
            raw_y: self.raw_y,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    #[default]
    Center,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
            Self::Center => "center",
        }
    }

    pub fn is_center(&self) -> bool {
        matches!(self, Self::Center)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved multi-blink pattern. `count` is always within 1..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlinkEvent {
    pub count: u8,
    /// Onset of the first closure of the pattern.
    pub started_at_ms: i64,
    pub resolved_at_ms: i64,
}

/// Axis-aligned rectangle in screen-normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Left/top edges are inclusive, right/bottom exclusive, so adjacent
    /// targets never both claim a point on their shared edge.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x < self.left + self.width && y >= self.top && y < self.top + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenTarget {
    pub id: String,
    pub rect: Rect,
    /// Falls back to the effective gaze hold time when absent.
    #[serde(default)]
    pub required_dwell_ms: Option<u64>,
    pub action: String,
    /// Per blink-count overrides of `action` (1, 2 or 3 blinks).
    #[serde(default)]
    pub blink_actions: BTreeMap<u8, String>,
}

impl ScreenTarget {
    pub fn new(id: impl Into<String>, rect: Rect, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rect,
            required_dwell_ms: None,
            action: action.into(),
            blink_actions: BTreeMap::new(),
        }
    }

    pub fn with_dwell_ms(mut self, ms: u64) -> Self {
        self.required_dwell_ms = Some(ms);
        self
    }

    pub fn with_blink_action(mut self, count: u8, action: impl Into<String>) -> Self {
        self.blink_actions.insert(count, action.into());
        self
    }

    pub fn action_for(&self, blink_count: u8) -> &str {
        self.blink_actions
            .get(&blink_count)
            .map(String::as_str)
            .unwrap_or(&self.action)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DwellState {
    pub target_id: String,
    pub started_at_ms: i64,
    pub progress: f64,
    pub is_ghost: bool,
}

/// Per-tick dwell snapshot for progress-ring rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DwellUpdate {
    pub target_id: Option<String>,
    pub progress: f64,
    pub is_ghost: bool,
    pub opacity: f64,
}

impl DwellUpdate {
    pub fn idle() -> Self {
        Self {
            target_id: None,
            progress: 0.0,
            is_ghost: false,
            opacity: 0.0,
        }
    }
}

impl Default for DwellUpdate {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ComboStep {
    Direction(Direction),
    Blink(u8),
    /// Minimum time in ms the previous step must be held before the next.
    Hold(u64),
}

impl fmt::Display for ComboStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direction(d) => write!(f, "{d}"),
            Self::Blink(n) => write!(f, "blink×{n}"),
            Self::Hold(ms) => write!(f, "hold {ms}ms"),
        }
    }
}

/// An observed input step: only directions and blinks are ever observed,
/// holds are satisfied by elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum InputStep {
    Direction(Direction),
    Blink(u8),
}

impl InputStep {
    pub fn is_blink(&self) -> bool {
        matches!(self, Self::Blink(_))
    }

    pub fn as_combo_step(&self) -> ComboStep {
        match *self {
            Self::Direction(d) => ComboStep::Direction(d),
            Self::Blink(n) => ComboStep::Blink(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedStep {
    pub step: InputStep,
    /// When the input began (the first closure for a blink pattern).
    pub started_at_ms: i64,
    /// When the input was resolved.
    pub at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComboSource {
    #[default]
    BuiltIn,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub steps: Vec<ComboStep>,
    pub action: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub source: ComboSource,
}

fn default_true() -> bool {
    true
}

impl ComboDefinition {
    pub fn new(id: impl Into<String>, steps: Vec<ComboStep>, action: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            steps,
            action: action.into(),
            enabled: true,
            source: ComboSource::BuiltIn,
        }
    }

    pub fn custom(mut self) -> Self {
        self.source = ComboSource::Custom;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboMatchState {
    pub observed: Vec<ObservedStep>,
    pub started_at_ms: Option<i64>,
    pub match_progress: f64,
}

impl ComboMatchState {
    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboProgress {
    pub observed_steps: Vec<InputStep>,
    pub match_progress: f64,
    pub candidate_combo: Option<String>,
}

/// Discrete command handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    TargetActivated {
        target_id: String,
        action: String,
        blink_count: u8,
    },
    #[serde(rename_all = "camelCase")]
    ComboMatched { combo_id: String, action: String },
    #[serde(rename_all = "camelCase")]
    DirectionNavigated { direction: Direction, repeat: bool },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TargetActivated { .. } => "targetActivated",
            Self::ComboMatched { .. } => "comboMatched",
            Self::DirectionNavigated { .. } => "directionNavigated",
        }
    }
}
