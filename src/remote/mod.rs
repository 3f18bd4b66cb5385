//! Hands-free remote control core: turns gaze and eyelid frames into
//! discrete UI commands. Everything here is synchronous and deterministic
//! in the frame timestamps; the HTTP layer drives it.

pub mod blink;
pub mod calibration;
pub mod combo;
pub mod direction;
pub mod dwell;
pub mod orchestrator;
pub mod settings;
pub mod smoothing;
pub mod types;
