//! Edge-of-screen direction classification with hysteresis.

use crate::constants::{AXIS_TIE_EPSILON, DIRECTION_RELEASE_RATIO};
use crate::remote::types::Direction;

/// Signed deviation from screen center, scaled so the screen edge is ±1.
fn deviation(cal_x: f64, cal_y: f64) -> (f64, f64) {
    ((cal_x - 0.5) * 2.0, (cal_y - 0.5) * 2.0)
}

/// Deviation along the axis and sign that `direction` points to.
fn deviation_toward(direction: Direction, dx: f64, dy: f64) -> f64 {
    match direction {
        Direction::Left => -dx,
        Direction::Right => dx,
        Direction::Up => -dy,
        Direction::Down => dy,
        Direction::Center => 0.0,
    }
}

/// Direction suggested by the dominant axis alone, or `None` on an axis tie.
fn dominant(dx: f64, dy: f64) -> Option<(Direction, f64)> {
    let (ax, ay) = (dx.abs(), dy.abs());
    if (ax - ay).abs() <= AXIS_TIE_EPSILON {
        return None;
    }
    if ax > ay {
        let dir = if dx < 0.0 { Direction::Left } else { Direction::Right };
        Some((dir, ax))
    } else {
        // screen y grows downward
        let dir = if dy < 0.0 { Direction::Up } else { Direction::Down };
        Some((dir, ay))
    }
}

/// Classify a calibrated gaze point. Pure function of the sample and the
/// previously reported direction.
pub fn classify(cal_x: f64, cal_y: f64, edge_threshold: f64, previous: Direction) -> Direction {
    let (dx, dy) = deviation(cal_x, cal_y);

    let fresh = match dominant(dx, dy) {
        Some((dir, magnitude)) if magnitude > edge_threshold => Some(dir),
        Some(_) => None,
        None if dx.abs() > edge_threshold => return previous,
        None => None,
    };

    if previous.is_center() {
        return fresh.unwrap_or(Direction::Center);
    }

    match fresh {
        Some(dir) => dir,
        None => {
            if deviation_toward(previous, dx, dy) >= edge_threshold * DIRECTION_RELEASE_RATIO {
                previous
            } else {
                Direction::Center
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f64 = 0.6;

    #[test]
    fn center_region_is_center() {
        assert_eq!(classify(0.5, 0.5, T, Direction::Center), Direction::Center);
        assert_eq!(classify(0.7, 0.4, T, Direction::Center), Direction::Center);
    }

    #[test]
    fn dominant_axis_decides() {
        assert_eq!(classify(0.95, 0.6, T, Direction::Center), Direction::Right);
        assert_eq!(classify(0.02, 0.45, T, Direction::Center), Direction::Left);
        assert_eq!(classify(0.45, 0.02, T, Direction::Center), Direction::Up);
        assert_eq!(classify(0.55, 0.97, T, Direction::Center), Direction::Down);
    }

    #[test]
    fn tie_keeps_previous() {
        assert_eq!(classify(0.95, 0.95, T, Direction::Right), Direction::Right);
        assert_eq!(classify(0.95, 0.95, T, Direction::Down), Direction::Down);
        assert_eq!(classify(0.95, 0.95, T, Direction::Center), Direction::Center);
    }

    #[test]
    fn hysteresis_holds_until_release_band() {
        // deviation 0.5 is below 0.6 but above 0.42
        assert_eq!(classify(0.75, 0.5, T, Direction::Right), Direction::Right);
        assert_eq!(classify(0.75, 0.5, T, Direction::Center), Direction::Center);
        // deviation 0.4 falls under the release band
        assert_eq!(classify(0.70, 0.5, T, Direction::Right), Direction::Center);
    }

    #[test]
    fn strong_new_direction_overrides_hysteresis() {
        assert_eq!(classify(0.5, 0.02, T, Direction::Right), Direction::Up);
    }

    #[test]
    fn jitter_around_threshold_does_not_toggle() {
        let samples = [0.82, 0.79, 0.81, 0.78, 0.83, 0.79];
        let mut prev = Direction::Center;
        let mut changes = 0;
        for x in samples {
            let next = classify(x, 0.5, T, prev);
            if next != prev {
                changes += 1;
            }
            prev = next;
        }
        assert_eq!(changes, 1);
        assert_eq!(prev, Direction::Right);
    }
}
