//! Trend classification between consecutive forecast readings.

use crate::{Direction, Trend};

/// Classify the change from `previous_level` to `current_level`.
///
/// A positive delta is rising and a negative delta is falling. A flat step
/// keeps `prior`, the direction established by earlier readings, so a
/// plateau never flips or clears the trend. With no prior direction a flat
/// step has no trend yet and `None` is returned.
///
/// # Example
/// ```
/// use tide_station_lib::trend::classify;
/// use tide_station_lib::Direction;
///
/// let trend = classify(1.10, 1.20, None).unwrap();
/// assert_eq!(trend.direction, Direction::Rising);
///
/// let flat = classify(1.20, 1.20, Some(Direction::Rising)).unwrap();
/// assert_eq!(flat.direction, Direction::Rising);
/// assert_eq!(flat.delta, 0.0);
/// ```
pub fn classify(previous_level: f64, current_level: f64, prior: Option<Direction>) -> Option<Trend> {
    let delta = current_level - previous_level;
    let direction = if delta > 0.0 {
        Direction::Rising
    } else if delta < 0.0 {
        Direction::Falling
    } else {
        prior?
    };
    Some(Trend { direction, delta })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_and_falling() {
        let up = classify(1.00, 1.10, None).unwrap();
        assert_eq!(up.direction, Direction::Rising);
        assert!(up.delta > 0.0);

        let down = classify(1.20, 1.15, Some(Direction::Rising)).unwrap();
        assert_eq!(down.direction, Direction::Falling);
        assert!(down.delta < 0.0);
    }

    #[test]
    fn flat_step_holds_prior_direction() {
        assert_eq!(
            classify(0.5, 0.5, Some(Direction::Falling)).map(|t| t.direction),
            Some(Direction::Falling)
        );
        assert_eq!(
            classify(0.5, 0.5, Some(Direction::Rising)).map(|t| t.direction),
            Some(Direction::Rising)
        );
    }

    #[test]
    fn flat_step_without_prior_has_no_trend() {
        assert!(classify(-0.3, -0.3, None).is_none());
    }

    #[test]
    fn negative_levels() {
        let trend = classify(-0.40, -0.25, Some(Direction::Falling)).unwrap();
        assert_eq!(trend.direction, Direction::Rising);
    }
}
