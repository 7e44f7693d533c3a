// Angle conversion and baseline tracking
//
// Raw accelerometer axes are roughly [-1, 1] under gravity. Axes map
// linearly to degrees (raw * 90, clamped) rather than through a true
// inclination formula; recorded angles must stay comparable with data
// captured under that mapping, so keep it exact.

/// Maximum angle magnitude in degrees after clamping
pub const ANGLE_LIMIT_DEG: f64 = 90.0;

/// A filtered two-axis tilt reading in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TiltAngles {
    pub x: f64,
    pub y: f64,
}

/// Round to one decimal place, the precision angles are displayed and
/// stored at.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Convert one raw accelerometer axis to a clamped, rounded angle.
///
/// Linear small-angle approximation: `angle = clamp(raw * 90, -90, 90)`,
/// rounded to one decimal. Monotonic in `raw` within the unclamped range.
pub fn angle_from_raw(raw: f64) -> f64 {
    let angle = (raw * ANGLE_LIMIT_DEG).clamp(-ANGLE_LIMIT_DEG, ANGLE_LIMIT_DEG);
    round1(angle)
}

/// Convert a raw two-axis reading into filtered tilt angles.
pub fn filter_reading(raw_x: f64, raw_y: f64) -> TiltAngles {
    TiltAngles {
        x: angle_from_raw(raw_x),
        y: angle_from_raw(raw_y),
    }
}

/// Reference orientation captured at recording start
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Baseline {
    pub x: f64,
    pub y: f64,
    pub active: bool,
}

/// Converts absolute angles to baseline-relative angles.
///
/// The baseline is captured exactly once per recording session, before any
/// tilt evaluation, and stays fixed until the next capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineTracker {
    baseline: Baseline,
}

impl BaselineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the reference orientation for the session.
    ///
    /// With relative mode enabled the current angles become the baseline;
    /// otherwise the baseline is true horizontal (0, 0).
    pub fn capture(&mut self, current_x: f64, current_y: f64, relative_mode: bool) {
        self.baseline = if relative_mode {
            log::debug!(
                "Captured relative baseline: x={:.1} y={:.1}",
                current_x,
                current_y
            );
            Baseline {
                x: current_x,
                y: current_y,
                active: true,
            }
        } else {
            log::debug!("Using absolute horizontal baseline");
            Baseline::default()
        };
    }

    /// Translate absolute angles into baseline-relative angles.
    ///
    /// Identity when relative mode is not active.
    pub fn to_relative(&self, x: f64, y: f64) -> (f64, f64) {
        if self.baseline.active {
            (x - self.baseline.x, y - self.baseline.y)
        } else {
            (x, y)
        }
    }

    pub fn is_relative(&self) -> bool {
        self.baseline.active
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_from_raw_clamps_to_range() {
        for raw in [-5.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 5.0] {
            let angle = angle_from_raw(raw);
            assert!((-ANGLE_LIMIT_DEG..=ANGLE_LIMIT_DEG).contains(&angle));
        }
        assert_eq!(angle_from_raw(2.0), 90.0);
        assert_eq!(angle_from_raw(-2.0), -90.0);
    }

    #[test]
    fn test_angle_from_raw_is_monotonic_when_unclamped() {
        let mut prev = angle_from_raw(-1.0);
        let mut raw = -1.0;
        while raw < 1.0 {
            raw += 0.05;
            let next = angle_from_raw(raw);
            assert!(next >= prev, "not monotonic at raw={}", raw);
            prev = next;
        }
    }

    #[test]
    fn test_angle_from_raw_rounds_to_one_decimal() {
        // 0.0333 * 90 = 2.997 -> 3.0
        assert_eq!(angle_from_raw(0.0333), 3.0);
        assert_eq!(angle_from_raw(0.01), 0.9);
    }

    #[test]
    fn test_relative_mode_subtracts_baseline() {
        let mut tracker = BaselineTracker::new();
        tracker.capture(2.0, -1.0, true);

        let (rx, ry) = tracker.to_relative(5.0, -1.0);
        assert_eq!((rx, ry), (3.0, 0.0));
        assert!(tracker.is_relative());
    }

    #[test]
    fn test_absolute_mode_is_identity() {
        let mut tracker = BaselineTracker::new();
        tracker.capture(2.0, -1.0, false);

        let (rx, ry) = tracker.to_relative(5.0, -1.0);
        assert_eq!((rx, ry), (5.0, -1.0));
        assert!(!tracker.is_relative());
        assert_eq!(tracker.baseline(), Baseline::default());
    }

    #[test]
    fn test_recapture_replaces_baseline() {
        let mut tracker = BaselineTracker::new();
        tracker.capture(1.0, 1.0, true);
        tracker.capture(4.0, 4.0, true);

        let (rx, ry) = tracker.to_relative(4.0, 4.0);
        assert_eq!((rx, ry), (0.0, 0.0));
    }
}
