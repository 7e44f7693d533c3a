// Tilt detection state machine
//
// Two states, Level and Tilted, driven by baseline-relative angles against
// the configured threshold. Transitions are evaluated only while the
// stable period is active; the status label is recomputed on every sample
// for UI feedback regardless.
//
// Hysteresis: once Tilted, the machine stays Tilted until BOTH axes drop
// below the threshold in the same sample. A single axis dipping while the
// other stays above must not end the excursion.

use serde::{Deserialize, Serialize};

/// Detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltState {
    Level,
    Tilted,
}

/// Outcome of one evaluation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TiltTransition {
    /// Level -> Tilted: a new excursion begins
    Started,
    /// Tilted -> Level: the excursion ends
    Ended,
    /// Tilted -> Tilted: magnitude refreshed
    StillTilted,
    /// Level -> Level: nothing to do
    StillLevel,
}

/// Display status, independent of whether the stable period is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiltStatus {
    /// Within threshold of true horizontal
    Level,
    /// Within threshold of the captured baseline orientation
    Baseline,
    Tilted,
}

impl TiltStatus {
    /// Classify a pair of relative angles for display.
    pub fn classify(threshold_deg: f64, rel_x: f64, rel_y: f64, relative_mode: bool) -> Self {
        if rel_x.abs() < threshold_deg && rel_y.abs() < threshold_deg {
            if relative_mode {
                TiltStatus::Baseline
            } else {
                TiltStatus::Level
            }
        } else {
            TiltStatus::Tilted
        }
    }
}

/// Tilt magnitude used to scale vibration feedback.
///
/// `max(0, sqrt(x^2 + y^2) - threshold * 0.2)`. Drives pulse rate and
/// duration only, never the Level/Tilted decision itself.
pub fn tilt_magnitude(threshold_deg: f64, rel_x: f64, rel_y: f64) -> f64 {
    (rel_x.hypot(rel_y) - threshold_deg * 0.2).max(0.0)
}

/// Hysteretic Level/Tilted state machine.
#[derive(Debug)]
pub struct TiltStateMachine {
    state: TiltState,
    threshold_deg: f64,
    magnitude: f64,
}

impl TiltStateMachine {
    pub fn new(threshold_deg: f64) -> Self {
        Self {
            state: TiltState::Level,
            threshold_deg,
            magnitude: 0.0,
        }
    }

    pub fn state(&self) -> TiltState {
        self.state
    }

    pub fn is_tilted(&self) -> bool {
        self.state == TiltState::Tilted
    }

    pub fn threshold_deg(&self) -> f64 {
        self.threshold_deg
    }

    /// Magnitude from the most recent evaluation.
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    /// Return to Level with a fresh threshold, dropping any excursion.
    pub fn reset(&mut self, threshold_deg: f64) {
        self.state = TiltState::Level;
        self.threshold_deg = threshold_deg;
        self.magnitude = 0.0;
    }

    /// Evaluate one sample of relative angles.
    ///
    /// Tilted iff |rel_x| >= threshold OR |rel_y| >= threshold.
    pub fn evaluate(&mut self, rel_x: f64, rel_y: f64) -> TiltTransition {
        let tilted = rel_x.abs() >= self.threshold_deg || rel_y.abs() >= self.threshold_deg;
        self.magnitude = tilt_magnitude(self.threshold_deg, rel_x, rel_y);

        match (self.state, tilted) {
            (TiltState::Level, true) => {
                self.state = TiltState::Tilted;
                log::debug!(
                    "Tilt started: rel_x={:.1} rel_y={:.1} magnitude={:.2}",
                    rel_x,
                    rel_y,
                    self.magnitude
                );
                TiltTransition::Started
            }
            (TiltState::Tilted, false) => {
                self.state = TiltState::Level;
                log::debug!("Tilt ended: back within threshold");
                TiltTransition::Ended
            }
            (TiltState::Tilted, true) => TiltTransition::StillTilted,
            (TiltState::Level, false) => TiltTransition::StillLevel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_level() {
        let machine = TiltStateMachine::new(3.0);
        assert_eq!(machine.state(), TiltState::Level);
        assert!(!machine.is_tilted());
    }

    #[test]
    fn test_level_to_tilted_on_either_axis() {
        let mut machine = TiltStateMachine::new(3.0);
        assert_eq!(machine.evaluate(4.0, 0.0), TiltTransition::Started);

        let mut machine = TiltStateMachine::new(3.0);
        assert_eq!(machine.evaluate(0.0, -3.0), TiltTransition::Started);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut machine = TiltStateMachine::new(3.0);
        assert_eq!(machine.evaluate(3.0, 0.0), TiltTransition::Started);
    }

    #[test]
    fn test_hysteresis_requires_both_axes_below() {
        let mut machine = TiltStateMachine::new(3.0);
        machine.evaluate(4.0, 4.0);
        assert!(machine.is_tilted());

        // One axis dips below; the other holds the excursion open
        assert_eq!(machine.evaluate(1.0, 4.0), TiltTransition::StillTilted);
        assert_eq!(machine.evaluate(4.0, 1.0), TiltTransition::StillTilted);

        // Both below simultaneously ends it
        assert_eq!(machine.evaluate(1.0, 1.0), TiltTransition::Ended);
        assert!(!machine.is_tilted());
    }

    #[test]
    fn test_level_to_level_is_noop() {
        let mut machine = TiltStateMachine::new(3.0);
        assert_eq!(machine.evaluate(1.0, 1.0), TiltTransition::StillLevel);
        assert_eq!(machine.evaluate(-2.9, 2.9), TiltTransition::StillLevel);
    }

    #[test]
    fn test_scenario_ramp_up_and_down() {
        // X = [0, 1, 4, 4, 1, 0], threshold 3.0: start at the first 4,
        // end at the following 1.
        let mut machine = TiltStateMachine::new(3.0);
        let transitions: Vec<_> = [0.0, 1.0, 4.0, 4.0, 1.0, 0.0]
            .iter()
            .map(|&x| machine.evaluate(x, 0.0))
            .collect();

        assert_eq!(
            transitions,
            vec![
                TiltTransition::StillLevel,
                TiltTransition::StillLevel,
                TiltTransition::Started,
                TiltTransition::StillTilted,
                TiltTransition::Ended,
                TiltTransition::StillLevel,
            ]
        );
    }

    #[test]
    fn test_magnitude_formula() {
        let m = tilt_magnitude(3.0, 3.0, 4.0);
        assert!((m - (5.0 - 0.6)).abs() < 1e-9);

        // Never negative
        assert_eq!(tilt_magnitude(3.0, 0.1, 0.0), 0.0);
    }

    #[test]
    fn test_status_label_modes() {
        assert_eq!(TiltStatus::classify(3.0, 1.0, 1.0, false), TiltStatus::Level);
        assert_eq!(
            TiltStatus::classify(3.0, 1.0, 1.0, true),
            TiltStatus::Baseline
        );
        assert_eq!(
            TiltStatus::classify(3.0, 3.0, 0.0, false),
            TiltStatus::Tilted
        );
        assert_eq!(TiltStatus::classify(3.0, 0.0, 5.0, true), TiltStatus::Tilted);
    }

    #[test]
    fn test_reset_drops_excursion() {
        let mut machine = TiltStateMachine::new(3.0);
        machine.evaluate(5.0, 0.0);
        assert!(machine.is_tilted());

        machine.reset(2.5);
        assert!(!machine.is_tilted());
        assert_eq!(machine.threshold_deg(), 2.5);
        assert_eq!(machine.magnitude(), 0.0);
    }

    #[test]
    fn test_relative_baseline_scenario() {
        // Baseline (2.0, -1.0), live reading (5.0, -1.0), threshold 2.5:
        // relative angles (3.0, 0.0) -> tilted.
        let mut machine = TiltStateMachine::new(2.5);
        let (rel_x, rel_y) = (5.0 - 2.0, -1.0 - (-1.0));
        assert_eq!(machine.evaluate(rel_x, rel_y), TiltTransition::Started);
    }
}
