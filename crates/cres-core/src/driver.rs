//! Adaptive arc-length driver over the Boris stepper.
//!
//! Repeats trial steps, accepting when the embedded Richardson error
//! estimate lands inside the requested tolerance and shrinking the
//! step otherwise. Arc-length bookkeeping lives here; the stepper only
//! ever sees position, momentum and time.

use cres_types::config::{StepControlParameters, TrackerConfig};
use cres_types::error::{TrackError, TrackResult};
use cres_types::state::TrackState;
use log::warn;

use crate::boris::BorisStepper;
use crate::equation::EquationOfMotion;

pub struct AdaptiveDriver {
    stepper: BorisStepper,
    control: StepControlParameters,
    /// error^2 above which the shrink factor saturates at
    /// `max_shrink_ratio`.
    shrink_threshold2: f64,
    /// error^2 below which the growth factor saturates at
    /// `max_grow_ratio`.
    grow_threshold2: f64,
}

impl AdaptiveDriver {
    pub fn new(
        stepper: BorisStepper,
        control: StepControlParameters,
    ) -> TrackResult<Self> {
        control.validate()?;
        let shrink_threshold2 = (control.max_shrink_ratio / control.safety_factor)
            .powf(2.0 / control.power_shrink);
        let grow_threshold2 = (control.max_grow_ratio / control.safety_factor)
            .powf(2.0 / control.power_grow);
        Ok(AdaptiveDriver {
            stepper,
            control,
            shrink_threshold2,
            grow_threshold2,
        })
    }

    pub fn from_config(config: &TrackerConfig) -> TrackResult<Self> {
        let equation = EquationOfMotion::from_config(config)?;
        Self::new(BorisStepper::new(equation), config.step_control.clone())
    }

    pub fn stepper(&self) -> &BorisStepper {
        &self.stepper
    }

    pub fn stepper_mut(&mut self) -> &mut BorisStepper {
        &mut self.stepper
    }

    pub fn control(&self) -> &StepControlParameters {
        &self.control
    }

    /// Integrate `state` forward by `hstep_m` of arc length at relative
    /// tolerance `epsilon`.
    ///
    /// A zero request is a warned no-op. A negative or non-finite
    /// request cannot be retried by the caller's stepping loop and
    /// aborts the track. On success the accumulated arc length matches
    /// the request to within the tolerance threshold and the state
    /// never reflects a rejected trial.
    pub fn advance_track(
        &self,
        state: &mut TrackState,
        hstep_m: f64,
        epsilon: f64,
    ) -> TrackResult<()> {
        if hstep_m == 0.0 {
            warn!("advance_track called with a zero step request, nothing to do");
            return Ok(());
        }
        if !hstep_m.is_finite() || hstep_m < 0.0 {
            return Err(TrackError::TrackAborted(format!(
                "requested arc length must be positive and finite, got {hstep_m}"
            )));
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "relative tolerance must be finite and > 0, got {epsilon}"
            )));
        }
        state.validate("advance_track state")?;

        let end = state.arc_length_m + hstep_m;
        let h_threshold = (epsilon * hstep_m)
            .max(self.control.smallest_fraction * state.arc_length_m.abs());

        let mut htry = hstep_m;
        for _ in 0..self.control.max_steps {
            let remaining = end - state.arc_length_m;
            if remaining <= h_threshold {
                return Ok(());
            }
            let h = htry.max(self.control.minimum_step_m).min(remaining);
            htry = self.one_good_step(state, h, epsilon)?;
        }

        let remaining = end - state.arc_length_m;
        if remaining > h_threshold {
            warn!(
                "advance_track hit the {}-step ceiling with {remaining} m left",
                self.control.max_steps
            );
        }
        Ok(())
    }

    /// Attempt `htry`, shrinking on rejection, until one step is
    /// accepted or the trial budget runs out. Commits the accepted
    /// state, accrues arc length, and returns the step-size hint for
    /// the next call.
    fn one_good_step(
        &self,
        state: &mut TrackState,
        htry: f64,
        epsilon: f64,
    ) -> TrackResult<f64> {
        let mut h = htry;
        for trial in 1..=self.control.max_trials {
            let (out, error) = self.stepper.step_with_error_estimate(state, h)?;
            let error2 = self.relative_error2(state, &error, h, epsilon);

            if error2 <= 1.0 {
                commit(state, &out, h);
                return Ok(self.next_step_hint(h, error2));
            }
            if trial == self.control.max_trials {
                warn!(
                    "step error {error2} still above tolerance after {trial} \
                     shrink trials, accepting h = {h} m"
                );
                commit(state, &out, h);
                return Ok(self.next_step_hint(h, error2));
            }

            let shrunk = if error2 > self.shrink_threshold2 {
                h * self.control.max_shrink_ratio
            } else {
                self.control.safety_factor * h * error2.powf(0.5 * self.control.power_shrink)
            };
            // Underflow: a step this small no longer moves the arc
            // length at all, so retrying cannot converge further.
            if state.arc_length_m + shrunk == state.arc_length_m {
                warn!("step size underflow at arc length {} m, accepting h = {h} m",
                    state.arc_length_m);
                commit(state, &out, h);
                return Ok(self.next_step_hint(h, error2));
            }
            h = shrunk.max(self.control.minimum_step_m);
        }
        unreachable!("trial loop always returns by the max_trials iteration")
    }

    /// Squared relative error of one trial, normalized so that 1.0 sits
    /// exactly on the tolerance: position error against the step length
    /// (clamped to the minimum step), momentum error against the
    /// pre-step momentum magnitude.
    fn relative_error2(
        &self,
        state: &TrackState,
        error: &[f64; 6],
        h: f64,
        epsilon: f64,
    ) -> f64 {
        let h_eff = h.max(self.control.minimum_step_m);
        let err_pos2 = error[0] * error[0] + error[1] * error[1] + error[2] * error[2];
        let err_mom2 = error[3] * error[3] + error[4] * error[4] + error[5] * error[5];
        let p2 = {
            let p = state.momentum_mag();
            p * p
        };
        let rel2 = (err_pos2 / (h_eff * h_eff)).max(err_mom2 / p2);
        rel2 / (epsilon * epsilon)
    }

    fn next_step_hint(&self, h: f64, error2: f64) -> f64 {
        if error2 < self.grow_threshold2 {
            h * self.control.max_grow_ratio
        } else {
            self.control.safety_factor * h * error2.powf(0.5 * self.control.power_grow)
        }
    }
}

fn commit(state: &mut TrackState, out: &TrackState, hdid_m: f64) {
    let arc = state.arc_length_m;
    *state = *out;
    state.arc_length_m = arc + hdid_m;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{MagneticField, UniformField};
    use cres_math::vec3;
    use cres_types::config::ParticleConfig;
    use cres_types::constants::{
        C_LIGHT, E_ENDPOINT_TRITIUM, E_REST_ELECTRON, M_ELECTRON, Q_ELEMENTARY,
    };

    fn uniform_driver(b_t: [f64; 3], radiation: bool) -> AdaptiveDriver {
        let particle = ParticleConfig {
            radiation_reaction: radiation,
            ..ParticleConfig::default()
        };
        let equation = EquationOfMotion::new(
            MagneticField::Uniform(UniformField::new(b_t)),
            &particle,
        )
        .unwrap();
        let control = StepControlParameters {
            max_steps: 20_000,
            ..StepControlParameters::default()
        };
        AdaptiveDriver::new(BorisStepper::new(equation), control).unwrap()
    }

    fn electron_18_6_kev(direction: [f64; 3]) -> TrackState {
        let e_total = E_ENDPOINT_TRITIUM + E_REST_ELECTRON;
        let p = (e_total * e_total - E_REST_ELECTRON * E_REST_ELECTRON).sqrt() / C_LIGHT;
        let d_mag = vec3::norm(direction);
        TrackState {
            position_m: [0.0, 0.0, 0.0],
            momentum_kg_m_s: vec3::scale(direction, p / d_mag),
            time_s: 0.0,
            arc_length_m: 0.0,
            mass_kg: M_ELECTRON,
            charge_c: -Q_ELEMENTARY,
        }
    }

    #[test]
    fn test_accumulated_arc_length_matches_request() {
        let driver = uniform_driver([0.0, 0.0, 1.0], false);
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        let request = 1e-3;
        driver.advance_track(&mut state, request, 1e-6).unwrap();
        let miss = (state.arc_length_m - request).abs();
        assert!(
            miss <= 1e-6 * request + 1e-15,
            "Arc length off by {miss} m"
        );
        assert!(state.arc_length_m > 0.0);
        assert!(state.time_s > 0.0);
    }

    #[test]
    fn test_speed_conserved_through_adaptive_integration() {
        let driver = uniform_driver([0.0, 0.0, 1.0], false);
        let mut state = electron_18_6_kev([0.6, 0.8, 0.0]);
        let p0 = state.momentum_mag();
        driver.advance_track(&mut state, 5e-4, 1e-6).unwrap();
        let rel = (state.momentum_mag() - p0).abs() / p0;
        assert!(rel < 1e-10, "Driver changed speed in a pure field: {rel}");
    }

    #[test]
    fn test_zero_request_is_a_no_op() {
        let driver = uniform_driver([0.0, 0.0, 1.0], true);
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        let before = state;
        driver.advance_track(&mut state, 0.0, 1e-6).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_negative_request_aborts_the_track() {
        let driver = uniform_driver([0.0, 0.0, 1.0], true);
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        match driver.advance_track(&mut state, -1e-4, 1e-6) {
            Err(TrackError::TrackAborted(msg)) => assert!(msg.contains("positive")),
            other => panic!("Expected track abort, got {other:?}"),
        }
        assert!(driver.advance_track(&mut state, f64::NAN, 1e-6).is_err());
    }

    #[test]
    fn test_invalid_tolerance_is_a_config_error() {
        let driver = uniform_driver([0.0, 0.0, 1.0], true);
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        match driver.advance_track(&mut state, 1e-4, 0.0) {
            Err(TrackError::ConfigError(msg)) => assert!(msg.contains("tolerance")),
            other => panic!("Expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_control_is_rejected_at_construction() {
        let particle = ParticleConfig::default();
        let equation = EquationOfMotion::new(
            MagneticField::Uniform(UniformField::new([0.0, 0.0, 1.0])),
            &particle,
        )
        .unwrap();
        let control = StepControlParameters {
            safety_factor: 2.0,
            ..StepControlParameters::default()
        };
        assert!(AdaptiveDriver::new(BorisStepper::new(equation), control).is_err());
    }

    #[test]
    fn test_tighter_tolerance_does_not_change_the_endpoint_much() {
        let loose_driver = uniform_driver([0.0, 0.0, 1.0], false);
        let mut loose = electron_18_6_kev([1.0, 0.0, 0.0]);
        loose_driver.advance_track(&mut loose, 2e-4, 1e-4).unwrap();

        let mut tight = electron_18_6_kev([1.0, 0.0, 0.0]);
        loose_driver.advance_track(&mut tight, 2e-4, 1e-8).unwrap();

        let gyroradius = tight.momentum_mag() / Q_ELEMENTARY;
        let separation = vec3::distance(loose.position_m, tight.position_m);
        assert!(
            separation < 1e-3 * gyroradius,
            "Endpoints diverged by {separation} m"
        );
    }

    #[test]
    fn test_from_config_builds_a_working_driver() {
        let json = r#"{
            "tracker_name": "uniform",
            "field": { "model": "uniform", "b_t": [0.0, 0.0, 1.0] },
            "particle": { "radiation_reaction": false },
            "step_control": { "max_steps": 20000 }
        }"#;
        let config: TrackerConfig = serde_json::from_str(json).unwrap();
        let driver = AdaptiveDriver::from_config(&config).unwrap();
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        driver.advance_track(&mut state, 1e-4, 1e-6).unwrap();
        assert!((state.arc_length_m - 1e-4).abs() < 1e-9);
    }
}
