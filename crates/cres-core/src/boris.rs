//! Drift-kick-drift Boris integrator for one relativistic particle.
//!
//! The step variable is arc length along the trajectory, not time. Each
//! step splits into a half-drift, a momentum kick built from an exact
//! rotation about the local field direction, and a second half-drift.
//! The rotation preserves momentum magnitude bit-for-bit when radiation
//! reaction is off, so a pure magnetic field does no work per step.
//! Everything runs in SI; field samples arrive in tesla.

use cres_math::vec3;
use cres_types::constants::C_LIGHT;
use cres_types::error::{TrackError, TrackResult};
use cres_types::state::TrackState;

use crate::equation::EquationOfMotion;

/// One full-step result alongside its embedded local error estimate.
///
/// `error` holds per-component differences full-step minus composed
/// half-steps: indices 0..3 position [m], 3..6 momentum [kg m/s].
#[derive(Debug, Clone, Copy)]
pub struct StepEstimate {
    pub out: TrackState,
    pub mid: TrackState,
    pub error: [f64; 6],
}

pub struct BorisStepper {
    equation: EquationOfMotion,
}

impl BorisStepper {
    pub fn new(equation: EquationOfMotion) -> Self {
        BorisStepper { equation }
    }

    pub fn equation(&self) -> &EquationOfMotion {
        &self.equation
    }

    pub fn equation_mut(&mut self) -> &mut EquationOfMotion {
        &mut self.equation
    }

    /// Advance `state` by one arc-length step `hstep_m`.
    ///
    /// Arc-length accounting stays with the caller; this updates
    /// position, momentum and the elapsed-time channel only.
    pub fn step(&self, state: &TrackState, hstep_m: f64) -> TrackResult<TrackState> {
        // The rotation angle reads charge and mass from the state, the
        // radiation correction from the equation; both must describe
        // the same species.
        debug_assert!(
            state.charge_c == self.equation.charge_c()
                && state.mass_kg == self.equation.mass_kg(),
            "track state species differs from the equation of motion"
        );
        let mut next = *state;

        let p_mag = next.momentum_mag();
        if p_mag == 0.0 {
            return Err(TrackError::PhysicsViolation(
                "Boris step requires non-zero momentum magnitude".to_string(),
            ));
        }

        drift(&mut next, 0.5 * hstep_m);
        self.kick(&mut next, hstep_m)?;
        drift(&mut next, 0.5 * hstep_m);
        Ok(next)
    }

    /// Momentum rotation about the field sampled at the mid-drift
    /// position, with radiation reaction applied as two half-interval
    /// linear corrections bracketing the rotation.
    fn kick(&self, state: &mut TrackState, hstep_m: f64) -> TrackResult<()> {
        let b_t = self.equation.field_at(state.position_m)?;
        let dt = hstep_m / state.speed_m_s();
        let mass = state.mass_kg;

        // u = gamma v = p / m.
        let mut u = vec3::scale(state.momentum_kg_m_s, 1.0 / mass);

        u = self.radiation_correction(u, b_t, 0.5 * dt);

        let b_mag = vec3::norm(b_t);
        if b_mag > 0.0 {
            let gamma = gamma_from_u(u);
            let half_theta = dt * b_mag * state.charge_c / (2.0 * mass * gamma);
            let h_vec = vec3::scale(b_t, half_theta.tan() / b_mag);
            let s_vec = vec3::scale(h_vec, 2.0 / (1.0 + vec3::norm2(h_vec)));
            let rotated = vec3::cross(vec3::add(u, vec3::cross(u, h_vec)), s_vec);
            u = vec3::add(u, rotated);
        }

        u = self.radiation_correction(u, b_t, 0.5 * dt);

        state.momentum_kg_m_s = vec3::scale(u, mass);
        Ok(())
    }

    fn radiation_correction(&self, u: [f64; 3], b_t: [f64; 3], dt_half: f64) -> [f64; 3] {
        let gamma = gamma_from_u(u);
        let beta = vec3::scale(u, 1.0 / (gamma * C_LIGHT));
        vec3::axpy(u, dt_half, self.equation.radiation_acceleration(b_t, beta))
    }

    /// One full step plus the Richardson error estimate from comparing
    /// it against two composed half steps. The returned `out` is the
    /// full-step result, identical to a plain [`step`](Self::step).
    pub fn step_with_error_estimate(
        &self,
        state: &TrackState,
        hstep_m: f64,
    ) -> TrackResult<(TrackState, [f64; 6])> {
        let estimate = self.step_with_mid_and_error_estimate(state, hstep_m)?;
        Ok((estimate.out, estimate.error))
    }

    /// As [`step_with_error_estimate`](Self::step_with_error_estimate),
    /// additionally exposing the half-way state for diagnostics.
    pub fn step_with_mid_and_error_estimate(
        &self,
        state: &TrackState,
        hstep_m: f64,
    ) -> TrackResult<StepEstimate> {
        let out = self.step(state, hstep_m)?;
        let mid = self.step(state, 0.5 * hstep_m)?;
        let composed = self.step(&mid, 0.5 * hstep_m)?;

        let mut error = [0.0; 6];
        for i in 0..3 {
            error[i] = out.position_m[i] - composed.position_m[i];
            error[i + 3] = out.momentum_kg_m_s[i] - composed.momentum_kg_m_s[i];
        }
        Ok(StepEstimate { out, mid, error })
    }
}

/// Straight-line advance of half an arc-length step along the momentum
/// direction, accumulating the matching lab-time increment.
fn drift(state: &mut TrackState, h_half_m: f64) {
    let p_mag = state.momentum_mag();
    state.position_m = vec3::axpy(
        state.position_m,
        h_half_m / p_mag,
        state.momentum_kg_m_s,
    );
    state.time_s += h_half_m / state.speed_m_s();
}

fn gamma_from_u(u: [f64; 3]) -> f64 {
    (1.0 + vec3::norm2(u) / (C_LIGHT * C_LIGHT)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{MagneticField, UniformField};
    use cres_types::config::ParticleConfig;
    use cres_types::constants::{
        E_ENDPOINT_TRITIUM, E_REST_ELECTRON, M_ELECTRON, Q_ELEMENTARY,
    };

    fn stepper(b_t: [f64; 3], radiation: bool) -> BorisStepper {
        let particle = ParticleConfig {
            radiation_reaction: radiation,
            ..ParticleConfig::default()
        };
        let eqn = EquationOfMotion::new(
            MagneticField::Uniform(UniformField::new(b_t)),
            &particle,
        )
        .unwrap();
        BorisStepper::new(eqn)
    }

    fn electron_18_6_kev(direction: [f64; 3]) -> TrackState {
        // Endpoint electron, the regime this tracker targets.
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
    fn test_speed_conserved_in_pure_magnetic_field() {
        let stepper = stepper([0.0, 0.0, 1.0], false);
        let mut state = electron_18_6_kev([1.0, 0.3, 0.1]);
        let p0 = state.momentum_mag();
        for _ in 0..1000 {
            state = stepper.step(&state, 1e-6).unwrap();
        }
        let rel = (state.momentum_mag() - p0).abs() / p0;
        assert!(rel < 1e-12, "Magnetic rotation did work: relative {rel}");
    }

    #[test]
    fn test_cyclotron_orbit_closes_after_one_period() {
        let stepper = stepper([0.0, 0.0, 1.0], false);
        let state0 = electron_18_6_kev([1.0, 0.0, 0.0]);
        // Gyroradius r = p / (|q| B); one period covers arc 2 pi r.
        let radius = state0.momentum_mag() / (Q_ELEMENTARY * 1.0);
        let n_steps = 720;
        let h = 2.0 * std::f64::consts::PI * radius / n_steps as f64;

        let mut state = state0;
        for _ in 0..n_steps {
            state = stepper.step(&state, h).unwrap();
        }

        // Each step rotates by exactly h / r, so the polygon closes up
        // to rounding error.
        let pos_err = vec3::distance(state.position_m, state0.position_m) / radius;
        let mom_err = vec3::distance(state.momentum_kg_m_s, state0.momentum_kg_m_s)
            / state0.momentum_mag();
        assert!(pos_err < 1e-8, "Orbit failed to close: position off by {pos_err}");
        assert!(mom_err < 1e-8, "Orbit failed to close: momentum off by {mom_err}");
    }

    #[test]
    fn test_zero_field_is_straight_line_drift() {
        let stepper = stepper([0.0, 0.0, 0.0], false);
        let state0 = electron_18_6_kev([0.0, 1.0, 0.0]);
        let h = 1e-3;
        let state = stepper.step(&state0, h).unwrap();
        assert!((state.position_m[1] - h).abs() < 1e-15);
        assert_eq!(state.position_m[0], 0.0);
        // Momentum round-trips through u = p/m; allow one ulp of that.
        let rel = vec3::distance(state.momentum_kg_m_s, state0.momentum_kg_m_s)
            / state0.momentum_mag();
        assert!(rel < 1e-15, "Field-free kick moved momentum by {rel}");
        let expected_dt = h / state0.speed_m_s();
        assert!((state.time_s - expected_dt).abs() / expected_dt < 1e-12);
    }

    #[test]
    fn test_full_step_branch_matches_plain_step() {
        let stepper = stepper([0.1, -0.2, 0.95], true);
        let state = electron_18_6_kev([0.7, -0.1, 0.4]);
        let h = 5e-5;
        let plain = stepper.step(&state, h).unwrap();
        let (out, error) = stepper.step_with_error_estimate(&state, h).unwrap();
        assert_eq!(out.position_m, plain.position_m);
        assert_eq!(out.momentum_kg_m_s, plain.momentum_kg_m_s);
        assert!(error.iter().all(|e| e.is_finite()));
    }

    #[test]
    fn test_error_estimate_shrinks_with_step_size() {
        let stepper = stepper([0.0, 0.0, 1.0], false);
        let state = electron_18_6_kev([1.0, 0.0, 0.0]);
        let err_mag = |h: f64| {
            let (_, e) = stepper.step_with_error_estimate(&state, h).unwrap();
            (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt()
        };
        let coarse = err_mag(1e-4);
        let fine = err_mag(1e-5);
        assert!(fine < coarse, "Local error must fall with h: {fine} !< {coarse}");
    }

    #[test]
    fn test_midpoint_sits_half_way_along_the_arc() {
        let stepper = stepper([0.0, 0.0, 1.0], false);
        let state = electron_18_6_kev([1.0, 0.0, 0.0]);
        let h = 1e-5;
        let estimate = stepper.step_with_mid_and_error_estimate(&state, h).unwrap();
        let half = stepper.step(&state, 0.5 * h).unwrap();
        assert_eq!(estimate.mid.position_m, half.position_m);
    }

    #[test]
    fn test_radiation_reaction_drains_kinetic_energy() {
        let stepper = stepper([0.0, 0.0, 1.0], true);
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        let e0 = state.kinetic_energy_j();
        for _ in 0..2000 {
            state = stepper.step(&state, 1e-5).unwrap();
        }
        let e1 = state.kinetic_energy_j();
        assert!(e1 < e0, "Radiating electron must lose energy: {e1} !< {e0}");
    }

    #[test]
    #[should_panic(expected = "species differs")]
    fn test_mismatched_species_is_caught() {
        let stepper = stepper([0.0, 0.0, 1.0], false);
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        state.mass_kg = 2.0 * M_ELECTRON;
        let _ = stepper.step(&state, 1e-6);
    }

    #[test]
    fn test_zero_momentum_is_rejected() {
        let stepper = stepper([0.0, 0.0, 1.0], false);
        let mut state = electron_18_6_kev([1.0, 0.0, 0.0]);
        state.momentum_kg_m_s = [0.0, 0.0, 0.0];
        match stepper.step(&state, 1e-6) {
            Err(TrackError::PhysicsViolation(msg)) => {
                assert!(msg.contains("momentum"))
            }
            other => panic!("Expected momentum guard, got {other:?}"),
        }
    }
}
