// ─────────────────────────────────────────────────────────────────────
// CRES Track Core — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::C_LIGHT;
use crate::error::{TrackError, TrackResult};

/// Kinematic state of one tracked particle.
///
/// Owned by the caller driving a single track; mutated in place by the
/// stepper and the adaptive driver. All components are SI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackState {
    pub position_m: [f64; 3],
    pub momentum_kg_m_s: [f64; 3],
    /// Accumulated laboratory time along the track [s].
    pub time_s: f64,
    /// Accumulated arc length along the trajectory [m].
    pub arc_length_m: f64,
    pub mass_kg: f64,
    pub charge_c: f64,
}

impl TrackState {
    /// Momentum magnitude |p| [kg m/s].
    pub fn momentum_mag(&self) -> f64 {
        let p = &self.momentum_kg_m_s;
        (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt()
    }

    /// Lorentz factor from the energy-momentum relation,
    /// `gamma = sqrt(1 + (p / m c)^2)`.
    pub fn gamma(&self) -> f64 {
        let pc = self.momentum_mag() / (self.mass_kg * C_LIGHT);
        (1.0 + pc * pc).sqrt()
    }

    /// Speed |v| = |p| / (gamma m) [m/s]. Always < c.
    pub fn speed_m_s(&self) -> f64 {
        self.momentum_mag() / (self.gamma() * self.mass_kg)
    }

    /// Velocity as a fraction of light speed, `beta = p / (gamma m c)`.
    pub fn beta(&self) -> [f64; 3] {
        let scale = 1.0 / (self.gamma() * self.mass_kg * C_LIGHT);
        let p = &self.momentum_kg_m_s;
        [p[0] * scale, p[1] * scale, p[2] * scale]
    }

    /// Relativistic kinetic energy `(gamma - 1) m c^2` [J].
    pub fn kinetic_energy_j(&self) -> f64 {
        (self.gamma() - 1.0) * self.mass_kg * C_LIGHT * C_LIGHT
    }

    /// Fail-fast validation in the same shape the rest of the core uses:
    /// every component finite, mass strictly positive, charge non-zero.
    pub fn validate(&self, label: &str) -> TrackResult<()> {
        if self.position_m.iter().any(|v| !v.is_finite()) {
            return Err(TrackError::PhysicsViolation(format!(
                "{label} position components must be finite"
            )));
        }
        if self.momentum_kg_m_s.iter().any(|v| !v.is_finite()) {
            return Err(TrackError::PhysicsViolation(format!(
                "{label} momentum components must be finite"
            )));
        }
        if !self.time_s.is_finite() || !self.arc_length_m.is_finite() {
            return Err(TrackError::PhysicsViolation(format!(
                "{label} auxiliary channels must be finite, got time={}, arc={}",
                self.time_s, self.arc_length_m
            )));
        }
        if !self.mass_kg.is_finite() || self.mass_kg <= 0.0 {
            return Err(TrackError::PhysicsViolation(format!(
                "{label}.mass_kg must be finite and > 0, got {}",
                self.mass_kg
            )));
        }
        if !self.charge_c.is_finite() || self.charge_c == 0.0 {
            return Err(TrackError::PhysicsViolation(format!(
                "{label}.charge_c must be finite and non-zero, got {}",
                self.charge_c
            )));
        }
        Ok(())
    }
}

/// One sample of a measured field map: a coordinate triple plus the
/// field vector recorded there. Immutable after load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredFieldPoint {
    pub position_m: [f64; 3],
    pub field_t: [f64; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{E_ENDPOINT_TRITIUM, E_REST_ELECTRON, M_ELECTRON, Q_ELEMENTARY};

    fn electron_state(p_kg_m_s: [f64; 3]) -> TrackState {
        TrackState {
            position_m: [0.0, 0.0, 0.0],
            momentum_kg_m_s: p_kg_m_s,
            time_s: 0.0,
            arc_length_m: 0.0,
            mass_kg: M_ELECTRON,
            charge_c: -Q_ELEMENTARY,
        }
    }

    #[test]
    fn test_gamma_at_rest_momentum_is_one() {
        let state = electron_state([0.0, 0.0, 0.0]);
        assert!((state.gamma() - 1.0).abs() < 1e-15);
        assert_eq!(state.kinetic_energy_j(), 0.0);
    }

    #[test]
    fn test_kinetic_energy_matches_18_6_kev_momentum() {
        // p for an endpoint electron from E^2 = (pc)^2 + (mc^2)^2.
        let e_kin = E_ENDPOINT_TRITIUM;
        let e_total = e_kin + E_REST_ELECTRON;
        let p = (e_total * e_total - E_REST_ELECTRON * E_REST_ELECTRON).sqrt() / C_LIGHT;
        let state = electron_state([p, 0.0, 0.0]);
        let rel = (state.kinetic_energy_j() - e_kin).abs() / e_kin;
        assert!(rel < 1e-12, "Kinetic energy off by relative {rel}");
    }

    #[test]
    fn test_speed_is_always_below_light_speed() {
        // Extreme momentum: speed must stay strictly below c.
        let state = electron_state([1e-18, 0.0, 0.0]);
        assert!(state.speed_m_s() < C_LIGHT);
        let beta = state.beta();
        let beta_mag = (beta[0] * beta[0] + beta[1] * beta[1] + beta[2] * beta[2]).sqrt();
        assert!(beta_mag < 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_components() {
        let mut state = electron_state([1e-24, 0.0, 0.0]);
        state.position_m[1] = f64::NAN;
        let err = state.validate("state").unwrap_err();
        match err {
            TrackError::PhysicsViolation(msg) => assert!(msg.contains("position")),
            other => panic!("Unexpected error: {other:?}"),
        }

        let mut state = electron_state([1e-24, 0.0, 0.0]);
        state.mass_kg = 0.0;
        assert!(state.validate("state").is_err());

        let mut state = electron_state([1e-24, 0.0, 0.0]);
        state.charge_c = 0.0;
        assert!(state.validate("state").is_err());
    }

    #[test]
    fn test_validate_accepts_physical_state() {
        let state = electron_state([1e-24, -2e-24, 3e-25]);
        assert!(state.validate("state").is_ok());
    }
}
