//! Relativistic equation of motion in a magnetic field.
//!
//! Computes the cyclotron angular-frequency vector, the Lorentz
//! acceleration, and the classical radiation-reaction correction
//! (Landau-Lifshitz reduced form) that drains energy from the track.
//! Every kinematic argument is `beta = v/c`; the Lorentz factor is
//! derived from it, never re-derived from momentum.

use cres_math::vec3;
use cres_types::config::{ParticleConfig, TrackerConfig};
use cres_types::constants::{C_LIGHT, EPS0_SI};
use cres_types::error::{TrackError, TrackResult};

use crate::field::MagneticField;

/// Equation of motion for one particle species in one field model.
pub struct EquationOfMotion {
    charge_c: f64,
    mass_kg: f64,
    radiation_enabled: bool,
    /// Characteristic radiation time tau = q^2 / (6 pi eps0 c^3 m) [s].
    tau_s: f64,
    field: MagneticField,
}

impl EquationOfMotion {
    /// Build from configuration; constructs the field evaluator and
    /// validates the species. Invalid charge or mass is a broken
    /// setup and fails immediately.
    pub fn from_config(config: &TrackerConfig) -> TrackResult<Self> {
        let field = MagneticField::from_config(&config.field)?;
        Self::new(field, &config.particle)
    }

    pub fn new(field: MagneticField, particle: &ParticleConfig) -> TrackResult<Self> {
        validate_species(particle.charge_c, particle.mass_kg)?;
        Ok(EquationOfMotion {
            charge_c: particle.charge_c,
            mass_kg: particle.mass_kg,
            radiation_enabled: particle.radiation_reaction,
            tau_s: characteristic_time(particle.charge_c, particle.mass_kg),
            field,
        })
    }

    /// Update the species this equation advances. Called once per
    /// track, never mid-step.
    pub fn set_state(&mut self, charge_c: f64, mass_kg: f64) -> TrackResult<()> {
        validate_species(charge_c, mass_kg)?;
        self.charge_c = charge_c;
        self.mass_kg = mass_kg;
        self.tau_s = characteristic_time(charge_c, mass_kg);
        Ok(())
    }

    /// Swap the active field model. Called on configuration changes
    /// only, never concurrently with stepping.
    pub fn set_field(&mut self, field: MagneticField) {
        self.field = field;
    }

    pub fn field(&self) -> &MagneticField {
        &self.field
    }

    pub fn charge_c(&self) -> f64 {
        self.charge_c
    }

    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    /// Characteristic radiation time tau [s].
    pub fn characteristic_time_s(&self) -> f64 {
        self.tau_s
    }

    /// Magnetic field [T] at a position, from the active evaluator.
    pub fn field_at(&self, position_m: [f64; 3]) -> TrackResult<[f64; 3]> {
        self.field.field_at(position_m)
    }

    /// Relativistic cyclotron angular-frequency vector
    /// `omega = q B / (m gamma)` [rad/s], gamma from the supplied beta.
    pub fn cyclotron_omega(&self, b_t: [f64; 3], beta: [f64; 3]) -> [f64; 3] {
        let gamma = gamma_from_beta(beta);
        vec3::scale(b_t, self.charge_c / (self.mass_kg * gamma))
    }

    /// Lorentz acceleration `v x omega` [m/s^2].
    pub fn lorentz_acceleration(&self, b_t: [f64; 3], beta: [f64; 3]) -> [f64; 3] {
        let omega = self.cyclotron_omega(b_t, beta);
        vec3::cross(vec3::scale(beta, C_LIGHT), omega)
    }

    /// Radiation-reaction acceleration [m/s^2], Landau-Lifshitz
    /// reduced form:
    ///
    /// `mu = omega - (v . omega / c^2) v`
    /// `a_rr = tau gamma^3 (v x omega) x mu`
    ///
    /// For v perpendicular to B this reduces to `-tau gamma w_c^2 v`
    /// (w_c = qB/m), the Larmor energy-loss rate; for v parallel to B
    /// it vanishes. Finite at gamma -> 1, no guard needed.
    pub fn radiation_acceleration(&self, b_t: [f64; 3], beta: [f64; 3]) -> [f64; 3] {
        if !self.radiation_enabled {
            return [0.0, 0.0, 0.0];
        }
        let gamma = gamma_from_beta(beta);
        let v = vec3::scale(beta, C_LIGHT);
        let omega = vec3::scale(b_t, self.charge_c / (self.mass_kg * gamma));

        let mu = vec3::axpy(omega, -vec3::dot(v, omega) / (C_LIGHT * C_LIGHT), v);
        let tau_g3 = self.tau_s * gamma * gamma * gamma;
        vec3::scale(vec3::cross(vec3::cross(v, omega), mu), tau_g3)
    }

    /// Lorentz plus radiation-reaction acceleration [m/s^2].
    pub fn total_acceleration(&self, b_t: [f64; 3], beta: [f64; 3]) -> [f64; 3] {
        vec3::add(
            self.lorentz_acceleration(b_t, beta),
            self.radiation_acceleration(b_t, beta),
        )
    }

    /// Larmor-type radiated power diagnostic, `tau |a|^2` (per unit
    /// mass; callers multiply by the mass when they want watts).
    pub fn radiated_power(&self, b_t: [f64; 3], beta: [f64; 3]) -> f64 {
        self.tau_s * vec3::norm2(self.total_acceleration(b_t, beta))
    }
}

fn validate_species(charge_c: f64, mass_kg: f64) -> TrackResult<()> {
    if !charge_c.is_finite() || charge_c == 0.0 {
        return Err(TrackError::PhysicsViolation(format!(
            "particle charge_c must be finite and non-zero, got {charge_c}"
        )));
    }
    if !mass_kg.is_finite() || mass_kg <= 0.0 {
        return Err(TrackError::PhysicsViolation(format!(
            "particle mass_kg must be finite and > 0, got {mass_kg}"
        )));
    }
    Ok(())
}

fn characteristic_time(charge_c: f64, mass_kg: f64) -> f64 {
    charge_c * charge_c
        / (6.0 * std::f64::consts::PI * EPS0_SI * C_LIGHT * C_LIGHT * C_LIGHT * mass_kg)
}

fn gamma_from_beta(beta: [f64; 3]) -> f64 {
    let b2 = vec3::norm2(beta);
    debug_assert!(b2 < 1.0, "beta magnitude must be < 1, got |beta|^2 = {b2}");
    1.0 / (1.0 - b2).sqrt()
}
