// ─────────────────────────────────────────────────────────────────────
// CRES Track Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};

/// Top-level tracker configuration: which field model to integrate in,
/// which particle species to advance, and the step-control knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub tracker_name: String,
    pub field: FieldModelConfig,
    #[serde(default)]
    pub particle: ParticleConfig,
    #[serde(default)]
    pub step_control: StepControlParameters,
}

/// Closed set of field models. One evaluator per configuration; the
/// tag selects the variant, there is no open hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum FieldModelConfig {
    /// Constant field vector everywhere [T].
    Uniform { b_t: [f64; 3] },
    /// Two coaxial current loops at +/- z_offset_m forming a magnetic
    /// bottle, superimposed on an optional uniform background.
    CoilPair {
        radius_m: f64,
        current_a: f64,
        z_offset_m: f64,
        #[serde(default)]
        background_t: [f64; 3],
    },
    /// Measured field map: a gzip (or plain) delimited table of
    /// x,y,z,Bx,By,Bz samples, interpolated by nearest neighbours.
    FieldMap {
        path: String,
        /// Multiplier taking file coordinates into metres.
        #[serde(default = "default_unit_scale")]
        length_scale_m: f64,
        /// Multiplier taking file field values into tesla.
        #[serde(default = "default_unit_scale")]
        field_scale_t: f64,
    },
}

fn default_unit_scale() -> f64 {
    1.0
}

/// Particle species being advanced. Defaults to the electron, the only
/// species the surrounding simulation ever injects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleConfig {
    #[serde(default = "default_charge_c")]
    pub charge_c: f64,
    #[serde(default = "default_mass_kg")]
    pub mass_kg: f64,
    /// Radiation-reaction force on or off. Off turns the equation of
    /// motion into a pure Lorentz push.
    #[serde(default = "default_radiation")]
    pub radiation_reaction: bool,
}

fn default_charge_c() -> f64 {
    -crate::constants::Q_ELEMENTARY
}
fn default_mass_kg() -> f64 {
    crate::constants::M_ELECTRON
}
fn default_radiation() -> bool {
    true
}

impl Default for ParticleConfig {
    fn default() -> Self {
        ParticleConfig {
            charge_c: default_charge_c(),
            mass_kg: default_mass_kg(),
            radiation_reaction: default_radiation(),
        }
    }
}

/// Step-size control for the adaptive driver. Read-only during
/// integration. Defaults are the order-2 embedded-pair values the
/// driver was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepControlParameters {
    /// Smallest step length ever handed to the stepper [m].
    #[serde(default = "default_minimum_step_m")]
    pub minimum_step_m: f64,
    #[serde(default = "default_safety_factor")]
    pub safety_factor: f64,
    /// Exponent applied to error^2 when shrinking (per half, so -1/2
    /// means h ~ error^-1/2).
    #[serde(default = "default_power_shrink")]
    pub power_shrink: f64,
    #[serde(default = "default_power_grow")]
    pub power_grow: f64,
    /// Hardest allowed single-shrink factor.
    #[serde(default = "default_max_shrink_ratio")]
    pub max_shrink_ratio: f64,
    /// Hardest allowed single-growth factor.
    #[serde(default = "default_max_grow_ratio")]
    pub max_grow_ratio: f64,
    /// Fraction of the accumulated arc length below which further
    /// trial steps are pointless.
    #[serde(default = "default_smallest_fraction")]
    pub smallest_fraction: f64,
    /// Shrink-and-retry attempts per accepted step.
    #[serde(default = "default_max_trials")]
    pub max_trials: usize,
    /// Hard ceiling on accepted sub-steps per advance request.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_minimum_step_m() -> f64 {
    1.0e-9
}
fn default_safety_factor() -> f64 {
    0.9
}
fn default_power_shrink() -> f64 {
    -0.5
}
fn default_power_grow() -> f64 {
    -1.0 / 3.0
}
fn default_max_shrink_ratio() -> f64 {
    0.1
}
fn default_max_grow_ratio() -> f64 {
    5.0
}
fn default_smallest_fraction() -> f64 {
    1.0e-12
}
fn default_max_trials() -> usize {
    100
}
fn default_max_steps() -> usize {
    500
}

impl Default for StepControlParameters {
    fn default() -> Self {
        StepControlParameters {
            minimum_step_m: default_minimum_step_m(),
            safety_factor: default_safety_factor(),
            power_shrink: default_power_shrink(),
            power_grow: default_power_grow(),
            max_shrink_ratio: default_max_shrink_ratio(),
            max_grow_ratio: default_max_grow_ratio(),
            smallest_fraction: default_smallest_fraction(),
            max_trials: default_max_trials(),
            max_steps: default_max_steps(),
        }
    }
}

impl StepControlParameters {
    /// Reject configurations the driver cannot run with.
    pub fn validate(&self) -> TrackResult<()> {
        if !self.minimum_step_m.is_finite() || self.minimum_step_m <= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "minimum_step_m must be finite and > 0, got {}",
                self.minimum_step_m
            )));
        }
        if !self.safety_factor.is_finite()
            || self.safety_factor <= 0.0
            || self.safety_factor > 1.0
        {
            return Err(TrackError::ConfigError(format!(
                "safety_factor must be in (0, 1], got {}",
                self.safety_factor
            )));
        }
        if !self.power_shrink.is_finite() || self.power_shrink >= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "power_shrink must be finite and < 0, got {}",
                self.power_shrink
            )));
        }
        if !self.power_grow.is_finite() || self.power_grow >= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "power_grow must be finite and < 0, got {}",
                self.power_grow
            )));
        }
        if !self.max_shrink_ratio.is_finite()
            || self.max_shrink_ratio <= 0.0
            || self.max_shrink_ratio >= 1.0
        {
            return Err(TrackError::ConfigError(format!(
                "max_shrink_ratio must be in (0, 1), got {}",
                self.max_shrink_ratio
            )));
        }
        if !self.max_grow_ratio.is_finite() || self.max_grow_ratio <= 1.0 {
            return Err(TrackError::ConfigError(format!(
                "max_grow_ratio must be > 1, got {}",
                self.max_grow_ratio
            )));
        }
        if !self.smallest_fraction.is_finite() || self.smallest_fraction <= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "smallest_fraction must be finite and > 0, got {}",
                self.smallest_fraction
            )));
        }
        if self.max_trials == 0 {
            return Err(TrackError::ConfigError(
                "max_trials must be >= 1".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(TrackError::ConfigError(
                "max_steps must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TrackerConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> TrackResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }
}
