//! Magnetic field evaluators.
//!
//! A closed set of variants behind one `field_at` entry point: a
//! uniform field, an analytic coil-pair trap evaluated with complete
//! elliptic integrals, and a measured field map interpolated over its
//! eight nearest samples. All evaluators are pure functions of
//! position and are freely shared read-only after construction.

use cres_math::elliptic::ellipke;
use cres_math::kdtree::KdTree3;
use cres_math::vec3;
use cres_types::config::FieldModelConfig;
use cres_types::constants::MU0_SI;
use cres_types::error::{TrackError, TrackResult};
use cres_types::state::MeasuredFieldPoint;

use crate::field_map::FieldMapLoader;

/// Fraction of the coil radius below which a point counts as on-axis
/// and the closed-form loop limit replaces the elliptic formulas.
const ON_AXIS_FRACTION: f64 = 1e-10;

/// Neighbour count for measured-map interpolation.
const MAP_NEIGHBOURS: usize = 8;

/// The active field model. Dispatch is by variant, not inheritance.
pub enum MagneticField {
    Uniform(UniformField),
    CoilPair(CoilPairField),
    FieldMap(MappedField),
}

impl MagneticField {
    /// Construct the evaluator a configuration names. The field-map
    /// variant performs its one-time load and tree build here.
    pub fn from_config(config: &FieldModelConfig) -> TrackResult<Self> {
        match config {
            FieldModelConfig::Uniform { b_t } => {
                Ok(MagneticField::Uniform(UniformField::new(*b_t)))
            }
            FieldModelConfig::CoilPair {
                radius_m,
                current_a,
                z_offset_m,
                background_t,
            } => Ok(MagneticField::CoilPair(CoilPairField::new(
                *radius_m,
                *current_a,
                *z_offset_m,
                *background_t,
            )?)),
            FieldModelConfig::FieldMap {
                path,
                length_scale_m,
                field_scale_t,
            } => {
                let loader = FieldMapLoader::new(path, *length_scale_m, *field_scale_t)?;
                let points = loader.load()?;
                Ok(MagneticField::FieldMap(MappedField::new(points)?))
            }
        }
    }

    /// Magnetic field vector [T] at `position_m`.
    pub fn field_at(&self, position_m: [f64; 3]) -> TrackResult<[f64; 3]> {
        match self {
            MagneticField::Uniform(f) => Ok(f.field_at(position_m)),
            MagneticField::CoilPair(f) => Ok(f.field_at(position_m)),
            MagneticField::FieldMap(f) => f.field_at(position_m),
        }
    }
}

/// Constant field vector everywhere.
pub struct UniformField {
    b_t: [f64; 3],
}

impl UniformField {
    pub fn new(b_t: [f64; 3]) -> Self {
        UniformField { b_t }
    }

    pub fn field_at(&self, _position_m: [f64; 3]) -> [f64; 3] {
        self.b_t
    }
}

/// Axisymmetric trap made of two coaxial current loops at z = +/-
/// `z_offset_m`, superimposed on a uniform background field.
/// `z_offset_m = 0` degenerates to a single-coil harmonic trap.
pub struct CoilPairField {
    radius_m: f64,
    z_offset_m: f64,
    background_t: [f64; 3],
    /// mu0 * I / (2 R), the single-loop centre field [T].
    b_central_t: f64,
}

impl CoilPairField {
    pub fn new(
        radius_m: f64,
        current_a: f64,
        z_offset_m: f64,
        background_t: [f64; 3],
    ) -> TrackResult<Self> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "coil radius_m must be finite and > 0, got {radius_m}"
            )));
        }
        if !current_a.is_finite() || current_a == 0.0 {
            return Err(TrackError::ConfigError(format!(
                "coil current_a must be finite and non-zero, got {current_a}"
            )));
        }
        if !z_offset_m.is_finite() || z_offset_m < 0.0 {
            return Err(TrackError::ConfigError(format!(
                "coil z_offset_m must be finite and >= 0, got {z_offset_m}"
            )));
        }
        if background_t.iter().any(|v| !v.is_finite()) {
            return Err(TrackError::ConfigError(
                "coil background_t components must be finite".to_string(),
            ));
        }
        Ok(CoilPairField {
            radius_m,
            z_offset_m,
            background_t,
            b_central_t: current_a * MU0_SI / (2.0 * radius_m),
        })
    }

    pub fn field_at(&self, position_m: [f64; 3]) -> [f64; 3] {
        let mut b = vec3::add(self.background_t, self.evaluate_coil(position_m, 1.0));
        if self.z_offset_m != 0.0 {
            b = vec3::add(b, self.evaluate_coil(position_m, -1.0));
        }
        b
    }

    /// Field of the single loop sitting at `z_sign * z_offset_m`.
    fn evaluate_coil(&self, position_m: [f64; 3], z_sign: f64) -> [f64; 3] {
        let [x, y, z] = position_m;
        let rad = (x * x + y * y).sqrt();
        let z_rel = z - z_sign * self.z_offset_m;

        if rad / self.radius_m < ON_AXIS_FRACTION {
            // Closed-form on-axis limit; the elliptic form is 0/0 here.
            let r2 = self.radius_m * self.radius_m;
            let b_z = self.b_central_t * r2 * self.radius_m
                / (r2 + z_rel * z_rel).powf(1.5);
            return [0.0, 0.0, b_z];
        }

        let rad_norm = rad / self.radius_m;
        let rad_norm2 = rad_norm * rad_norm;
        let z_norm2 = (z_rel / self.radius_m) * (z_rel / self.radius_m);

        let alpha = (1.0 + rad_norm) * (1.0 + rad_norm) + z_norm2;
        let root_alpha_pi = alpha.sqrt() * std::f64::consts::PI;
        let m = 4.0 * rad_norm / alpha; // m = k^2 of the loop geometry
        let (int_k, int_e) = ellipke(m);
        let gamma = alpha - 4.0 * rad_norm;

        let b_r = self.b_central_t
            * (int_e * ((1.0 + rad_norm2 + z_norm2) / gamma) - int_k)
            / root_alpha_pi
            * (z_rel / rad);
        let b_z = self.b_central_t
            * (int_e * ((1.0 - rad_norm2 - z_norm2) / gamma) + int_k)
            / root_alpha_pi;

        [b_r * x / rad, b_r * y / rad, b_z]
    }
}

/// Measured field map interpolated by inverse-distance weighting over
/// the eight nearest samples.
#[derive(Debug)]
pub struct MappedField {
    tree: KdTree3,
}

impl MappedField {
    /// Build the spatial index over the loaded samples. A map with
    /// zero points is a broken setup, not a recoverable condition.
    pub fn new(points: Vec<MeasuredFieldPoint>) -> TrackResult<Self> {
        if points.is_empty() {
            return Err(TrackError::ConfigError(
                "field map produced zero sample points".to_string(),
            ));
        }
        Ok(MappedField {
            tree: KdTree3::build(points),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.tree.len()
    }

    pub fn field_at(&self, position_m: [f64; 3]) -> TrackResult<[f64; 3]> {
        let neighbours = self.tree.nearest(position_m, MAP_NEIGHBOURS)?;

        // Exact hit or a one-point map: the weighting below would
        // degenerate, the sample value itself is the answer.
        if neighbours[0].distance_m == 0.0 || neighbours.len() == 1 {
            return Ok(neighbours[0].point.field_t);
        }

        let sum_d: f64 = neighbours.iter().map(|n| n.distance_m).sum();
        let mut field = [0.0, 0.0, 0.0];
        let mut weight_sum = 0.0;
        for n in &neighbours {
            let w = 1.0 - n.distance_m / sum_d;
            field = vec3::axpy(field, w, n.point.field_t);
            weight_sum += w;
        }
        Ok(vec3::scale(field, 1.0 / weight_sum))
    }
}
