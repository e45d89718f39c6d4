// ─────────────────────────────────────────────────────────────────────
// CRES Track Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Speed of light in vacuum (m/s).
pub const C_LIGHT: f64 = 2.99792458e8;

/// Vacuum permeability (H/m).
pub const MU0_SI: f64 = 1.2566370614e-6;

/// Vacuum permittivity (F/m).
pub const EPS0_SI: f64 = 8.8541878128e-12;

/// Elementary charge (C).
pub const Q_ELEMENTARY: f64 = 1.602176634e-19;

/// Electron rest mass (kg).
pub const M_ELECTRON: f64 = 9.1093837015e-31;

/// Electron rest energy (J) - 511 keV.
pub const E_REST_ELECTRON: f64 = M_ELECTRON * C_LIGHT * C_LIGHT;

/// Tritium endpoint energy (J) - 18.6 keV, the upper edge of the
/// beta-decay electron spectrum the tracker is built for.
pub const E_ENDPOINT_TRITIUM: f64 = 18.6e3 * Q_ELEMENTARY;
