// ─────────────────────────────────────────────────────────────────────
// CRES Track Core — Elliptic
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Complete elliptic integrals K(m) and E(m).
//!
//! Abramowitz & Stegun polynomial approximations 17.3.34 and 17.3.36,
//! parameter m = k^2 with 0 <= m < 1 (scipy convention). The loop
//! field evaluator calls both at the same argument, so the combined
//! form is the primary entry point.

/// Complete elliptic integrals (K(m), E(m)) evaluated together.
///
/// Parameter m = k^2 with 0 <= m < 1 for K; E additionally admits
/// m = 1 where it equals 1 exactly. |error| < 2e-8 across the range.
pub fn ellipke(m: f64) -> (f64, f64) {
    (ellipk(m), ellipe(m))
}

/// Complete elliptic integral of the first kind K(m), m = k^2 in [0, 1).
pub fn ellipk(m: f64) -> f64 {
    debug_assert!(
        (0.0..1.0).contains(&m),
        "ellipk requires 0 <= m < 1, got {m}"
    );

    let m1 = 1.0 - m;
    let ln_inv_m1 = -m1.ln();

    // A&S 17.3.34
    let poly_a = 1.386_294_361_12
        + m1 * (0.096_663_442_59
            + m1 * (0.035_900_923_83 + m1 * (0.037_425_637_13 + m1 * 0.014_511_962_12)));
    let poly_b = 0.5
        + m1 * (0.124_985_935_97
            + m1 * (0.068_802_485_76 + m1 * (0.033_283_553_46 + m1 * 0.004_417_870_12)));

    poly_a + poly_b * ln_inv_m1
}

/// Complete elliptic integral of the second kind E(m), m = k^2 in [0, 1].
pub fn ellipe(m: f64) -> f64 {
    debug_assert!(
        (0.0..=1.0).contains(&m),
        "ellipe requires 0 <= m <= 1, got {m}"
    );

    if m >= 1.0 {
        return 1.0;
    }

    let m1 = 1.0 - m;
    let ln_inv_m1 = -m1.ln();

    // A&S 17.3.36
    let poly_a = 1.0
        + m1 * (0.443_251_414_63
            + m1 * (0.062_606_012_20 + m1 * (0.047_573_835_46 + m1 * 0.017_365_064_51)));
    let poly_b = m1
        * (0.249_983_683_10
            + m1 * (0.092_001_800_37 + m1 * (0.040_696_975_26 + m1 * 0.005_264_496_39)));

    poly_a + poly_b * ln_inv_m1
}
