//! Standard three-flavour mixing matrices.

use fr_core::errors::{ErrorInfo, FrError};
use nalgebra::{Complex, Matrix3};
use serde::{Deserialize, Serialize};

/// Complex 3x3 mixing matrix, rows flavour, columns mass state.
pub type Unitary = Matrix3<Complex<f64>>;

/// Default tolerance for `U U^dagger = I`.
pub const UNITARITY_EPSILON: f64 = 1e-9;

/// Mass-squared splittings `(dm21^2, dm3l^2)` in GeV^2.
pub const MASS_EIGENVALUES: [f64; 2] = [7.40e-23, 2.494e-21];

/// Mixing parametrised as `(s12^2, c13^4, s23^2, delta_cp)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixingAngles {
    /// sin^2 theta_12.
    pub s12_2: f64,
    /// cos^4 theta_13.
    pub c13_4: f64,
    /// sin^2 theta_23.
    pub s23_2: f64,
    /// CP phase in radians.
    pub dcp: f64,
}

impl MixingAngles {
    /// Global-fit best point (normal ordering).
    pub const STANDARD: MixingAngles = MixingAngles {
        s12_2: 0.307,
        c13_4: (1.0 - 0.02206) * (1.0 - 0.02206),
        s23_2: 0.538,
        dcp: 234.0 * std::f64::consts::PI / 180.0,
    };

    /// Canonical bi-maximal mixing used when mixing is held fixed.
    pub const BIMAXIMAL: MixingAngles = MixingAngles {
        s12_2: 0.5,
        c13_4: 1.0 - 1e-6,
        s23_2: 0.5,
        dcp: 0.0,
    };

    /// Reads the four angles from a slice in `(s12^2, c13^4, s23^2, dcp)` order.
    pub fn from_slice(values: &[f64]) -> Result<Self, FrError> {
        match values {
            [s12_2, c13_4, s23_2, dcp] => Ok(Self {
                s12_2: *s12_2,
                c13_4: *c13_4,
                s23_2: *s23_2,
                dcp: *dcp,
            }),
            _ => Err(FrError::Shape(
                ErrorInfo::new("mixing-angles", "expected four mixing parameters")
                    .with_context("received", values.len().to_string()),
            )),
        }
    }
}

/// Builds `R23 * U13(delta) * R12` from the four angle parameters.
pub fn angles_to_unitary(angles: &MixingAngles) -> Result<Unitary, FrError> {
    let unit = 0.0..=1.0;
    if !unit.contains(&angles.s12_2) || !unit.contains(&angles.c13_4) || !unit.contains(&angles.s23_2)
    {
        return Err(FrError::Domain(
            ErrorInfo::new("mixing-domain", "mixing magnitudes must lie in [0, 1]")
                .with_context("s12_2", angles.s12_2.to_string())
                .with_context("c13_4", angles.c13_4.to_string())
                .with_context("s23_2", angles.s23_2.to_string()),
        ));
    }
    let s12 = angles.s12_2.sqrt();
    let c12 = (1.0 - angles.s12_2).sqrt();
    let c13_2 = angles.c13_4.sqrt();
    let c13 = c13_2.sqrt();
    let s13 = (1.0 - c13_2).sqrt();
    let s23 = angles.s23_2.sqrt();
    let c23 = (1.0 - angles.s23_2).sqrt();

    let re = |x: f64| Complex::new(x, 0.0);
    let zero = re(0.0);
    let one = re(1.0);
    let phase = Complex::new(angles.dcp.cos(), angles.dcp.sin());

    let r23 = Matrix3::new(one, zero, zero, zero, re(c23), re(s23), zero, re(-s23), re(c23));
    let u13 = Matrix3::new(
        re(c13),
        zero,
        phase.conj() * s13,
        zero,
        one,
        zero,
        -phase * s13,
        zero,
        re(c13),
    );
    let r12 = Matrix3::new(re(c12), re(s12), zero, re(-s12), re(c12), zero, zero, zero, one);
    Ok(r23 * u13 * r12)
}

/// Mixing matrix at the global-fit best point.
pub fn standard_unitary() -> Unitary {
    // The best-fit magnitudes are inside [0, 1], so the builder cannot fail.
    angles_to_unitary(&MixingAngles::STANDARD).unwrap_or_else(|_| Unitary::identity())
}

/// Largest absolute deviation of `U U^dagger` from the identity.
pub fn unitarity_deviation(u: &Unitary) -> f64 {
    let product = u * u.adjoint();
    let mut worst: f64 = 0.0;
    for row in 0..3 {
        for col in 0..3 {
            let target = if row == col { 1.0 } else { 0.0 };
            let entry = product[(row, col)];
            let dev = (entry - Complex::new(target, 0.0)).norm_sqr().sqrt();
            if !dev.is_finite() {
                return f64::INFINITY;
            }
            worst = worst.max(dev);
        }
    }
    worst
}

/// Fails with a domain error when `u` is not unitary within `epsilon`.
pub fn check_unitarity(u: &Unitary, epsilon: f64) -> Result<(), FrError> {
    let deviation = unitarity_deviation(u);
    if deviation > epsilon {
        return Err(FrError::Domain(
            ErrorInfo::new("unitarity", "mixing matrix is not unitary")
                .with_context("deviation", format!("{deviation:e}"))
                .with_context("epsilon", format!("{epsilon:e}")),
        ));
    }
    Ok(())
}
