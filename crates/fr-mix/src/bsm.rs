//! Energy- and dimension-dependent new-physics mixing.
//!
//! The flavour Hamiltonian is
//! `H = U M U^dagger / 2E + E^(d-3) V S V^dagger` with
//! `M = diag(0, dm21^2, dm3l^2)` and `S = diag(0, Lambda / 100, Lambda)`.
//! Its eigenvectors form the effective propagation matrix.

use fr_core::errors::{ErrorInfo, FrError};
use nalgebra::{Complex, Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};

use crate::unitary::{angles_to_unitary, check_unitarity, MixingAngles, Unitary, UNITARITY_EPSILON};

const EIGEN_MAX_ITERATIONS: usize = 1000;

/// Which new-physics mixing angles are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MixingMode {
    /// All four angles come from `theta`.
    #[default]
    Free,
    /// Mixing is held at [`MixingAngles::BIMAXIMAL`].
    Fixed,
    /// Only `s23^2` floats; the rest are bi-maximal.
    FixedAlmost,
}

impl MixingMode {
    /// Number of `theta` entries consumed by the mixing angles.
    pub fn arity(&self) -> usize {
        match self {
            MixingMode::Free => 4,
            MixingMode::Fixed => 0,
            MixingMode::FixedAlmost => 1,
        }
    }
}

/// Static physics inputs of the new-physics Hamiltonian.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhysics {
    /// Operator dimension `d`.
    pub dimension: u32,
    /// Mass-squared splittings in GeV^2.
    pub mass_eigenvalues: [f64; 2],
    /// Standard mixing matrix.
    pub sm_u: Unitary,
    /// How the new-physics angles are obtained.
    pub mixing: MixingMode,
    /// `Some(log10 Lambda)` when the scale is held fixed.
    pub fixed_log_scale: Option<f64>,
}

/// New-physics angles and `log10 Lambda` resolved from a sampled vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTheta {
    /// New-physics mixing angles.
    pub angles: MixingAngles,
    /// log10 of the new-physics scale.
    pub log_scale: f64,
}

impl NewPhysics {
    /// Splits `theta` (mixing angles then log-scale, in set order) according
    /// to the mixing mode and the fixed-scale toggle.
    pub fn resolve(&self, theta: &[f64]) -> Result<ResolvedTheta, FrError> {
        let expected = self.mixing.arity() + usize::from(self.fixed_log_scale.is_none());
        if theta.len() != expected {
            return Err(FrError::Shape(
                ErrorInfo::new("bsm-theta", "new-physics vector has the wrong length")
                    .with_context("expected", expected.to_string())
                    .with_context("received", theta.len().to_string()),
            ));
        }
        let (angle_part, rest) = theta.split_at(self.mixing.arity());
        let angles = match self.mixing {
            MixingMode::Free => MixingAngles::from_slice(angle_part)?,
            MixingMode::Fixed => MixingAngles::BIMAXIMAL,
            MixingMode::FixedAlmost => MixingAngles {
                s23_2: angle_part[0],
                ..MixingAngles::BIMAXIMAL
            },
        };
        let log_scale = match self.fixed_log_scale {
            Some(value) => value,
            None => rest[0],
        };
        Ok(ResolvedTheta { angles, log_scale })
    }

    /// Propagation matrix at `energy` for the sampled new-physics vector.
    pub fn unitary(&self, theta: &[f64], energy: f64) -> Result<Unitary, FrError> {
        let resolved = self.resolve(theta)?;
        build_new_physics_unitary(
            &resolved.angles,
            self.dimension,
            energy,
            self.mass_eigenvalues,
            &self.sm_u,
            10f64.powf(resolved.log_scale),
        )
    }
}

fn diagonal(entries: [f64; 3]) -> Unitary {
    Matrix3::from_diagonal(&Vector3::new(
        Complex::new(entries[0], 0.0),
        Complex::new(entries[1], 0.0),
        Complex::new(entries[2], 0.0),
    ))
}

/// Diagonalises the new-physics Hamiltonian and returns its eigenvector matrix.
///
/// Fails with a domain error when the Hamiltonian is degenerate or non-finite,
/// or when the eigenvectors are not unitary within [`UNITARITY_EPSILON`].
pub fn build_new_physics_unitary(
    angles: &MixingAngles,
    dimension: u32,
    energy: f64,
    mass_eigenvalues: [f64; 2],
    sm_u: &Unitary,
    scale: f64,
) -> Result<Unitary, FrError> {
    if !(energy.is_finite() && energy > 0.0) {
        return Err(FrError::Domain(
            ErrorInfo::new("bsm-energy", "energy must be positive and finite")
                .with_context("energy", energy.to_string()),
        ));
    }
    let mass = diagonal([0.0, mass_eigenvalues[0], mass_eigenvalues[1]]);
    let sm_ham = (sm_u * mass * sm_u.adjoint()) * Complex::new(1.0 / (2.0 * energy), 0.0);

    let np_u = angles_to_unitary(angles)?;
    let scale_matrix = diagonal([0.0, scale / 100.0, scale]);
    let weight = energy.powi(dimension as i32 - 3);
    let bsm_term = (np_u * scale_matrix * np_u.adjoint()) * Complex::new(weight, 0.0);

    let u = hamiltonian_eigenvectors(sm_ham + bsm_term)?;
    check_unitarity(&u, UNITARITY_EPSILON)?;
    Ok(u)
}

fn hamiltonian_eigenvectors(hamiltonian: Unitary) -> Result<Unitary, FrError> {
    let finite = hamiltonian
        .iter()
        .all(|entry| entry.re.is_finite() && entry.im.is_finite());
    let norm = hamiltonian.iter().map(|entry| entry.norm_sqr().sqrt()).fold(0.0, f64::max);
    if !finite || !(norm.is_finite() && norm > 0.0) {
        return Err(FrError::Domain(
            ErrorInfo::new("hamiltonian-norm", "hamiltonian is zero or non-finite")
                .with_context("norm", norm.to_string()),
        ));
    }
    let scaled = hamiltonian.map(|entry| entry / norm);
    SymmetricEigen::try_new(scaled, f64::EPSILON, EIGEN_MAX_ITERATIONS)
        .map(|eigen| eigen.eigenvectors)
        .ok_or_else(|| {
            FrError::Domain(ErrorInfo::new(
                "hamiltonian-eigen",
                "hamiltonian diagonalisation did not converge",
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unitary::{standard_unitary, MASS_EIGENVALUES};

    fn physics(mixing: MixingMode, fixed_log_scale: Option<f64>) -> NewPhysics {
        NewPhysics {
            dimension: 3,
            mass_eigenvalues: MASS_EIGENVALUES,
            sm_u: standard_unitary(),
            mixing,
            fixed_log_scale,
        }
    }

    #[test]
    fn resolve_respects_modes() {
        let fixed = physics(MixingMode::Fixed, None).resolve(&[-30.0]).unwrap();
        assert_eq!(fixed.angles, MixingAngles::BIMAXIMAL);
        assert_eq!(fixed.log_scale, -30.0);

        let almost = physics(MixingMode::FixedAlmost, None)
            .resolve(&[0.3, -28.0])
            .unwrap();
        assert_eq!(almost.angles.s23_2, 0.3);
        assert_eq!(almost.angles.s12_2, 0.5);

        let fixed_scale = physics(MixingMode::Free, Some(-25.0))
            .resolve(&[0.1, 0.9, 0.2, 1.0])
            .unwrap();
        assert_eq!(fixed_scale.log_scale, -25.0);
        assert_eq!(fixed_scale.angles.dcp, 1.0);
    }

    #[test]
    fn resolve_rejects_wrong_length() {
        let err = physics(MixingMode::Free, None).resolve(&[0.1, 0.2]).unwrap_err();
        assert!(matches!(err, FrError::Shape(_)));
    }

    #[test]
    fn tiny_scale_recovers_standard_mixing_magnitudes() {
        let u = physics(MixingMode::Free, None)
            .unitary(&[0.5, 0.5, 0.5, 0.0, -60.0], 1e5)
            .unwrap();
        let sm = standard_unitary();
        for flavour in 0..3 {
            let mut expected: Vec<f64> = (0..3).map(|i| sm[(flavour, i)].norm_sqr()).collect();
            let mut found: Vec<f64> = (0..3).map(|i| u[(flavour, i)].norm_sqr()).collect();
            expected.sort_by(f64::total_cmp);
            found.sort_by(f64::total_cmp);
            for (a, b) in expected.iter().zip(&found) {
                assert!((a - b).abs() < 1e-6, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn non_finite_scale_is_forbidden() {
        let err = physics(MixingMode::Free, None)
            .unitary(&[0.5, 0.5, 0.5, 0.0, 400.0], 1e5)
            .unwrap_err();
        assert!(err.is_forbidden());
    }
}
