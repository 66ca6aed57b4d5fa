//! Flavour compositions and the source-angle parametrisation.
//!
//! Source angles are `(sin^4 phi, cos 2psi)`. The composition is
//! `(sin^2 phi cos^2 psi, sin^2 phi sin^2 psi, cos^2 phi)`.

use fr_core::errors::{ErrorInfo, FrError};

/// Three-flavour composition `(e, mu, tau)`.
pub type Composition = [f64; 3];

/// Divides a composition by its sum.
pub fn normalize(vec: Composition) -> Result<Composition, FrError> {
    let sum: f64 = vec.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(FrError::Domain(
            ErrorInfo::new("composition-sum", "flavour composition must have a positive sum")
                .with_context("sum", sum.to_string()),
        ));
    }
    Ok([vec[0] / sum, vec[1] / sum, vec[2] / sum])
}

/// Maps source angles `(sin^4 phi, cos 2psi)` onto a normalised composition.
pub fn angles_to_composition(angles: [f64; 2]) -> Result<Composition, FrError> {
    let [sphi4, c2psi] = angles;
    if !(0.0..=1.0).contains(&sphi4) || !(-1.0..=1.0).contains(&c2psi) {
        return Err(FrError::Domain(
            ErrorInfo::new("source-angles", "source angles outside their domain")
                .with_context("s_phi4", sphi4.to_string())
                .with_context("c_2psi", c2psi.to_string()),
        ));
    }
    let sphi2 = sphi4.sqrt();
    let cpsi2 = 0.5 * (1.0 + c2psi);
    let spsi2 = 0.5 * (1.0 - c2psi);
    Ok([sphi2 * cpsi2, sphi2 * spsi2, 1.0 - sphi2])
}

/// Inverse of [`angles_to_composition`] after normalisation.
///
/// Not a bijection: a pure tau composition (`sin^2 phi = 0`) leaves `psi`
/// undetermined and maps onto the canonical branch `(0, 0)`.
pub fn composition_to_angles(composition: Composition) -> Result<[f64; 2], FrError> {
    let [e, _, tau] = normalize(composition)?;
    let sphi2 = 1.0 - tau;
    if sphi2 <= 0.0 {
        return Ok([0.0, 0.0]);
    }
    let c2psi = (2.0 * e / sphi2 - 1.0).clamp(-1.0, 1.0);
    Ok([sphi2 * sphi2, c2psi])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_zero_vector() {
        assert!(normalize([0.0, 0.0, 0.0]).unwrap_err().is_forbidden());
    }

    #[test]
    fn pure_tau_takes_canonical_branch() {
        assert_eq!(composition_to_angles([0.0, 0.0, 2.0]).unwrap(), [0.0, 0.0]);
        assert_eq!(angles_to_composition([0.0, 0.0]).unwrap(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn pion_source_angles() {
        let angles = composition_to_angles([1.0, 2.0, 0.0]).unwrap();
        assert!((angles[0] - 1.0).abs() < 1e-12);
        assert!((angles[1] + 1.0 / 3.0).abs() < 1e-12);
    }
}
