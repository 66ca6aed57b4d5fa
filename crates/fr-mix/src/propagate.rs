//! Averaged flavour transitions over astrophysical baselines.

use fr_core::errors::FrError;

use crate::composition::{normalize, Composition};
use crate::unitary::Unitary;

/// Flavour transition probabilities `P(a -> b) = sum_i |U_ai|^2 |U_bi|^2`.
pub fn transition_matrix(u: &Unitary) -> [[f64; 3]; 3] {
    let mut prob = [[0.0; 3]; 3];
    for (a, row) in prob.iter_mut().enumerate() {
        for (b, entry) in row.iter_mut().enumerate() {
            *entry = (0..3)
                .map(|i| u[(a, i)].norm_sqr() * u[(b, i)].norm_sqr())
                .sum();
        }
    }
    prob
}

/// Propagates a source composition through `u` and renormalises.
pub fn apply_mixing(source: Composition, u: &Unitary) -> Result<Composition, FrError> {
    let source = normalize(source)?;
    let prob = transition_matrix(u);
    let mut observed = [0.0; 3];
    for (a, weight) in source.iter().enumerate() {
        for (b, out) in observed.iter_mut().enumerate() {
            *out += prob[a][b] * weight;
        }
    }
    normalize(observed.map(|value| value.max(0.0)))
}
