//! Scores comparing an observed composition with a measurement.

use std::f64::consts::PI;

use fr_mix::Composition;

/// Constant shift applied to the Gaussian score.
pub const GAUSSIAN_OFFSET: f64 = -320.0;

/// Log of a trivariate normal density with covariance `sigma * I`, shifted
/// by `offset`.
pub fn multi_gaussian(observed: Composition, reference: Composition, sigma: f64, offset: f64) -> f64 {
    let chi2: f64 = observed
        .iter()
        .zip(reference.iter())
        .map(|(obs, mean)| (obs - mean).powi(2) / sigma)
        .sum();
    -0.5 * (3.0 * (2.0 * PI).ln() + 3.0 * sigma.ln() + chi2) + offset
}
