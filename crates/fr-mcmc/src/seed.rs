//! Initial walker positions.

use fr_core::{Parameter, ParameterSet, RngHandle};
use rand_distr::{Distribution, Normal};

use crate::config::SeedType;

const MAX_RESAMPLE: usize = 100;

/// Draws each coordinate uniformly from the parameter's seed interval.
pub fn flat_seed(params: &ParameterSet, nwalkers: usize, rng: &mut RngHandle) -> Vec<Vec<f64>> {
    let seeds = params.seeds();
    (0..nwalkers)
        .map(|_| {
            seeds
                .iter()
                .map(|[lo, hi]| lo + (hi - lo) * rng.uniform())
                .collect()
        })
        .collect()
}

fn gaussian_coordinate(param: &Parameter, rng: &mut RngHandle) -> f64 {
    let [lo, hi] = param.ranges();
    let Ok(ball) = Normal::new(param.value(), param.std()) else {
        return param.value().clamp(lo, hi);
    };
    let mut draw = param.value();
    for _ in 0..MAX_RESAMPLE {
        draw = ball.sample(&mut *rng);
        if param.contains(draw) {
            return draw;
        }
    }
    draw.clamp(lo, hi)
}

/// Draws a Gaussian ball around the current values using each parameter's
/// width. Out-of-range draws are resampled a bounded number of times and
/// then clamped into range.
pub fn gaussian_seed(params: &ParameterSet, nwalkers: usize, rng: &mut RngHandle) -> Vec<Vec<f64>> {
    (0..nwalkers)
        .map(|_| params.iter().map(|param| gaussian_coordinate(param, rng)).collect())
        .collect()
}

/// Dispatches on the configured seed type.
pub fn initial_positions(
    seed_type: SeedType,
    params: &ParameterSet,
    nwalkers: usize,
    rng: &mut RngHandle,
) -> Vec<Vec<f64>> {
    match seed_type {
        SeedType::Uniform => flat_seed(params, nwalkers, rng),
        SeedType::Gaussian => gaussian_seed(params, nwalkers, rng),
    }
}
