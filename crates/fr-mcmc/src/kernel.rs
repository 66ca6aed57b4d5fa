//! Affine-invariant ensemble sampler with the stretch move.
//!
//! Walkers are split into two halves updated in turn. Each proposal draws its
//! partner, stretch factor and acceptance variate from a stream keyed by
//! `(master seed, step, walker)`, and all proposals of a half are generated
//! before any is evaluated. The chain is therefore the same whether the
//! half is evaluated serially or on a thread pool.

use fr_core::errors::{ErrorInfo, FrError};
use fr_core::{LogDensity, RngHandle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chain::Chain;
use crate::config::EnsembleConfig;
use crate::determinism::walker_step_seed;
use crate::metrics::Diagnostics;

/// Result of an ensemble run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRun {
    /// Recorded samples, walker-major.
    pub chain: Chain,
    /// Log-posterior of every recorded sample, in chain order.
    pub ln_prob: Vec<f64>,
    /// Walker positions after the last step.
    pub final_positions: Vec<Vec<f64>>,
    /// Acceptance statistics.
    pub diagnostics: Diagnostics,
}

trait Batch {
    fn evaluate(&mut self, points: &[Vec<f64>]) -> Result<Vec<f64>, FrError>;
}

struct Serial<'a, D: ?Sized> {
    density: &'a mut D,
}

impl<D: LogDensity + ?Sized> Batch for Serial<'_, D> {
    fn evaluate(&mut self, points: &[Vec<f64>]) -> Result<Vec<f64>, FrError> {
        points.iter().map(|theta| self.density.ln_density(theta)).collect()
    }
}

struct Parallel<'a, F> {
    pool: rayon::ThreadPool,
    factory: &'a F,
}

impl<D, F> Batch for Parallel<'_, F>
where
    D: LogDensity,
    F: Fn() -> Result<D, FrError> + Send + Sync,
{
    fn evaluate(&mut self, points: &[Vec<f64>]) -> Result<Vec<f64>, FrError> {
        let factory = self.factory;
        self.pool.install(|| {
            points
                .par_iter()
                .map_init(factory, |density, theta| match density {
                    Ok(density) => density.ln_density(theta),
                    Err(err) => Err(err.clone()),
                })
                .collect()
        })
    }
}

/// Runs the sampler evaluating `density` on the calling thread.
pub fn run<D: LogDensity + ?Sized>(
    density: &mut D,
    p0: Vec<Vec<f64>>,
    config: &EnsembleConfig,
) -> Result<EnsembleRun, FrError> {
    let dimension = density.dimension();
    sample(&mut Serial { density }, dimension, p0, config)
}

/// Runs the sampler on a pool of `config.threads` workers.
///
/// Each worker builds its own density from `factory`; the resulting chain is
/// identical to [`run`] with the same seed.
pub fn run_parallel<D, F>(factory: F, p0: Vec<Vec<f64>>, config: &EnsembleConfig) -> Result<EnsembleRun, FrError>
where
    D: LogDensity,
    F: Fn() -> Result<D, FrError> + Send + Sync,
{
    let dimension = factory()?.dimension();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()
        .map_err(|err| FrError::Configuration(ErrorInfo::new("thread-pool", err.to_string())))?;
    sample(
        &mut Parallel {
            pool,
            factory: &factory,
        },
        dimension,
        p0,
        config,
    )
}

fn check_positions(p0: &[Vec<f64>], nwalkers: usize, ndim: usize) -> Result<(), FrError> {
    let bad = p0.len() != nwalkers || p0.iter().any(|row| row.len() != ndim);
    if bad {
        return Err(FrError::Shape(
            ErrorInfo::new("walker-positions", "initial positions must be nwalkers x ndim")
                .with_context("nwalkers", nwalkers.to_string())
                .with_context("ndim", ndim.to_string())
                .with_context("rows", p0.len().to_string()),
        ));
    }
    Ok(())
}

fn sample(
    batch: &mut dyn Batch,
    ndim: usize,
    p0: Vec<Vec<f64>>,
    config: &EnsembleConfig,
) -> Result<EnsembleRun, FrError> {
    config.validate(ndim)?;
    check_positions(&p0, config.nwalkers, ndim)?;

    let nwalkers = config.nwalkers;
    let half = nwalkers / 2;
    let master = config.seed_policy.master_seed;
    let a = config.stretch;
    let total = config.burnin + config.nsteps;
    info!(
        nwalkers,
        ndim,
        burnin = config.burnin,
        nsteps = config.nsteps,
        threads = config.threads,
        "starting ensemble run"
    );

    let mut positions = p0;
    let mut ln_prob = batch.evaluate(&positions)?;
    let mut evaluations = nwalkers;
    let stuck = ln_prob.iter().filter(|value| !value.is_finite()).count();
    if stuck > 0 {
        warn!(walkers = stuck, "initial walkers with non-finite log-posterior");
    }

    let mut histories: Vec<Vec<Vec<f64>>> = vec![Vec::with_capacity(config.nsteps); nwalkers];
    let mut ln_histories: Vec<Vec<f64>> = vec![Vec::with_capacity(config.nsteps); nwalkers];
    let mut accepted = vec![0usize; nwalkers];
    let mut rejections = 0usize;

    for step in 0..total {
        let recording = step >= config.burnin;
        for (start, other) in [(0, half), (half, 0)] {
            let mut proposals = Vec::with_capacity(half);
            let mut variates = Vec::with_capacity(half);
            for walker in start..start + half {
                let mut rng = RngHandle::from_seed(walker_step_seed(master, step, walker));
                let partner = &positions[other + rng.index(half)];
                let z = ((a - 1.0) * rng.uniform() + 1.0).powi(2) / a;
                let proposal: Vec<f64> = positions[walker]
                    .iter()
                    .zip(partner)
                    .map(|(x, c)| c + z * (x - c))
                    .collect();
                proposals.push(proposal);
                variates.push(((ndim as f64 - 1.0) * z.ln(), rng.uniform().ln()));
            }

            let proposed_ln_prob = batch.evaluate(&proposals)?;
            evaluations += half;
            for (offset, ((proposal, new_ln_prob), (ln_q, ln_r))) in proposals
                .into_iter()
                .zip(proposed_ln_prob)
                .zip(variates)
                .enumerate()
            {
                let walker = start + offset;
                if recording && new_ln_prob == f64::NEG_INFINITY {
                    rejections += 1;
                }
                if ln_q + new_ln_prob - ln_prob[walker] > ln_r {
                    positions[walker] = proposal;
                    ln_prob[walker] = new_ln_prob;
                    if recording {
                        accepted[walker] += 1;
                    }
                }
            }
        }
        if recording {
            for walker in 0..nwalkers {
                histories[walker].push(positions[walker].clone());
                ln_histories[walker].push(ln_prob[walker]);
            }
        }
        debug!(step, burn_in = !recording, "ensemble step complete");
    }

    let diagnostics = Diagnostics::from_counts(accepted, config.nsteps, rejections, evaluations);
    info!(
        samples = nwalkers * config.nsteps,
        mean_acceptance = diagnostics.mean_acceptance,
        rejections = diagnostics.rejections,
        "ensemble run finished"
    );
    Ok(EnsembleRun {
        chain: Chain::from_walkers(ndim, histories),
        ln_prob: ln_histories.into_iter().flatten().collect(),
        final_positions: positions,
        diagnostics,
    })
}
