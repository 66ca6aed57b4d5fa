//! Skilling nested sampling with random-walk constrained replacement.

use fr_core::errors::{ErrorInfo, FrError};
use fr_core::{derive_substream_seed, LogDensity, RngHandle};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::{load_state, write_dead, write_stats, write_state, ArtifactPaths, NestedStats};
use crate::config::NestConfig;
use crate::cube::{CubeDensity, UnitCube};
use crate::state::{DeadPoint, LivePoint, NestedState};

const INITIAL_STEP: f64 = 0.1;
const MIN_STEP: f64 = 1e-9;
const LIVE_STREAM: u64 = 0x11FE_0000_0000_0000;

/// Outcome of a nested-sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedResult {
    /// Log-evidence.
    pub ln_evidence: f64,
    /// `sqrt(H / N)`.
    pub ln_evidence_error: f64,
    /// Information gain `H` (nats).
    pub information: f64,
    /// Iterations performed, including those before a resume.
    pub iterations: usize,
    /// Likelihood evaluations.
    pub evaluations: usize,
    /// Weighted posterior samples (dead points then the final live set).
    pub samples: Vec<DeadPoint>,
}

fn initial_state<D: LogDensity>(
    target: &mut CubeDensity<D>,
    config: &NestConfig,
) -> Result<NestedState, FrError> {
    let ndim = target.cube().dimension();
    let mut live = Vec::with_capacity(config.live_points);
    for index in 0..config.live_points {
        let seed = derive_substream_seed(config.seed ^ LIVE_STREAM, index as u64);
        let mut rng = RngHandle::from_seed(seed);
        let cube: Vec<f64> = (0..ndim).map(|_| rng.uniform()).collect();
        let ln_likelihood = target.ln_likelihood(&cube)?;
        live.push(LivePoint { cube, ln_likelihood });
    }
    Ok(NestedState {
        ndim,
        iteration: 0,
        live,
        ln_evidence: f64::NEG_INFINITY,
        information: 0.0,
        ln_volume: 0.0,
        step: INITIAL_STEP,
        evaluations: config.live_points,
        dead: Vec::new(),
    })
}

fn resumed_state(path: &std::path::Path, config: &NestConfig, ndim: usize) -> Result<NestedState, FrError> {
    let state = load_state(path)?;
    if state.ndim != ndim || state.live.len() != config.live_points {
        return Err(FrError::Configuration(
            ErrorInfo::new("resume-mismatch", "saved state does not match this run")
                .with_context("ndim", ndim.to_string())
                .with_context("saved_ndim", state.ndim.to_string())
                .with_context("live_points", config.live_points.to_string())
                .with_context("saved_live_points", state.live.len().to_string())
                .with_hint("disable resume or remove the stale resume file"),
        ));
    }
    Ok(state)
}

fn iterate<D: LogDensity>(
    state: &mut NestedState,
    target: &mut CubeDensity<D>,
    config: &NestConfig,
    ln_shell: f64,
) -> Result<(), FrError> {
    let n = state.live.len();
    let (worst, threshold) = state.worst();
    let theta = target.cube().transform(&state.live[worst].cube)?;
    let ln_weight = ln_shell + state.ln_volume + threshold;
    state.accumulate(ln_weight, threshold);
    state.dead.push(DeadPoint {
        theta,
        ln_likelihood: threshold,
        ln_weight,
    });
    state.ln_volume -= 1.0 / n as f64;

    let mut rng = RngHandle::from_seed(derive_substream_seed(config.seed, state.iteration as u64));
    let mut start = rng.index(n - 1);
    if start >= worst {
        start += 1;
    }
    let mut current = state.live[start].clone();
    let (mut accepted, mut rejected) = (0usize, 0usize);
    for _ in 0..config.walk_steps {
        let proposal: Vec<f64> = current
            .cube
            .iter()
            .map(|x| {
                let z: f64 = StandardNormal.sample(&mut rng);
                x + state.step * z
            })
            .collect();
        if proposal.iter().any(|x| !(0.0..=1.0).contains(x)) {
            rejected += 1;
            continue;
        }
        let ln_likelihood = target.ln_likelihood(&proposal)?;
        state.evaluations += 1;
        if ln_likelihood > threshold {
            current = LivePoint {
                cube: proposal,
                ln_likelihood,
            };
            accepted += 1;
        } else {
            rejected += 1;
        }
    }
    if accepted > rejected {
        state.step *= (1.0 / accepted as f64).exp();
    } else if accepted < rejected {
        state.step /= (1.0 / rejected as f64).exp();
    }
    state.step = state.step.clamp(MIN_STEP, 1.0);
    state.live[worst] = current;
    state.iteration += 1;
    Ok(())
}

fn finalize(state: &NestedState, cube: &UnitCube) -> Result<NestedResult, FrError> {
    let mut closing = state.clone();
    let ln_each = state.ln_volume - (state.live.len() as f64).ln();
    let mut live = state.live.clone();
    live.sort_by(|a, b| a.ln_likelihood.total_cmp(&b.ln_likelihood));
    for point in live {
        let ln_weight = ln_each + point.ln_likelihood;
        closing.accumulate(ln_weight, point.ln_likelihood);
        closing.dead.push(DeadPoint {
            theta: cube.transform(&point.cube)?,
            ln_likelihood: point.ln_likelihood,
            ln_weight,
        });
    }
    let information = closing.information.max(0.0);
    Ok(NestedResult {
        ln_evidence: closing.ln_evidence,
        ln_evidence_error: (information / state.live.len() as f64).sqrt(),
        information,
        iterations: state.iteration,
        evaluations: state.evaluations,
        samples: closing.dead,
    })
}

/// Runs nested sampling of `density` over the box `cube`.
///
/// Artefacts are written under `config.output_prefix`. With `resume` set and
/// a saved state present the run continues from it; otherwise it starts over
/// and overwrites previous artefacts.
pub fn run_nested<D: LogDensity>(
    density: D,
    cube: UnitCube,
    config: &NestConfig,
    parameter_names: &[String],
) -> Result<NestedResult, FrError> {
    config.validate()?;
    let mut target = CubeDensity::new(cube, density)?;
    let ndim = target.cube().dimension();
    let paths = ArtifactPaths::new(&config.output_prefix);

    let mut state = if config.resume && paths.resume.exists() {
        let state = resumed_state(&paths.resume, config, ndim)?;
        info!(iteration = state.iteration, path = %paths.resume.display(), "resuming nested sampling");
        state
    } else {
        info!(ndim, live_points = config.live_points, tolerance = config.tolerance, "starting nested sampling");
        initial_state(&mut target, config)?
    };

    let ln_shell = (-(-1.0 / config.live_points as f64).exp_m1()).ln();
    loop {
        if config.max_iterations.is_some_and(|max| state.iteration >= max) {
            break;
        }
        if state.best() == f64::NEG_INFINITY {
            warn!("no live point has a finite likelihood");
            break;
        }
        if state.converged(config.tolerance) {
            break;
        }
        iterate(&mut state, &mut target, config, ln_shell)?;
        if config.checkpoint_interval > 0 && state.iteration % config.checkpoint_interval == 0 {
            write_state(&state, &paths.resume)?;
            debug!(
                iteration = state.iteration,
                ln_evidence = state.ln_evidence,
                step = state.step,
                "nested sampling checkpoint"
            );
        }
    }
    write_state(&state, &paths.resume)?;

    let result = finalize(&state, target.cube())?;
    write_dead(&result.samples, &paths.dead)?;
    write_stats(
        &NestedStats {
            global_evidence: result.ln_evidence,
            global_evidence_error: result.ln_evidence_error,
            information: result.information,
            iterations: result.iterations,
            evaluations: result.evaluations,
            live_points: config.live_points,
            parameter_names: parameter_names.to_vec(),
        },
        &paths.stats,
    )?;
    info!(
        ln_evidence = result.ln_evidence,
        error = result.ln_evidence_error,
        iterations = result.iterations,
        "nested sampling finished"
    );
    Ok(result)
}
