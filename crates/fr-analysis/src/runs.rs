use fr_core::errors::FrError;
use fr_core::{LogDensity, RngHandle};
use fr_llh::{EvaluatorFactory, EvaluatorStats, FitterFactory};
use fr_mcmc::determinism::seeding_seed;
use fr_mcmc::{initial_positions, run_parallel, write_artifacts, ArtifactPaths, EnsembleRun};
use fr_nest::{run_nested, NestedResult, UnitCube};
use tracing::info;

use crate::config::AnalysisConfig;

/// Outcome of [`run_mcmc`].
#[derive(Debug, Clone)]
pub struct McmcOutcome {
    /// Chain and diagnostics.
    pub run: EnsembleRun,
    /// Names of the chain columns.
    pub parameter_names: Vec<String>,
    /// Files written, when a run directory is configured.
    pub artifacts: Option<ArtifactPaths>,
    /// Evaluator counters; only the serial path records them.
    pub stats: Option<EvaluatorStats>,
}

/// Builds the evaluator recipe for `config`, attaching `fitter` when given.
pub fn evaluator_factory(config: &AnalysisConfig, fitter: Option<FitterFactory>) -> Result<EvaluatorFactory, FrError> {
    let factory = EvaluatorFactory::from_config(&config.llh)?;
    Ok(match fitter {
        Some(fitter) => factory.with_fitter(fitter),
        None => factory,
    })
}

/// Samples the posterior with the ensemble sampler and saves the chain.
///
/// Walkers are seeded from the sampled set; with `threads > 1` every worker
/// builds its own evaluator from the same recipe.
pub fn run_mcmc(config: &AnalysisConfig, fitter: Option<FitterFactory>) -> Result<McmcOutcome, FrError> {
    let factory = evaluator_factory(config, fitter)?;
    let mut evaluator = factory.build()?;
    let parameter_names = evaluator.sampled().names();
    let ensemble = &config.ensemble;
    ensemble.validate(evaluator.dimension())?;

    let mut rng = RngHandle::from_seed(seeding_seed(ensemble.seed_policy.master_seed));
    let p0 = initial_positions(ensemble.seed_type, evaluator.sampled(), ensemble.nwalkers, &mut rng);
    info!(
        ndim = evaluator.dimension(),
        likelihood = ?config.llh.likelihood,
        seed_type = ?ensemble.seed_type,
        "posterior sampling"
    );

    let (run, stats) = if ensemble.threads > 1 {
        (run_parallel(|| factory.build(), p0, ensemble)?, None)
    } else {
        let serial = fr_mcmc::run(&mut evaluator, p0, ensemble)?;
        (serial, Some(evaluator.stats()))
    };
    let artifacts = write_artifacts(&run, ensemble, &parameter_names)?;
    Ok(McmcOutcome {
        run,
        parameter_names,
        artifacts,
        stats,
    })
}

/// Evidence of the full sampled set, flat over each parameter's range.
pub fn run_evidence(config: &AnalysisConfig, fitter: Option<FitterFactory>) -> Result<NestedResult, FrError> {
    let evaluator = evaluator_factory(config, fitter)?.build()?;
    let names = evaluator.sampled().names();
    let cube = UnitCube::from_params(evaluator.sampled());
    run_nested(evaluator, cube, &config.nest, &names)
}
