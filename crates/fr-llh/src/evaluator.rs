//! The log-posterior pipeline: bind, prior, source flux, mixing, score.

use std::sync::Arc;

use fr_core::errors::{ErrorInfo, FrError, UNKNOWN_PARAMETER};
use fr_core::{LogDensity, ParamTag, Parameter, ParameterDef, ParameterSet};
use fr_mix::{
    angles_to_composition, angles_to_unitary, apply_mixing, composition_to_angles, normalize,
    standard_unitary, Composition, MixingAngles, NewPhysics, Unitary, MASS_EIGENVALUES,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EnergyDependence, Likelihood, LlhConfig, ResolvedLlh};
use crate::fitter::{ExternalFitter, FitMode, FitRequest};
use crate::paramsets::build_paramsets;
use crate::prior::ln_prior;
use crate::score::{multi_gaussian, GAUSSIAN_OFFSET};

/// Names that switch the standard-model inputs from constants to the
/// sampled set when all of them are present.
pub const FLOATING_STANDARD_MODEL: [&str; 6] =
    ["m21_2", "m3x_2", "s_12_2", "c_13_4", "s_23_2", "dcp_sm"];

/// Builds an external fitter for a worker thread.
pub type FitterFactory = Arc<dyn Fn() -> Box<dyn ExternalFitter> + Send + Sync>;

/// Counters accumulated by an evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorStats {
    /// Calls to [`LikelihoodEvaluator::ln_posterior`].
    pub evaluations: u64,
    /// Points with a non-finite prior.
    pub prior_rejections: u64,
    /// Points folded to `-inf` because a transform failed.
    pub forbidden: u64,
    /// Requests sent to the external fitter.
    pub fitter_calls: u64,
}

impl EvaluatorStats {
    /// Adds another evaluator's counters.
    pub fn merge(&mut self, other: &EvaluatorStats) {
        self.evaluations += other.evaluations;
        self.prior_rejections += other.prior_rejections;
        self.forbidden += other.forbidden;
        self.fitter_calls += other.fitter_calls;
    }
}

/// Evaluates the log-posterior of the sampled set.
///
/// The evaluator owns live parameter sets and rebinds them on every call.
/// It is single-threaded; see [`EvaluatorFactory`] for parallel use.
pub struct LikelihoodEvaluator {
    settings: Arc<ResolvedLlh>,
    hypothesis: ParameterSet,
    sampled: ParameterSet,
    fitter: Option<Box<dyn ExternalFitter>>,
    default_sm_u: Unitary,
    stats: EvaluatorStats,
}

impl std::fmt::Debug for LikelihoodEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LikelihoodEvaluator")
            .field("likelihood", &self.settings.config.likelihood)
            .field("sampled", &self.sampled)
            .field("stats", &self.stats)
            .finish()
    }
}

fn count_error(code: &str, message: &str, expected: usize, found: usize) -> FrError {
    FrError::Configuration(
        ErrorInfo::new(code, message)
            .with_context("expected", expected.to_string())
            .with_context("found", found.to_string()),
    )
}

impl LikelihoodEvaluator {
    /// Wires an evaluator over explicit parameter sets.
    ///
    /// External likelihoods require a fitter. The sampled set must carry the
    /// mixing, scale and source parameters implied by the toggles.
    pub fn new(
        settings: Arc<ResolvedLlh>,
        hypothesis: ParameterSet,
        sampled: ParameterSet,
        fitter: Option<Box<dyn ExternalFitter>>,
    ) -> Result<Self, FrError> {
        let config = &settings.config;
        if config.likelihood.is_external() && fitter.is_none() {
            return Err(FrError::Configuration(
                ErrorInfo::new("fitter-missing", "external likelihood needs a fitter")
                    .with_hint("pass an ExternalFitter or choose the flat or gaussian likelihood"),
            ));
        }
        let arity = config.mixing_mode().arity();
        let mixing = sampled.from_tag(&[ParamTag::MixingAngle], false).len();
        if mixing != arity {
            return Err(count_error("mixing-params", "unexpected number of mixing angles", arity, mixing));
        }
        let scales = sampled.from_tag(&[ParamTag::Scale], false).len();
        let expected_scales = usize::from(!config.fix_scale);
        if scales != expected_scales {
            return Err(count_error("scale-params", "unexpected number of scale parameters", expected_scales, scales));
        }
        let sources = sampled.from_tag(&[ParamTag::SourceAngle], false).len();
        let expected_sources = if config.fix_source_ratio { 0 } else { 2 };
        if sources != expected_sources {
            return Err(count_error("source-params", "unexpected number of source angles", expected_sources, sources));
        }
        let best_fit = hypothesis.from_tag(&[ParamTag::BestFit], false).len();
        if best_fit != 2 {
            return Err(count_error("bestfit-params", "hypothesis needs two flavour angles", 2, best_fit));
        }
        debug!(
            dimension = sampled.len(),
            likelihood = ?config.likelihood,
            energy_dependence = ?config.energy_dependence,
            "likelihood evaluator ready"
        );
        Ok(Self {
            settings,
            hypothesis,
            sampled,
            fitter,
            default_sm_u: standard_unitary(),
            stats: EvaluatorStats::default(),
        })
    }

    /// Resolves the configuration and builds the canonical parameter sets.
    pub fn from_config(config: &LlhConfig, fitter: Option<Box<dyn ExternalFitter>>) -> Result<Self, FrError> {
        let settings = Arc::new(config.resolve()?);
        let (hypothesis, sampled) = build_paramsets(&settings)?;
        Self::new(settings, hypothesis, sampled, fitter)
    }

    /// Resolved settings.
    pub fn settings(&self) -> &ResolvedLlh {
        &self.settings
    }

    /// The sampled set; its order defines `theta`.
    pub fn sampled(&self) -> &ParameterSet {
        &self.sampled
    }

    /// The hypothesis set handed to the external fitter.
    pub fn hypothesis(&self) -> &ParameterSet {
        &self.hypothesis
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> EvaluatorStats {
        self.stats
    }

    fn bind(&self, theta: &[f64]) -> Result<(), FrError> {
        self.sampled.set_values(theta)
    }

    /// Binds `theta` and returns the log-prior.
    pub fn ln_prior(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        self.bind(theta)?;
        Ok(ln_prior(&self.sampled))
    }

    /// Binds `theta` and returns the log-likelihood without the prior.
    ///
    /// Forbidden regions surface as [`FrError::Domain`].
    pub fn triangle_llh(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        self.bind(theta)?;
        self.llh_at_bound()
    }

    /// Binds `theta` and returns the predicted observed composition.
    pub fn observed_composition(&mut self, theta: &[f64]) -> Result<Composition, FrError> {
        self.bind(theta)?;
        self.observed()
    }

    /// Full log-posterior.
    ///
    /// Out-of-range points return `-inf` without touching the likelihood;
    /// forbidden transforms are folded to `-inf`. Shape and fitter errors
    /// propagate.
    pub fn ln_posterior(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        self.stats.evaluations += 1;
        self.bind(theta)?;
        let prior = ln_prior(&self.sampled);
        if !prior.is_finite() {
            self.stats.prior_rejections += 1;
            return Ok(f64::NEG_INFINITY);
        }
        match self.llh_at_bound() {
            Ok(llh) => Ok(prior + llh),
            Err(err) if err.is_forbidden() => {
                self.stats.forbidden += 1;
                debug!(code = %err.info().code, "forbidden point folded to -inf");
                Ok(f64::NEG_INFINITY)
            }
            Err(err) => Err(err),
        }
    }

    fn llh_at_bound(&mut self) -> Result<f64, FrError> {
        for param in self.sampled.from_tag(&[ParamTag::Nuisance], false).iter() {
            if let Some(index) = self.hypothesis.index_of(param.name()) {
                if let Some(target) = self.hypothesis.get(index) {
                    target.set_value(param.value());
                }
            }
        }

        let observed = self.observed()?;
        let flavour = composition_to_angles(observed)?;
        for (param, value) in self
            .hypothesis
            .from_tag(&[ParamTag::BestFit], false)
            .iter()
            .zip(flavour)
        {
            param.set_value(value);
        }

        let config = &self.settings.config;
        match config.likelihood {
            Likelihood::Flat => Ok(1.0),
            Likelihood::Gaussian => Ok(multi_gaussian(
                observed,
                config.measured_ratio,
                config.sigma_ratio,
                GAUSSIAN_OFFSET,
            )),
            Likelihood::External | Likelihood::ExternalFreq => {
                let mode = if config.likelihood == Likelihood::External {
                    FitMode::Evaluate
                } else {
                    FitMode::Minimize
                };
                let request = FitRequest::from_set(mode, &self.hypothesis);
                let fitter = self
                    .fitter
                    .as_mut()
                    .ok_or_else(|| FrError::configuration("fitter-missing", "external likelihood needs a fitter"))?;
                self.stats.fitter_calls += 1;
                fitter.llh(&request)
            }
        }
    }

    fn value_of(&self, name: &str) -> Result<f64, FrError> {
        self.sampled.by_name(name).map(Parameter::value)
    }

    fn physics(&self) -> Result<NewPhysics, FrError> {
        let config = &self.settings.config;
        let floating = FLOATING_STANDARD_MODEL
            .iter()
            .all(|name| self.sampled.contains(name));
        let (mass_eigenvalues, sm_u) = if floating {
            let angles = MixingAngles {
                s12_2: self.value_of("s_12_2")?,
                c13_4: self.value_of("c_13_4")?,
                s23_2: self.value_of("s_23_2")?,
                dcp: self.value_of("dcp_sm")?,
            };
            (
                [self.value_of("m21_2")?, self.value_of("m3x_2")?],
                angles_to_unitary(&angles)?,
            )
        } else {
            (MASS_EIGENVALUES, self.default_sm_u)
        };
        Ok(NewPhysics {
            dimension: config.dimension,
            mass_eigenvalues,
            sm_u,
            mixing: config.mixing_mode(),
            fixed_log_scale: config.fix_scale.then(|| config.scale.log10()),
        })
    }

    fn source(&self) -> Result<Composition, FrError> {
        let config = &self.settings.config;
        if config.fix_source_ratio {
            return Ok(config.source_ratio);
        }
        let angles = self.sampled.values_from_tag(&[ParamTag::SourceAngle], false);
        angles_to_composition([angles[0], angles[1]])
    }

    fn spectral_index(&self) -> Result<f64, FrError> {
        let config = &self.settings.config;
        if config.fold_index && config.likelihood.is_external() {
            Ok(-self.hypothesis.by_name("astroDeltaGamma")?.value())
        } else {
            Ok(config.spectral_index)
        }
    }

    fn observed(&self) -> Result<Composition, FrError> {
        let config = &self.settings.config;
        let physics = self.physics()?;
        let mut bsm_theta = self.sampled.values_from_tag(&[ParamTag::MixingAngle], false);
        bsm_theta.extend(self.sampled.values_from_tag(&[ParamTag::Scale], false));
        let propagation = |energy: f64| -> Result<Unitary, FrError> {
            if config.no_bsm {
                Ok(physics.sm_u)
            } else {
                physics.unitary(&bsm_theta, energy)
            }
        };

        let source = self.source()?;
        match config.energy_dependence {
            EnergyDependence::Mono => apply_mixing(source, &propagation(config.energy)?),
            EnergyDependence::Spectral => {
                let index = self.spectral_index()?;
                let mut integrated = [0.0; 3];
                for (center, width) in self
                    .settings
                    .bin_centers()
                    .into_iter()
                    .zip(self.settings.bin_widths())
                {
                    let weight = center.powf(index) * width;
                    let per_bin = apply_mixing(source, &propagation(center)?)?;
                    for (total, value) in integrated.iter_mut().zip(per_bin) {
                        *total += value * weight;
                    }
                }
                normalize(integrated)
            }
        }
    }
}

impl LogDensity for LikelihoodEvaluator {
    fn dimension(&self) -> usize {
        self.sampled.len()
    }

    fn ln_density(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        self.ln_posterior(theta)
    }
}

/// Thread-safe recipe for building independent evaluators.
///
/// Every call to [`EvaluatorFactory::build`] yields fresh live parameter sets,
/// so each worker owns its own mutable state.
#[derive(Clone)]
pub struct EvaluatorFactory {
    settings: Arc<ResolvedLlh>,
    hypothesis: Vec<ParameterDef>,
    sampled: Vec<ParameterDef>,
    fitter: Option<FitterFactory>,
}

impl std::fmt::Debug for EvaluatorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorFactory")
            .field("sampled", &self.sampled)
            .field("has_fitter", &self.fitter.is_some())
            .finish()
    }
}

impl EvaluatorFactory {
    /// Resolves the configuration and captures the canonical sets.
    pub fn from_config(config: &LlhConfig) -> Result<Self, FrError> {
        let settings = config.resolve()?;
        let (hypothesis, sampled) = build_paramsets(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            hypothesis: hypothesis.snapshot(),
            sampled: sampled.snapshot(),
            fitter: None,
        })
    }

    /// Captures an existing evaluator's settings and current values.
    pub fn from_evaluator(evaluator: &LikelihoodEvaluator) -> Self {
        Self {
            settings: Arc::clone(&evaluator.settings),
            hypothesis: evaluator.hypothesis.snapshot(),
            sampled: evaluator.sampled.snapshot(),
            fitter: None,
        }
    }

    /// Supplies a per-worker fitter constructor.
    pub fn with_fitter(mut self, fitter: FitterFactory) -> Self {
        self.fitter = Some(fitter);
        self
    }

    /// Overrides the current value of a sampled parameter in later builds.
    pub fn set_sampled_value(&mut self, name: &str, value: f64) -> Result<(), FrError> {
        let def = self
            .sampled
            .iter_mut()
            .find(|def| def.name == name)
            .ok_or_else(|| {
                FrError::Configuration(
                    ErrorInfo::new(UNKNOWN_PARAMETER, "no such sampled parameter").with_context("name", name),
                )
            })?;
        def.value = value;
        Ok(())
    }

    /// Resolved settings shared by every build.
    pub fn settings(&self) -> &ResolvedLlh {
        &self.settings
    }

    /// Definitions of the sampled set.
    pub fn sampled_defs(&self) -> &[ParameterDef] {
        &self.sampled
    }

    /// Number of sampled parameters.
    pub fn dimension(&self) -> usize {
        self.sampled.len()
    }

    /// Builds a fresh evaluator. Hypothesis parameters that share a name with
    /// a sampled parameter alias it, as in [`build_paramsets`].
    pub fn build(&self) -> Result<LikelihoodEvaluator, FrError> {
        let sampled = ParameterSet::from_defs(self.sampled.iter().cloned())?;
        let mut hypothesis = Vec::with_capacity(self.hypothesis.len());
        for def in &self.hypothesis {
            let param = match sampled.index_of(&def.name).and_then(|index| sampled.get(index)) {
                Some(shared) => shared.clone(),
                None => Parameter::define(def.clone())?,
            };
            hypothesis.push(param);
        }
        let fitter = self.fitter.as_ref().map(|make| make());
        LikelihoodEvaluator::new(
            Arc::clone(&self.settings),
            ParameterSet::new(hypothesis)?,
            sampled,
            fitter,
        )
    }
}

/// Posterior over a subset of the sampled coordinates, the rest held at the
/// values they had when the projection was created.
#[derive(Debug)]
pub struct ProjectedPosterior {
    evaluator: LikelihoodEvaluator,
    free: Vec<usize>,
    base: Vec<f64>,
}

impl ProjectedPosterior {
    /// Projects onto the sampled coordinates whose tag is (not, if `invert`)
    /// in `tags`.
    pub fn by_tag(evaluator: LikelihoodEvaluator, tags: &[ParamTag], invert: bool) -> Self {
        let free = evaluator.sampled.indices_from_tag(tags, invert);
        let base = evaluator.sampled.values();
        Self { evaluator, free, base }
    }

    /// The free coordinates, as an aliasing view of the sampled set.
    pub fn free_set(&self) -> ParameterSet {
        let sampled = &self.evaluator.sampled;
        let params = self.free.iter().filter_map(|&index| sampled.get(index).cloned());
        // names are unique in the parent set
        ParameterSet::new(params).unwrap_or_default()
    }

    /// Expands a free-coordinate vector into a full sampled vector.
    pub fn full_theta(&self, theta: &[f64]) -> Result<Vec<f64>, FrError> {
        if theta.len() != self.free.len() {
            return Err(FrError::Shape(
                ErrorInfo::new("theta-length", "projected vector does not match the free set")
                    .with_context("expected", self.free.len().to_string())
                    .with_context("received", theta.len().to_string()),
            ));
        }
        let mut full = self.base.clone();
        for (&index, &value) in self.free.iter().zip(theta) {
            full[index] = value;
        }
        Ok(full)
    }

    /// The wrapped evaluator.
    pub fn evaluator(&self) -> &LikelihoodEvaluator {
        &self.evaluator
    }

    /// Releases the wrapped evaluator.
    pub fn into_inner(self) -> LikelihoodEvaluator {
        self.evaluator
    }
}

impl LogDensity for ProjectedPosterior {
    fn dimension(&self) -> usize {
        self.free.len()
    }

    fn ln_density(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        let full = self.full_theta(theta)?;
        self.evaluator.ln_posterior(&full)
    }
}
