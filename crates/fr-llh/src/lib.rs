#![deny(missing_docs)]
#![doc = "Likelihood evaluation for flavour-ratio inference: configuration, canonical parameter sets, priors, source flux folding, mixing and scoring."]

pub mod config;
pub mod evaluator;
pub mod fitter;
pub mod paramsets;
pub mod prior;
pub mod score;

pub use config::{Binning, EnergyDependence, Likelihood, LlhConfig, ResolvedLlh};
pub use evaluator::{
    EvaluatorFactory, EvaluatorStats, FitterFactory, LikelihoodEvaluator, ProjectedPosterior,
    FLOATING_STANDARD_MODEL,
};
pub use fitter::{default_fit_flags, ExternalFitter, FitMode, FitRequest};
pub use paramsets::{build_paramsets, define_nuisance, nuisance_defs};
pub use prior::{ln_prior, ln_prior_term};
pub use score::{multi_gaussian, GAUSSIAN_OFFSET};
