#![deny(missing_docs)]

//! End-to-end flavour-ratio analyses built on the likelihood and the two
//! sampling engines.

/// Analysis configuration.
pub mod config;
/// Bayes-factor limits.
pub mod limit;
/// Posterior and evidence runs.
pub mod runs;
/// Fixed-scale and mixing-angle scans.
pub mod scan;
/// Bounded simplex search.
pub mod search;

pub use config::{AnalysisConfig, ScanConfig};
pub use limit::{bayes_factor_limit, reduced_evidence};
pub use runs::{evaluator_factory, run_evidence, run_mcmc, McmcOutcome};
pub use scan::{
    angles_correlation_scan, angles_limit_scan, bayesian_scale_scan, frequentist_scale_scan, scan_grid,
    write_angle_csv, write_scan_csv, AnglePoint, ScanPoint, ANGLE_SCENARIOS, FORBIDDEN_PENALTY,
};
pub use search::{minimize, Minimum, SearchConfig};
