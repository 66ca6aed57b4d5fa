use std::fs;
use std::path::{Path, PathBuf};

use fr_core::errors::{ErrorInfo, FrError};
use fr_llh::LlhConfig;
use fr_mcmc::EnsembleConfig;
use fr_nest::NestConfig;
use serde::{Deserialize, Serialize};

use crate::search::SearchConfig;

/// Settings shared by the scale scans and the limit extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of `log10 Λ` bins across the scale box.
    #[serde(default = "default_bins")]
    pub bins: usize,
    /// Restrict evaluation to these bin indices; all bins when unset.
    #[serde(default)]
    pub eval_bins: Option<Vec<usize>>,
    /// Live points for each fixed-scale evidence.
    #[serde(default = "default_live_points")]
    pub live_points: usize,
    /// Evidence tolerance for each fixed-scale run.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Prefix of the per-bin nested-sampling artefacts and scan tables.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: PathBuf,
    /// Exclusion threshold `k`: a scale is excluded once the Bayes factor
    /// against it exceeds `10^k`.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Minimiser used by the frequentist scan.
    #[serde(default)]
    pub search: SearchConfig,
}

fn default_bins() -> usize {
    10
}

fn default_live_points() -> usize {
    400
}

fn default_tolerance() -> f64 {
    0.5
}

fn default_output_prefix() -> PathBuf {
    PathBuf::from("./mnrun/fr_evidence_")
}

fn default_threshold() -> f64 {
    1.0
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            eval_bins: None,
            live_points: default_live_points(),
            tolerance: default_tolerance(),
            output_prefix: default_output_prefix(),
            threshold: default_threshold(),
            search: SearchConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Rejects scan settings that cannot drive a scan.
    pub fn validate(&self) -> Result<(), FrError> {
        if self.bins < 2 {
            return Err(FrError::Configuration(
                ErrorInfo::new("scan-bins", "a scan needs at least two bins")
                    .with_context("bins", self.bins.to_string()),
            ));
        }
        if let Some(bad) = self
            .eval_bins
            .iter()
            .flatten()
            .find(|&&index| index >= self.bins)
        {
            return Err(FrError::Configuration(
                ErrorInfo::new("scan-eval-bin", "evaluation bin outside the scan")
                    .with_context("bin", bad.to_string())
                    .with_context("bins", self.bins.to_string()),
            ));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(FrError::configuration("bayes-threshold", "threshold must be positive"));
        }
        self.search.validate()
    }

    /// Whether bin `index` should be evaluated.
    pub fn evaluates(&self, index: usize) -> bool {
        self.eval_bins
            .as_ref()
            .map_or(true, |bins| bins.contains(&index))
    }
}

/// Complete configuration of an analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Likelihood surface.
    #[serde(default)]
    pub llh: LlhConfig,
    /// Ensemble sampler.
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    /// Nested sampler for the full evidence.
    #[serde(default)]
    pub nest: NestConfig,
    /// Scale scans.
    #[serde(default)]
    pub scan: ScanConfig,
}

impl AnalysisConfig {
    /// Parses a configuration from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FrError> {
        serde_yaml::from_str(yaml)
            .map_err(|err| FrError::Configuration(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Loads a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, FrError> {
        let contents = fs::read_to_string(path).map_err(|err| FrError::io("config-read", err, path))?;
        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_default_independently() {
        let config = AnalysisConfig::from_yaml_str(
            "llh:\n  dimension: 5\nscan:\n  bins: 4\n  eval_bins: [0, 3]\n",
        )
        .unwrap();
        assert_eq!(config.llh.dimension, 5);
        assert_eq!(config.ensemble, EnsembleConfig::default());
        assert_eq!(config.scan.live_points, 400);
        assert!(config.scan.evaluates(3));
        assert!(!config.scan.evaluates(1));
        config.scan.validate().unwrap();
    }

    #[test]
    fn out_of_range_eval_bin_is_rejected() {
        let scan = ScanConfig {
            bins: 3,
            eval_bins: Some(vec![3]),
            ..ScanConfig::default()
        };
        assert_eq!(scan.validate().unwrap_err().info().code, "scan-eval-bin");
    }
}
