use std::fs;
use std::path::{Path, PathBuf};

use fr_core::errors::{ErrorInfo, FrError};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing an ensemble run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Number of walkers; must be even and at least twice the dimension.
    #[serde(default = "default_nwalkers")]
    pub nwalkers: usize,
    /// Steps discarded before recording.
    #[serde(default = "default_burnin")]
    pub burnin: usize,
    /// Recorded steps per walker.
    #[serde(default = "default_nsteps")]
    pub nsteps: usize,
    /// Worker threads used for posterior evaluation.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Stretch-move scale `a`.
    #[serde(default = "default_stretch")]
    pub stretch: f64,
    /// How initial walker positions are drawn.
    #[serde(default)]
    pub seed_type: SeedType,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_nwalkers() -> usize {
    200
}

fn default_burnin() -> usize {
    1000
}

fn default_nsteps() -> usize {
    2000
}

fn default_threads() -> usize {
    1
}

fn default_stretch() -> f64 {
    2.0
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            nwalkers: default_nwalkers(),
            burnin: default_burnin(),
            nsteps: default_nsteps(),
            threads: default_threads(),
            stretch: default_stretch(),
            seed_type: SeedType::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl EnsembleConfig {
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

    /// Checks the walker layout against the target dimension.
    pub fn validate(&self, ndim: usize) -> Result<(), FrError> {
        let invalid = |code: &str, message: &str| {
            FrError::Configuration(
                ErrorInfo::new(code, message)
                    .with_context("nwalkers", self.nwalkers.to_string())
                    .with_context("ndim", ndim.to_string()),
            )
        };
        if ndim == 0 {
            return Err(invalid("ensemble-ndim", "cannot sample a zero-dimensional posterior"));
        }
        if self.nwalkers % 2 != 0 {
            return Err(invalid("ensemble-walkers", "the number of walkers must be even"));
        }
        if self.nwalkers < 2 * ndim {
            return Err(invalid(
                "ensemble-walkers",
                "the number of walkers must be at least twice the dimension",
            ));
        }
        if self.nsteps == 0 {
            return Err(invalid("ensemble-steps", "nsteps must be positive"));
        }
        if !(self.stretch.is_finite() && self.stretch > 1.0) {
            return Err(FrError::Configuration(
                ErrorInfo::new("ensemble-stretch", "stretch scale must exceed 1")
                    .with_context("stretch", self.stretch.to_string()),
            ));
        }
        Ok(())
    }
}

/// Initial walker placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SeedType {
    /// Uniform within each parameter's seed interval.
    #[default]
    Uniform,
    /// Gaussian ball around the current values with the parameter widths.
    Gaussian,
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    26
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts; nothing is written when unset.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Chain filename relative to `run_directory`.
    #[serde(default = "default_chain_filename")]
    pub chain_file: PathBuf,
    /// Per-walker diagnostics CSV relative to `run_directory`.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
}

fn default_chain_filename() -> PathBuf {
    PathBuf::from("chain.bin")
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("walkers.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            chain_file: default_chain_filename(),
            metrics_file: default_metrics_filename(),
            manifest_file: default_manifest_filename(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_or_too_few_walkers_are_rejected() {
        let mut config = EnsembleConfig {
            nwalkers: 9,
            ..EnsembleConfig::default()
        };
        assert_eq!(config.validate(2).unwrap_err().info().code, "ensemble-walkers");
        config.nwalkers = 10;
        assert!(config.validate(5).is_ok());
        assert!(config.validate(6).is_err());
    }

    #[test]
    fn yaml_fills_defaults() {
        let config = EnsembleConfig::from_yaml_str("nwalkers: 12\nseed_type: gaussian\n").unwrap();
        assert_eq!(config.nwalkers, 12);
        assert_eq!(config.seed_type, SeedType::Gaussian);
        assert_eq!(config.stretch, 2.0);
        assert!(config.output.run_directory.is_none());
    }
}
