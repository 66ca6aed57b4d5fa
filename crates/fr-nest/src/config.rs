use std::fs;
use std::path::{Path, PathBuf};

use fr_core::errors::{ErrorInfo, FrError};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters of a nested-sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestConfig {
    /// Number of live points.
    #[serde(default = "default_live_points")]
    pub live_points: usize,
    /// Stop once the remaining evidence changes `ln Z` by less than this.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Prefix prepended to every artefact filename.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: PathBuf,
    /// Continue from `<prefix>resume.json` when it exists.
    #[serde(default)]
    pub resume: bool,
    /// Hard cap on iterations.
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Random-walk steps per replacement.
    #[serde(default = "default_walk_steps")]
    pub walk_steps: usize,
    /// Iterations between resume snapshots (0 writes only at the end).
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Master seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_live_points() -> usize {
    3000
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_output_prefix() -> PathBuf {
    PathBuf::from("./mnrun/")
}

fn default_walk_steps() -> usize {
    20
}

fn default_checkpoint_interval() -> usize {
    1000
}

fn default_seed() -> u64 {
    26
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            live_points: default_live_points(),
            tolerance: default_tolerance(),
            output_prefix: default_output_prefix(),
            resume: false,
            max_iterations: None,
            walk_steps: default_walk_steps(),
            checkpoint_interval: default_checkpoint_interval(),
            seed: default_seed(),
        }
    }
}

impl NestConfig {
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

    /// Rejects settings that cannot drive a run.
    pub fn validate(&self) -> Result<(), FrError> {
        if self.live_points < 2 {
            return Err(FrError::Configuration(
                ErrorInfo::new("nest-live-points", "at least two live points are required")
                    .with_context("live_points", self.live_points.to_string()),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(FrError::configuration("nest-tolerance", "tolerance must be positive"));
        }
        if self.walk_steps == 0 {
            return Err(FrError::configuration("nest-walk-steps", "walk_steps must be positive"));
        }
        Ok(())
    }
}
