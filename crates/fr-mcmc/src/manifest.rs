use std::fs;
use std::path::{Path, PathBuf};

use fr_core::errors::{ErrorInfo, FrError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EnsembleConfig;
use crate::kernel::EnsembleRun;
use crate::metrics::Diagnostics;

/// Structured manifest describing a completed ensemble run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: EnsembleConfig,
    /// Names of the sampled coordinates, in chain column order.
    pub parameter_names: Vec<String>,
    /// Master seed used to derive walker substreams.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// `[samples, ndim]` of the stored chain.
    pub chain_shape: [usize; 2],
    /// Acceptance statistics.
    pub diagnostics: Diagnostics,
    /// Chain file (relative to the run directory).
    pub chain_file: PathBuf,
    /// Per-walker CSV (relative to the run directory).
    pub metrics_file: PathBuf,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), FrError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| FrError::io("manifest-mkdir", err, parent))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            FrError::Io(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| FrError::io("manifest-write", err, path))
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, FrError> {
        let contents = fs::read_to_string(path).map_err(|err| FrError::io("manifest-read", err, path))?;
        serde_json::from_str(&contents).map_err(|err| {
            FrError::Io(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Files written for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Chain file.
    pub chain: PathBuf,
    /// Per-walker CSV.
    pub metrics: PathBuf,
    /// JSON manifest.
    pub manifest: PathBuf,
}

/// Stores chain, diagnostics and manifest under `config.output.run_directory`.
///
/// Returns `None` when no run directory is configured.
pub fn write_artifacts(
    run: &EnsembleRun,
    config: &EnsembleConfig,
    parameter_names: &[String],
) -> Result<Option<ArtifactPaths>, FrError> {
    let Some(root) = config.output.run_directory.as_deref() else {
        return Ok(None);
    };
    fs::create_dir_all(root).map_err(|err| FrError::io("run-dir", err, root))?;
    let paths = ArtifactPaths {
        chain: root.join(&config.output.chain_file),
        metrics: root.join(&config.output.metrics_file),
        manifest: root.join(&config.output.manifest_file),
    };
    run.chain.save(&paths.chain)?;
    run.diagnostics
        .write_csv(&paths.metrics)
        .map_err(|err| FrError::io("metrics-write", err, &paths.metrics))?;
    RunManifest {
        config: config.clone(),
        parameter_names: parameter_names.to_vec(),
        master_seed: config.seed_policy.master_seed,
        seed_label: config.seed_policy.label.clone(),
        chain_shape: run.chain.shape,
        diagnostics: run.diagnostics.clone(),
        chain_file: config.output.chain_file.clone(),
        metrics_file: config.output.metrics_file.clone(),
    }
    .write(&paths.manifest)?;
    info!(path = %paths.chain.display(), "ensemble artefacts written");
    Ok(Some(paths))
}
