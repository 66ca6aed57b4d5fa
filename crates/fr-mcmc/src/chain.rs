use std::fs;
use std::path::Path;

use fr_core::errors::{ErrorInfo, FrError};
use serde::{Deserialize, Serialize};

/// Flattened post-burn-in samples, `shape = [samples, ndim]`, row-major.
///
/// Rows are walker-major: all recorded steps of walker 0, then walker 1, and
/// so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    /// `[samples, ndim]`.
    pub shape: [usize; 2],
    /// Row-major sample values.
    pub data: Vec<f64>,
}

impl Chain {
    /// Assembles a chain from per-walker histories (`walkers[w][step]`).
    pub fn from_walkers(ndim: usize, walkers: Vec<Vec<Vec<f64>>>) -> Self {
        let samples = walkers.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(samples * ndim);
        for history in walkers {
            for row in history {
                data.extend(row);
            }
        }
        Self {
            shape: [samples, ndim],
            data,
        }
    }

    /// Number of recorded samples.
    pub fn samples(&self) -> usize {
        self.shape[0]
    }

    /// Number of coordinates per sample.
    pub fn ndim(&self) -> usize {
        self.shape[1]
    }

    /// Sample `index`, if present.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let ndim = self.ndim();
        self.data.get(index * ndim..(index + 1) * ndim)
    }

    /// Iterator over the samples.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.ndim().max(1))
    }

    /// Per-coordinate sample mean.
    pub fn mean(&self) -> Vec<f64> {
        let mut mean = vec![0.0; self.ndim()];
        if self.samples() == 0 {
            return mean;
        }
        for row in self.rows() {
            for (acc, value) in mean.iter_mut().zip(row) {
                *acc += value;
            }
        }
        let count = self.samples() as f64;
        mean.iter_mut().for_each(|acc| *acc /= count);
        mean
    }

    /// Writes the chain as bincode.
    pub fn save(&self, path: &Path) -> Result<(), FrError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| FrError::io("chain-mkdir", err, parent))?;
        }
        let bytes = bincode::serialize(self).map_err(|err| {
            FrError::Io(
                ErrorInfo::new("chain-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, bytes).map_err(|err| FrError::io("chain-write", err, path))
    }

    /// Reads a chain written by [`Chain::save`].
    pub fn load(path: &Path) -> Result<Self, FrError> {
        let bytes = fs::read(path).map_err(|err| FrError::io("chain-read", err, path))?;
        let chain: Chain = bincode::deserialize(&bytes).map_err(|err| {
            FrError::Io(
                ErrorInfo::new("chain-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        if chain.shape[0] * chain.shape[1] != chain.data.len() {
            return Err(FrError::Io(
                ErrorInfo::new("chain-shape", "chain data does not match its shape")
                    .with_context("path", path.display().to_string()),
            ));
        }
        Ok(chain)
    }
}

/// Writes `chain` to `path`.
pub fn save_chain(chain: &Chain, path: &Path) -> Result<(), FrError> {
    chain.save(path)
}

/// Reads a chain from `path`.
pub fn load_chain(path: &Path) -> Result<Chain, FrError> {
    Chain::load(path)
}
