#![deny(missing_docs)]

//! Deterministic affine-invariant ensemble sampler over a [`fr_core::LogDensity`].

/// Flattened chains and their bincode persistence.
pub mod chain;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Stretch-move kernel and the public `run` entry points.
pub mod kernel;
/// Run manifest serialization helpers.
pub mod manifest;
/// Acceptance diagnostics.
pub mod metrics;
/// Initial walker placement.
pub mod seed;

pub use chain::{load_chain, save_chain, Chain};
pub use config::{EnsembleConfig, OutputConfig, SeedPolicy, SeedType};
pub use kernel::{run, run_parallel, EnsembleRun};
pub use manifest::{write_artifacts, ArtifactPaths, RunManifest};
pub use metrics::Diagnostics;
pub use seed::{flat_seed, gaussian_seed, initial_positions};
