#![deny(missing_docs)]

//! Nested sampling of a [`fr_core::LogDensity`] over a box of parameter ranges.

/// On-disk artefacts: summary, dead points and resume state.
pub mod artifacts;
/// YAML configuration schema and defaults.
pub mod config;
/// Unit-cube transform and adapter.
pub mod cube;
/// Sampler entry point.
pub mod sampler;
/// Serializable sampler state.
pub mod state;

pub use artifacts::{read_global_evidence, read_stats, ArtifactPaths, NestedStats};
pub use config::NestConfig;
pub use cube::{CubeDensity, UnitCube};
pub use sampler::{run_nested, NestedResult};
pub use state::{log_add_exp, DeadPoint, LivePoint, NestedState};
