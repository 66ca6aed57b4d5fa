use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fr_core::errors::{ErrorInfo, FrError};
use serde::{Deserialize, Serialize};

use crate::state::{ln_value, DeadPoint, NestedState};

/// Summary written to `<prefix>stats.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedStats {
    /// Log-evidence.
    #[serde(with = "ln_value")]
    pub global_evidence: f64,
    /// One-sigma error on the log-evidence.
    pub global_evidence_error: f64,
    /// Information gain (nats).
    pub information: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Likelihood evaluations.
    pub evaluations: usize,
    /// Live points used.
    pub live_points: usize,
    /// Names of the sampled coordinates.
    pub parameter_names: Vec<String>,
}

/// Artefact locations derived from an output prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `<prefix>stats.json`.
    pub stats: PathBuf,
    /// `<prefix>dead.txt`.
    pub dead: PathBuf,
    /// `<prefix>resume.json`.
    pub resume: PathBuf,
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(prefix.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}

impl ArtifactPaths {
    /// Paths for `prefix`; the prefix is concatenated, not joined.
    pub fn new(prefix: &Path) -> Self {
        Self {
            stats: with_suffix(prefix, "stats.json"),
            dead: with_suffix(prefix, "dead.txt"),
            resume: with_suffix(prefix, "resume.json"),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), FrError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| FrError::io("nest-mkdir", err, parent))
        }
        _ => Ok(()),
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path, code: &str) -> Result<(), FrError> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|err| {
        FrError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
    })?;
    fs::write(path, json).map_err(|err| FrError::io(code, err, path))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, code: &str) -> Result<T, FrError> {
    let contents = fs::read_to_string(path).map_err(|err| FrError::io(code, err, path))?;
    serde_json::from_str(&contents).map_err(|err| {
        FrError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
    })
}

/// Writes the summary file.
pub fn write_stats(stats: &NestedStats, path: &Path) -> Result<(), FrError> {
    write_json(stats, path, "nest-stats-write")
}

/// Writes the dead-point table: `ln_weight ln_likelihood theta...` per line.
pub fn write_dead(dead: &[DeadPoint], path: &Path) -> Result<(), FrError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|err| FrError::io("nest-dead-write", err, path))?;
    let mut out = BufWriter::new(file);
    let write_err = |err: std::io::Error| FrError::io("nest-dead-write", err, path);
    for point in dead {
        write!(out, "{:e} {:e}", point.ln_weight, point.ln_likelihood).map_err(write_err)?;
        for value in &point.theta {
            write!(out, " {value:e}").map_err(write_err)?;
        }
        writeln!(out).map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// Snapshots the sampler state.
pub fn write_state(state: &NestedState, path: &Path) -> Result<(), FrError> {
    write_json(state, path, "nest-resume-write")
}

/// Reads a snapshot written by [`write_state`].
pub fn load_state(path: &Path) -> Result<NestedState, FrError> {
    read_json(path, "nest-resume-read")
}

/// Reads the summary written for `prefix`.
pub fn read_stats(prefix: &Path) -> Result<NestedStats, FrError> {
    read_json(&ArtifactPaths::new(prefix).stats, "nest-stats-read")
}

/// Log-evidence recorded for `prefix`.
pub fn read_global_evidence(prefix: &Path) -> Result<f64, FrError> {
    Ok(read_stats(prefix)?.global_evidence)
}
