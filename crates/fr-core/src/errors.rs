//! Structured error types shared across the flavour-ratio crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code of the key-lookup failure: a parameter name absent from its set.
///
/// Lookups fail as [`FrError::Configuration`] because every name is fixed
/// when the parameter sets are built.
pub const UNKNOWN_PARAMETER: &str = "param-unknown";

/// Code, message and key/value detail carried by every [`FrError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Short kebab-case identifier, stable across releases.
    pub code: String,
    /// What went wrong.
    pub message: String,
    /// Offending names, lengths, paths and values.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// How to fix it, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with no context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::default(),
            hint: None,
        }
    }

    /// Records `key = value`; a repeated key keeps the last value.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Pipeline stage in which an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Static setup: configuration, parameter definitions.
    Setup,
    /// Binding a parameter vector onto a parameter set.
    Binding,
    /// Mixing-matrix or flavour-composition transforms.
    Transform,
    /// Likelihood scoring, including the external fitter.
    Scoring,
    /// Reading or writing run artefacts.
    Io,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Setup => "setup",
            Stage::Binding => "binding",
            Stage::Transform => "transform",
            Stage::Scoring => "scoring",
            Stage::Io => "io",
        };
        f.write_str(label)
    }
}

/// Canonical error type for the flavour-ratio engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum FrError {
    /// Invalid static setup (bad range, incompatible toggles, unknown
    /// parameter name).
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Parameter vector length does not match the governing set.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// Physically invalid intermediate state (forbidden region).
    #[error("domain error: {0}")]
    Domain(ErrorInfo),
    /// Failure reported by the external fitter collaborator.
    #[error("external fitter error: {0}")]
    Fitter(ErrorInfo),
    /// Persistence of chains, manifests or nested-sampling artefacts.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        let pairs: Vec<String> = self
            .context
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        if !pairs.is_empty() {
            write!(f, " {{{}}}", pairs.join(", "))?;
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

impl FrError {
    /// Shorthand for a [`FrError::Configuration`] without context.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        FrError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`FrError::Domain`] without context.
    pub fn domain(code: &str, message: impl Into<String>) -> Self {
        FrError::Domain(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`FrError::Io`] carrying the offending path.
    pub fn io(code: &str, err: impl ToString, path: &std::path::Path) -> Self {
        FrError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
    }

    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            FrError::Configuration(info)
            | FrError::Shape(info)
            | FrError::Domain(info)
            | FrError::Fitter(info)
            | FrError::Io(info) => info,
        }
    }

    /// Stage of the pipeline that produced the error.
    pub fn stage(&self) -> Stage {
        match self {
            FrError::Configuration(_) => Stage::Setup,
            FrError::Shape(_) => Stage::Binding,
            FrError::Domain(_) => Stage::Transform,
            FrError::Fitter(_) => Stage::Scoring,
            FrError::Io(_) => Stage::Io,
        }
    }

    /// True for errors that mark a forbidden region rather than a fault.
    ///
    /// Evaluation boundaries fold these into a log-probability of `-inf`.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, FrError::Domain(_))
    }
}
