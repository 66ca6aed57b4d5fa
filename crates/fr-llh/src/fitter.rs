//! Contract for the external likelihood collaborator.

use std::collections::BTreeMap;

use fr_core::errors::FrError;
use fr_core::ParameterSet;
use serde::{Deserialize, Serialize};

/// Whether the fitter evaluates at the given point or minimises first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Evaluate the log-likelihood at the supplied nuisance values.
    Evaluate,
    /// Minimise over the parameters not flagged as fixed.
    Minimize,
}

/// Parameter values and fixed flags handed to the fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRequest {
    /// Evaluation mode.
    pub mode: FitMode,
    /// Parameter values by name.
    pub params: BTreeMap<String, f64>,
    /// Whether each parameter is held fixed during minimisation.
    pub fixed: BTreeMap<String, bool>,
}

impl FitRequest {
    /// Collects the current values of `params` and the default fixed flags.
    pub fn from_set(mode: FitMode, params: &ParameterSet) -> Self {
        let flags = default_fit_flags();
        let mut values = BTreeMap::new();
        let mut fixed = BTreeMap::new();
        for param in params {
            values.insert(param.name().to_owned(), param.value());
            fixed.insert(
                param.name().to_owned(),
                flags.get(param.name()).copied().unwrap_or(true),
            );
        }
        Self {
            mode,
            params: values,
            fixed,
        }
    }
}

/// Fixed flags of the fitter's own parameters; the nuisances float, the
/// flavour angles and physics-model shapes stay fixed.
pub fn default_fit_flags() -> BTreeMap<&'static str, bool> {
    [
        ("astroFlavorAngle1", true),
        ("astroFlavorAngle2", true),
        ("astroENorm", false),
        ("astroMuNorm", false),
        ("astroTauNorm", false),
        ("astroNorm", false),
        ("astroParticleBalance", true),
        ("cutoffEnergy", true),
        ("astroDeltaGamma", false),
        ("convNorm", false),
        ("promptNorm", false),
        ("muonNorm", false),
        ("CRDeltaGamma", true),
        ("piKRatio", true),
        ("NeutrinoAntineutrinoRatio", true),
        ("darkNorm", true),
        ("domEfficiency", true),
        ("holeiceForward", true),
        ("anisotropyScale", true),
        ("astroNormSec", true),
        ("astroDeltaGammaSec", true),
    ]
    .into_iter()
    .collect()
}

/// External log-likelihood provider.
///
/// Implementations must be deterministic for a given request.
pub trait ExternalFitter {
    /// Log-likelihood for the request.
    fn llh(&mut self, request: &FitRequest) -> Result<f64, FrError>;
}

impl<F> ExternalFitter for F
where
    F: FnMut(&FitRequest) -> Result<f64, FrError>,
{
    fn llh(&mut self, request: &FitRequest) -> Result<f64, FrError> {
        self(request)
    }
}
