//! Analysis configuration for the likelihood: scoring mode, measured
//! composition, source composition and data paths.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use fr_core::errors::{ErrorInfo, FrError};
use fr_core::Range;
use fr_mix::{normalize, Composition, MixingMode, MASS_EIGENVALUES};
use serde::{Deserialize, Serialize};

/// Scoring mode applied to the observed composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Likelihood {
    /// Constant score.
    Flat,
    /// Multivariate Gaussian around the measured composition.
    Gaussian,
    /// External fitter evaluated at fixed nuisances.
    External,
    /// External fitter minimising over its free nuisances.
    ExternalFreq,
}

impl Likelihood {
    /// True for the modes that call the external fitter.
    pub fn is_external(&self) -> bool {
        matches!(self, Likelihood::External | Likelihood::ExternalFreq)
    }
}

/// Energy treatment of the source flux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyDependence {
    /// Single energy `energy`.
    Mono,
    /// Power-law flux folded over log-spaced bins.
    Spectral,
}

/// Log-spaced binning `(lo, hi, nbins)` in GeV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    /// Lower edge.
    pub lo: f64,
    /// Upper edge.
    pub hi: f64,
    /// Number of bins.
    pub nbins: usize,
}

impl Default for Binning {
    fn default() -> Self {
        Self {
            lo: 1e4,
            hi: 1e7,
            nbins: 5,
        }
    }
}

impl Binning {
    /// `nbins + 1` log-spaced edges.
    pub fn edges(&self) -> Vec<f64> {
        let (log_lo, log_hi) = (self.lo.log10(), self.hi.log10());
        let step = (log_hi - log_lo) / self.nbins as f64;
        (0..=self.nbins)
            .map(|idx| 10f64.powf(log_lo + step * idx as f64))
            .collect()
    }
}

/// YAML-configurable likelihood surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlhConfig {
    /// Central measured flavour ratio (normalised on resolve).
    #[serde(default = "default_measured_ratio")]
    pub measured_ratio: Composition,
    /// Diagonal covariance entry of the Gaussian score.
    #[serde(default = "default_sigma_ratio")]
    pub sigma_ratio: f64,
    /// Source ratio used when `fix_source_ratio` is set.
    #[serde(default = "default_source_ratio")]
    pub source_ratio: Composition,
    /// Hold the source ratio at `source_ratio`.
    #[serde(default)]
    pub fix_source_ratio: bool,
    /// Energy treatment.
    #[serde(default = "default_energy_dependence")]
    pub energy_dependence: EnergyDependence,
    /// Energy in GeV for mono-energetic mode.
    #[serde(default = "default_energy")]
    pub energy: f64,
    /// Power-law index of the spectral source flux.
    #[serde(default = "default_spectral_index")]
    pub spectral_index: f64,
    /// Spectral binning.
    #[serde(default)]
    pub binning: Binning,
    /// Take the spectral index from `astroDeltaGamma` with external likelihoods.
    #[serde(default)]
    pub fold_index: bool,
    /// Turn off the new-physics term.
    #[serde(default)]
    pub no_bsm: bool,
    /// Hold all new-physics mixing at bi-maximal values.
    #[serde(default)]
    pub fix_mixing: bool,
    /// Float only `s23^2` of the new-physics mixing.
    #[serde(default)]
    pub fix_mixing_almost: bool,
    /// Hold the new-physics scale at `scale`.
    #[serde(default)]
    pub fix_scale: bool,
    /// New-physics scale (GeV^(4-d)); estimated on resolve unless fixed.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Multiplicative half-width of the scanned scale box.
    #[serde(default = "default_scale_region")]
    pub scale_region: f64,
    /// Operator dimension.
    #[serde(default = "default_dimension")]
    pub dimension: u32,
    /// Scoring mode.
    #[serde(default = "default_likelihood")]
    pub likelihood: Likelihood,
    /// Injected nuisance values, by name.
    #[serde(default)]
    pub nuisance: BTreeMap<String, f64>,
}

fn default_measured_ratio() -> Composition {
    [1.0, 1.0, 1.0]
}

fn default_sigma_ratio() -> f64 {
    0.01
}

fn default_source_ratio() -> Composition {
    [2.0, 1.0, 0.0]
}

fn default_energy_dependence() -> EnergyDependence {
    EnergyDependence::Spectral
}

fn default_energy() -> f64 {
    1000.0
}

fn default_spectral_index() -> f64 {
    -2.0
}

fn default_scale() -> f64 {
    1e-30
}

fn default_scale_region() -> f64 {
    1e10
}

fn default_dimension() -> u32 {
    3
}

fn default_likelihood() -> Likelihood {
    Likelihood::Gaussian
}

impl Default for LlhConfig {
    fn default() -> Self {
        Self {
            measured_ratio: default_measured_ratio(),
            sigma_ratio: default_sigma_ratio(),
            source_ratio: default_source_ratio(),
            fix_source_ratio: false,
            energy_dependence: default_energy_dependence(),
            energy: default_energy(),
            spectral_index: default_spectral_index(),
            binning: Binning::default(),
            fold_index: false,
            no_bsm: false,
            fix_mixing: false,
            fix_mixing_almost: false,
            fix_scale: false,
            scale: default_scale(),
            scale_region: default_scale_region(),
            dimension: default_dimension(),
            likelihood: default_likelihood(),
            nuisance: BTreeMap::new(),
        }
    }
}

fn config_error(code: &str, message: &str) -> FrError {
    FrError::Configuration(ErrorInfo::new(code, message))
}

impl LlhConfig {
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

    /// Rejects incompatible toggles and non-physical settings.
    pub fn validate(&self) -> Result<(), FrError> {
        if self.fix_mixing && self.fix_scale {
            return Err(config_error(
                "toggle-conflict",
                "fixed mixing and fixed scale cannot be combined",
            ));
        }
        if self.fix_mixing && self.fix_mixing_almost {
            return Err(config_error(
                "toggle-conflict",
                "fix_mixing and fix_mixing_almost cannot be combined",
            ));
        }
        if self.dimension < 3 {
            return Err(FrError::Configuration(
                ErrorInfo::new("dimension", "operator dimension must be at least 3")
                    .with_context("dimension", self.dimension.to_string()),
            ));
        }
        if !(self.sigma_ratio.is_finite() && self.sigma_ratio > 0.0) {
            return Err(config_error("sigma-ratio", "sigma_ratio must be positive"));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(config_error("scale", "scale must be positive"));
        }
        if !self.fix_scale && !(self.scale_region.is_finite() && self.scale_region > 1.0) {
            return Err(config_error("scale-region", "scale_region must exceed 1"));
        }
        match self.energy_dependence {
            EnergyDependence::Mono => {
                if !(self.energy.is_finite() && self.energy > 0.0) {
                    return Err(config_error("energy", "energy must be positive"));
                }
            }
            EnergyDependence::Spectral => {
                let b = self.binning;
                if b.nbins == 0 || !(b.lo > 0.0 && b.hi > b.lo && b.hi.is_finite()) {
                    return Err(FrError::Configuration(
                        ErrorInfo::new("binning", "binning must satisfy 0 < lo < hi with nbins >= 1")
                            .with_context("lo", b.lo.to_string())
                            .with_context("hi", b.hi.to_string())
                            .with_context("nbins", b.nbins.to_string()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Mixing mode selected by the toggles.
    pub fn mixing_mode(&self) -> MixingMode {
        if self.fix_mixing {
            MixingMode::Fixed
        } else if self.fix_mixing_almost {
            MixingMode::FixedAlmost
        } else {
            MixingMode::Free
        }
    }

    /// Validates and derives the quantities the evaluator needs.
    pub fn resolve(&self) -> Result<ResolvedLlh, FrError> {
        self.validate()?;
        let mut config = self.clone();
        config.measured_ratio = normalize(self.measured_ratio).map_err(as_setup)?;
        if config.fix_source_ratio {
            config.source_ratio = normalize(self.source_ratio).map_err(as_setup)?;
        }
        let bin_edges = match config.energy_dependence {
            EnergyDependence::Mono => Vec::new(),
            EnergyDependence::Spectral => config.binning.edges(),
        };
        let log_scale_region = if config.fix_scale {
            let log = config.scale.log10();
            [log, log]
        } else {
            config.scale = estimate_scale(&config, &bin_edges);
            [
                (config.scale / config.scale_region).log10(),
                (config.scale * config.scale_region).log10(),
            ]
        };
        Ok(ResolvedLlh {
            config,
            bin_edges,
            log_scale_region,
        })
    }
}

fn as_setup(err: FrError) -> FrError {
    FrError::Configuration(err.info().clone())
}

/// Order-of-magnitude scale at which the new-physics term competes with
/// the heaviest mass splitting.
fn estimate_scale(config: &LlhConfig, bin_edges: &[f64]) -> f64 {
    let heavy = MASS_EIGENVALUES[1];
    let power = f64::from(config.dimension) - 3.0;
    match config.energy_dependence {
        EnergyDependence::Mono => {
            let energy = config.energy;
            10f64.powf((heavy / energy).log10().round() - power * energy.log10() + 6.0)
        }
        EnergyDependence::Spectral => {
            let mean_log = bin_edges.iter().map(|edge| edge.log10()).sum::<f64>()
                / bin_edges.len() as f64;
            let energy = 10f64.powf(mean_log);
            10f64.powf(((heavy / energy).log10() - power * energy.log10()).round())
        }
    }
}

/// Validated configuration plus derived binning and scale box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLlh {
    /// Normalised configuration (ratios normalised, scale estimated).
    pub config: LlhConfig,
    /// Spectral bin edges (empty in mono-energetic mode).
    pub bin_edges: Vec<f64>,
    /// `[log10 lo, log10 hi]` of the scanned scale box.
    pub log_scale_region: Range,
}

impl ResolvedLlh {
    /// Geometric bin centres.
    pub fn bin_centers(&self) -> Vec<f64> {
        self.bin_edges
            .windows(2)
            .map(|pair| (pair[0] * pair[1]).sqrt())
            .collect()
    }

    /// Bin widths.
    pub fn bin_widths(&self) -> Vec<f64> {
        self.bin_edges
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).abs())
            .collect()
    }

    /// `log10` of the central scale.
    pub fn log_scale(&self) -> f64 {
        self.config.scale.log10()
    }
}
