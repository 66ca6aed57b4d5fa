//! Fixed-scale scans over `log10 Λ`: evidence and profile-likelihood
//! tables, and likelihood maps along single mixing angles.

use std::f64::consts::FRAC_PI_2;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fr_core::errors::{ErrorInfo, FrError};
use fr_core::{ParamTag, Range};
use fr_llh::{EvaluatorFactory, FitterFactory, Likelihood, LikelihoodEvaluator, ProjectedPosterior};
use fr_nest::{run_nested, NestConfig, UnitCube};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::runs::evaluator_factory;
use crate::search::minimize;

/// Objective assigned to points the frequentist scan cannot evaluate.
pub const FORBIDDEN_PENALTY: f64 = 9e99;

const SCALE: &str = "logLam";
const MAGNITUDES: [&str; 3] = ["s_12^2", "c_13^4", "s_23^2"];
const PHASE: &str = "dcp";
const MAGNITUDE_START: [f64; 3] = [0.1, 0.1, 0.1];

/// Number of single-angle scenarios in the angle scans, one per magnitude.
pub const ANGLE_SCENARIOS: usize = 3;

/// One bin of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// `log10 Λ` of the bin.
    pub log_scale: f64,
    /// Log-evidence (Bayesian) or best log-likelihood (frequentist).
    pub value: f64,
    /// Best-fit mixing magnitudes; frequentist scans only.
    #[serde(default)]
    pub best_fit: Option<Vec<f64>>,
}

/// `bins` evenly spaced values covering `[lo, hi]`.
pub fn scan_grid([lo, hi]: Range, bins: usize) -> Vec<f64> {
    match bins {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (bins - 1) as f64;
            (0..bins).map(|i| lo + step * i as f64).collect()
        }
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(prefix.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Writes `log_scale,value` rows.
pub fn write_scan_csv(points: &[ScanPoint], path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    writeln!(file, "log_scale,value")?;
    for point in points {
        writeln!(file, "{},{}", point.log_scale, point.value)?;
    }
    Ok(())
}

/// One point of an angle scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnglePoint {
    /// Index of the magnitude the scenario moves: `s_12^2`, `c_13^4`, `s_23^2`.
    pub scenario: usize,
    /// `log10 Λ` of the point.
    pub log_scale: f64,
    /// Scanned value in `[0, 1]`; unset in the limit scan.
    #[serde(default)]
    pub angle: Option<f64>,
    /// Log-likelihood, NaN where the mixing is forbidden.
    pub llh: f64,
}

/// Writes `scenario,log_scale,angle,llh` rows; a missing angle is left empty.
pub fn write_angle_csv(points: &[AnglePoint], path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    writeln!(file, "scenario,log_scale,angle,llh")?;
    for point in points {
        let angle = point.angle.map(|angle| angle.to_string()).unwrap_or_default();
        writeln!(file, "{},{},{},{}", point.scenario, point.log_scale, angle, point.llh)?;
    }
    Ok(())
}

/// Copy of `config` whose external likelihood minimises over the fitter's
/// nuisances instead of evaluating at fixed values.
fn profiled(config: &AnalysisConfig) -> AnalysisConfig {
    let mut config = config.clone();
    if config.llh.likelihood.is_external() {
        config.llh.likelihood = Likelihood::ExternalFreq;
    }
    config
}

fn scale_factory(config: &AnalysisConfig, fitter: Option<FitterFactory>) -> Result<EvaluatorFactory, FrError> {
    let factory = evaluator_factory(config, fitter)?;
    if !factory.sampled_defs().iter().any(|def| def.name == SCALE) {
        return Err(FrError::Configuration(
            ErrorInfo::new("scan-scale-fixed", "a scale scan needs a free scale")
                .with_hint("unset fix_scale"),
        ));
    }
    config.scan.validate()?;
    Ok(factory)
}

/// Log-evidence at each scale bin with `log10 Λ` held fixed.
///
/// Every bin runs nested sampling over the remaining sampled parameters and
/// leaves its artefacts under `<output_prefix>bin<NN>_`. The table is written
/// to `<output_prefix>bayesian.csv`.
pub fn bayesian_scale_scan(config: &AnalysisConfig, fitter: Option<FitterFactory>) -> Result<Vec<ScanPoint>, FrError> {
    let mut factory = scale_factory(config, fitter)?;
    let scan = &config.scan;
    let grid = scan_grid(factory.settings().log_scale_region, scan.bins);
    let mut points = Vec::new();
    for (index, &log_scale) in grid.iter().enumerate() {
        if !scan.evaluates(index) {
            continue;
        }
        factory.set_sampled_value(SCALE, log_scale)?;
        let projected = ProjectedPosterior::by_tag(factory.build()?, &[ParamTag::Scale], true);
        let free = projected.free_set();
        let nest = NestConfig {
            live_points: scan.live_points,
            tolerance: scan.tolerance,
            output_prefix: with_suffix(&scan.output_prefix, &format!("bin{index:02}_")),
            ..config.nest.clone()
        };
        info!(bin = index, log_scale, "fixed-scale evidence");
        let result = run_nested(projected, UnitCube::from_params(&free), &nest, &free.names())?;
        points.push(ScanPoint {
            log_scale,
            value: result.ln_evidence,
            best_fit: None,
        });
    }
    let table = with_suffix(&scan.output_prefix, "bayesian.csv");
    write_scan_csv(&points, &table).map_err(|err| FrError::io("scan-write", err, &table))?;
    Ok(points)
}

fn index_of(evaluator: &LikelihoodEvaluator, name: &str) -> Result<usize, FrError> {
    evaluator.sampled().index_of(name).ok_or_else(|| {
        FrError::Configuration(
            ErrorInfo::new("scan-parameters", "frequentist scan needs all mixing angles free")
                .with_context("name", name)
                .with_hint("unset fix_mixing and fix_mixing_almost"),
        )
    })
}

fn penalised(result: Result<f64, FrError>) -> Result<f64, FrError> {
    match result {
        Ok(llh) if llh.is_finite() => Ok(-llh),
        Ok(_) => Ok(FORBIDDEN_PENALTY),
        Err(err) if err.is_forbidden() || matches!(err, FrError::Fitter(_)) => {
            debug!(code = %err.info().code, "penalised scan point");
            Ok(FORBIDDEN_PENALTY)
        }
        Err(err) => Err(err),
    }
}

/// Best log-likelihood at each scale bin, maximised over the three mixing
/// magnitudes with the phase at zero.
///
/// An external likelihood always runs in minimising mode. Other sampled
/// coordinates stay at their current values. Forbidden points and fitter
/// failures score [`FORBIDDEN_PENALTY`]. The table is written to
/// `<output_prefix>frequentist.csv`.
pub fn frequentist_scale_scan(
    config: &AnalysisConfig,
    fitter: Option<FitterFactory>,
) -> Result<Vec<ScanPoint>, FrError> {
    let config = &profiled(config);
    let (mut evaluator, slots) = mixing_evaluator(config, fitter)?;
    let MixingSlots { magnitudes, phase, scale } = slots;
    let scan = &config.scan;
    let mut base = evaluator.sampled().values();
    base[phase] = 0.0;

    let grid = scan_grid(evaluator.settings().log_scale_region, scan.bins);
    let mut points = Vec::new();
    for (index, &log_scale) in grid.iter().enumerate() {
        if !scan.evaluates(index) {
            continue;
        }
        base[scale] = log_scale;
        let objective = |x: &[f64]| {
            let mut theta = base.clone();
            for (&slot, &value) in magnitudes.iter().zip(x) {
                theta[slot] = value;
            }
            penalised(evaluator.triangle_llh(&theta))
        };
        let best = minimize(objective, &MAGNITUDE_START, &[[0.0, 1.0]; 3], &scan.search)?;
        info!(bin = index, log_scale, llh = -best.value, evaluations = best.evaluations, "frequentist scan bin");
        points.push(ScanPoint {
            log_scale,
            value: -best.value,
            best_fit: Some(best.x),
        });
    }
    let table = with_suffix(&scan.output_prefix, "frequentist.csv");
    write_scan_csv(&points, &table).map_err(|err| FrError::io("scan-write", err, &table))?;
    Ok(points)
}

/// Mixing-angle and scale coordinates of a scan evaluator.
struct MixingSlots {
    magnitudes: Vec<usize>,
    phase: usize,
    scale: usize,
}

fn mixing_evaluator(config: &AnalysisConfig, fitter: Option<FitterFactory>) -> Result<(LikelihoodEvaluator, MixingSlots), FrError> {
    let factory = scale_factory(config, fitter)?;
    let evaluator = factory.build()?;
    let magnitudes = MAGNITUDES
        .iter()
        .map(|name| index_of(&evaluator, name))
        .collect::<Result<Vec<_>, _>>()?;
    let phase = index_of(&evaluator, PHASE)?;
    let scale = index_of(&evaluator, SCALE)?;
    Ok((evaluator, MixingSlots { magnitudes, phase, scale }))
}

fn llh_or_nan(result: Result<f64, FrError>) -> Result<f64, FrError> {
    match result {
        Ok(llh) => Ok(llh),
        Err(err) if err.is_forbidden() => {
            debug!(code = %err.info().code, "forbidden angle point");
            Ok(f64::NAN)
        }
        Err(err) => Err(err),
    }
}

/// Magnitude value that rotates the scenario's mixing angle by `theta`.
fn scenario_magnitude(scenario: usize, theta: f64) -> f64 {
    match scenario {
        1 => theta.cos().powi(4),
        _ => theta.sin().powi(2),
    }
}

/// Log-likelihood across the scale grid with one mixing angle rotated to
/// `π/2` and the other magnitudes and the phase at zero.
///
/// There is one scenario per magnitude, in the order `s_12^2`, `c_13^4`,
/// `s_23^2`. An external likelihood runs in minimising mode. Forbidden
/// points record NaN. The table is written to `<output_prefix>angles_limit.csv`.
pub fn angles_limit_scan(config: &AnalysisConfig, fitter: Option<FitterFactory>) -> Result<Vec<AnglePoint>, FrError> {
    let config = &profiled(config);
    let (mut evaluator, slots) = mixing_evaluator(config, fitter)?;
    let scan = &config.scan;
    let grid = scan_grid(evaluator.settings().log_scale_region, scan.bins);
    let base = evaluator.sampled().values();
    let mut points = Vec::new();
    for scenario in 0..ANGLE_SCENARIOS {
        let mut theta = base.clone();
        for (which, &slot) in slots.magnitudes.iter().enumerate() {
            theta[slot] = if which == scenario { scenario_magnitude(scenario, FRAC_PI_2) } else { 0.0 };
        }
        theta[slots.phase] = 0.0;
        info!(scenario, magnitude = MAGNITUDES[scenario], "angle limit scan");
        for (index, &log_scale) in grid.iter().enumerate() {
            if !scan.evaluates(index) {
                continue;
            }
            theta[slots.scale] = log_scale;
            let llh = llh_or_nan(evaluator.triangle_llh(&theta))?;
            points.push(AnglePoint {
                scenario,
                log_scale,
                angle: None,
                llh,
            });
        }
    }
    let table = with_suffix(&scan.output_prefix, "angles_limit.csv");
    write_angle_csv(&points, &table).map_err(|err| FrError::io("scan-write", err, &table))?;
    Ok(points)
}

/// Log-likelihood over the scale grid crossed with a `[0, 1]` grid of one
/// mixing angle, with every other magnitude and the phase at zero.
///
/// A grid value `a` sets the scenario's angle to `asin(sqrt(a)) / 2`. Scale
/// bins honour `eval_bins`; the angle grid has the same number of bins. An
/// external likelihood runs in minimising mode. Forbidden points record NaN.
/// The table is written to `<output_prefix>angles_corr.csv`.
pub fn angles_correlation_scan(
    config: &AnalysisConfig,
    fitter: Option<FitterFactory>,
) -> Result<Vec<AnglePoint>, FrError> {
    let config = &profiled(config);
    let (mut evaluator, slots) = mixing_evaluator(config, fitter)?;
    let scan = &config.scan;
    let scales = scan_grid(evaluator.settings().log_scale_region, scan.bins);
    let angles = scan_grid([0.0, 1.0], scan.bins);
    let mut theta = evaluator.sampled().values();
    for &slot in &slots.magnitudes {
        theta[slot] = 0.0;
    }
    theta[slots.phase] = 0.0;

    let mut points = Vec::new();
    let mut forbidden = 0usize;
    for scenario in 0..ANGLE_SCENARIOS {
        let slot = slots.magnitudes[scenario];
        info!(scenario, magnitude = MAGNITUDES[scenario], "angle correlation scan");
        for (index, &log_scale) in scales.iter().enumerate() {
            if !scan.evaluates(index) {
                continue;
            }
            theta[slots.scale] = log_scale;
            for &angle in &angles {
                theta[slot] = scenario_magnitude(scenario, angle.sqrt().asin() / 2.0);
                let llh = llh_or_nan(evaluator.triangle_llh(&theta))?;
                if llh.is_nan() {
                    forbidden += 1;
                }
                points.push(AnglePoint {
                    scenario,
                    log_scale,
                    angle: Some(angle),
                    llh,
                });
            }
        }
        theta[slot] = 0.0;
    }
    if forbidden > 0 {
        warn!(forbidden, total = points.len(), "angle correlation scan hit forbidden points");
    }
    let table = with_suffix(&scan.output_prefix, "angles_corr.csv");
    write_angle_csv(&points, &table).map_err(|err| FrError::io("scan-write", err, &table))?;
    Ok(points)
}
