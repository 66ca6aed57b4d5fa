//! Scale limits from a fixed-scale evidence scan.

use fr_core::errors::{ErrorInfo, FrError};
use tracing::{info, warn};

/// Log-evidence relative to the smallest scale, `ln Z(Λ) - ln Z(Λ_min)`.
pub fn reduced_evidence(ln_evidence: &[f64]) -> Vec<f64> {
    let null = ln_evidence.first().copied().unwrap_or(0.0);
    ln_evidence.iter().map(|value| value - null).collect()
}

fn check_scan(log_scales: &[f64], ln_evidence: &[f64]) -> Result<(), FrError> {
    if log_scales.len() != ln_evidence.len() || log_scales.len() < 2 {
        return Err(FrError::Shape(
            ErrorInfo::new("scan-length", "need at least two scales with one evidence each")
                .with_context("scales", log_scales.len().to_string())
                .with_context("evidences", ln_evidence.len().to_string()),
        ));
    }
    if log_scales.windows(2).any(|pair| !(pair[0] < pair[1])) {
        return Err(FrError::configuration("scan-order", "scales must be strictly increasing"));
    }
    if !ln_evidence[0].is_finite() {
        return Err(FrError::Domain(
            ErrorInfo::new("null-evidence", "the smallest scale has no finite evidence")
                .with_hint("extend the scan towards smaller scales"),
        ));
    }
    Ok(())
}

/// First `log10 Λ` at which the Bayes factor of the null (smallest scale)
/// against the scale reaches `10^k`.
///
/// The scan is interpolated linearly between bins. Returns `Ok(None)` when no
/// scanned scale is excluded. A hypothesis favoured over the null by more
/// than the threshold is a `discovery` configuration error, since no limit can
/// be set.
pub fn bayes_factor_limit(log_scales: &[f64], ln_evidence: &[f64], k: f64) -> Result<Option<f64>, FrError> {
    check_scan(log_scales, ln_evidence)?;
    if !(k.is_finite() && k > 0.0) {
        return Err(FrError::configuration("bayes-threshold", "threshold must be positive"));
    }
    let threshold = k * std::f64::consts::LN_10;
    let reduced = reduced_evidence(ln_evidence);

    let favoured = reduced.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if favoured > threshold {
        return Err(FrError::Configuration(
            ErrorInfo::new("discovery", "a non-null scale is favoured beyond the threshold")
                .with_context("ln_bayes_factor", favoured.to_string())
                .with_context("threshold", threshold.to_string()),
        ));
    }

    // bayes factor of the null against each scale
    let factor: Vec<f64> = reduced.iter().map(|value| -value).collect();
    if let Some(&last) = factor.last() {
        if last < threshold - 0.1 {
            warn!(
                ln_bayes_factor = last,
                threshold, "largest scanned scale is not excluded"
            );
        }
    }

    for i in 1..factor.len() {
        if factor[i] < threshold {
            continue;
        }
        let (lo, hi) = (factor[i - 1], factor[i]);
        let limit = if hi.is_finite() && hi > lo {
            log_scales[i - 1] + (threshold - lo) / (hi - lo) * (log_scales[i] - log_scales[i - 1])
        } else {
            log_scales[i]
        };
        info!(log_scale = limit, k, "scale limit");
        return Ok(Some(limit));
    }
    Ok(None)
}
