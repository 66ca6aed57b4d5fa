//! Serializable sampler state and the points it tracks.

use serde::{Deserialize, Serialize};

/// Serializes non-finite log values as `null` and reads `null` back as `-inf`.
pub(crate) mod ln_value {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// A point of the live set, in unit-cube coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePoint {
    /// Unit-cube coordinates.
    pub cube: Vec<f64>,
    /// Log-likelihood.
    #[serde(with = "ln_value")]
    pub ln_likelihood: f64,
}

/// A discarded point with its posterior weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadPoint {
    /// Physical coordinates.
    pub theta: Vec<f64>,
    /// Log-likelihood.
    #[serde(with = "ln_value")]
    pub ln_likelihood: f64,
    /// Log of the prior-volume shell times the likelihood.
    #[serde(with = "ln_value")]
    pub ln_weight: f64,
}

/// Everything needed to continue a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedState {
    /// Dimension of the cube.
    pub ndim: usize,
    /// Completed iterations.
    pub iteration: usize,
    /// Live set.
    pub live: Vec<LivePoint>,
    /// Accumulated log-evidence.
    #[serde(with = "ln_value")]
    pub ln_evidence: f64,
    /// Accumulated information (nats).
    pub information: f64,
    /// Log of the remaining prior volume.
    pub ln_volume: f64,
    /// Random-walk step size in cube units.
    pub step: f64,
    /// Likelihood evaluations so far.
    pub evaluations: usize,
    /// Discarded points.
    pub dead: Vec<DeadPoint>,
}

/// Numerically safe `ln(e^a + e^b)`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

impl NestedState {
    /// Adds a weighted point to the evidence and the information.
    pub fn accumulate(&mut self, ln_weight: f64, ln_likelihood: f64) {
        if ln_weight == f64::NEG_INFINITY {
            return;
        }
        let updated = log_add_exp(self.ln_evidence, ln_weight);
        let previous = if self.ln_evidence == f64::NEG_INFINITY {
            0.0
        } else {
            (self.ln_evidence - updated).exp() * (self.information + self.ln_evidence)
        };
        self.information = (ln_weight - updated).exp() * ln_likelihood + previous - updated;
        self.ln_evidence = updated;
    }

    /// Index and value of the lowest live likelihood.
    pub fn worst(&self) -> (usize, f64) {
        self.live
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(best, value), (index, point)| {
                if point.ln_likelihood < value {
                    (index, point.ln_likelihood)
                } else {
                    (best, value)
                }
            })
    }

    /// Highest live likelihood.
    pub fn best(&self) -> f64 {
        self.live
            .iter()
            .map(|point| point.ln_likelihood)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// True once the live set can no longer move `ln Z` by `tolerance`.
    pub fn converged(&self, tolerance: f64) -> bool {
        if self.ln_evidence == f64::NEG_INFINITY {
            return false;
        }
        let remaining = self.best() + self.ln_volume;
        log_add_exp(self.ln_evidence, remaining) - self.ln_evidence < tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_add_exp_handles_infinities() {
        assert_eq!(log_add_exp(f64::NEG_INFINITY, 1.5), 1.5);
        assert!((log_add_exp(0.0, 0.0) - 2f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn negative_infinity_survives_json() {
        let point = LivePoint {
            cube: vec![0.25],
            ln_likelihood: f64::NEG_INFINITY,
        };
        let json = serde_json::to_string(&point).unwrap();
        let back: LivePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }
}
