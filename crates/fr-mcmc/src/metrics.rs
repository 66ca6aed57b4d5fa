use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Acceptance statistics gathered over the recorded steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Accepted proposals per walker.
    pub accepted: Vec<usize>,
    /// Proposals per walker (the recorded step count).
    pub proposed: usize,
    /// Per-walker acceptance fraction.
    pub acceptance_fraction: Vec<f64>,
    /// Mean of `acceptance_fraction`.
    pub mean_acceptance: f64,
    /// Recorded proposals whose log-posterior was `-inf`.
    pub rejections: usize,
    /// Log-posterior evaluations over the whole run, burn-in included.
    pub evaluations: usize,
}

impl Diagnostics {
    /// Derives fractions from raw counts.
    pub fn from_counts(accepted: Vec<usize>, proposed: usize, rejections: usize, evaluations: usize) -> Self {
        let acceptance_fraction: Vec<f64> = accepted
            .iter()
            .map(|&count| if proposed == 0 { 0.0 } else { count as f64 / proposed as f64 })
            .collect();
        let mean_acceptance = if acceptance_fraction.is_empty() {
            0.0
        } else {
            acceptance_fraction.iter().sum::<f64>() / acceptance_fraction.len() as f64
        };
        Self {
            accepted,
            proposed,
            acceptance_fraction,
            mean_acceptance,
            rejections,
            evaluations,
        }
    }

    /// Writes per-walker acceptance to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "walker,accepted,proposed,acceptance_fraction")?;
        for (walker, (accepted, fraction)) in self
            .accepted
            .iter()
            .zip(&self.acceptance_fraction)
            .enumerate()
        {
            writeln!(file, "{walker},{accepted},{},{fraction:.6}", self.proposed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_follow_counts() {
        let diagnostics = Diagnostics::from_counts(vec![2, 4], 4, 1, 20);
        assert_eq!(diagnostics.acceptance_fraction, vec![0.5, 1.0]);
        assert!((diagnostics.mean_acceptance - 0.75).abs() < 1e-12);
    }
}
