//! Unit-hypercube adaptation of a physical log-density.

use fr_core::errors::{ErrorInfo, FrError};
use fr_core::{LogDensity, ParameterSet, Range};

/// Linear map from `[0, 1]^n` onto a box of parameter ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCube {
    ranges: Vec<Range>,
}

impl UnitCube {
    /// Box spanned by explicit ranges.
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// Box spanned by the ranges of `params`.
    pub fn from_params(params: &ParameterSet) -> Self {
        Self::new(params.ranges())
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.ranges.len()
    }

    /// Physical point for `cube`. Corners map exactly onto range bounds.
    pub fn transform(&self, cube: &[f64]) -> Result<Vec<f64>, FrError> {
        if cube.len() != self.ranges.len() {
            return Err(FrError::Shape(
                ErrorInfo::new("cube-length", "cube point does not match the box")
                    .with_context("expected", self.ranges.len().to_string())
                    .with_context("received", cube.len().to_string()),
            ));
        }
        Ok(cube
            .iter()
            .zip(&self.ranges)
            .map(|(u, [lo, hi])| lo * (1.0 - u) + hi * u)
            .collect())
    }
}

/// Log-likelihood over the unit cube, delegating to a physical density.
#[derive(Debug)]
pub struct CubeDensity<D> {
    cube: UnitCube,
    density: D,
}

impl<D: LogDensity> CubeDensity<D> {
    /// Pairs a density with the box it is sampled over.
    pub fn new(cube: UnitCube, density: D) -> Result<Self, FrError> {
        if cube.dimension() != density.dimension() {
            return Err(FrError::Shape(
                ErrorInfo::new("cube-dimension", "box and density dimensions differ")
                    .with_context("box", cube.dimension().to_string())
                    .with_context("density", density.dimension().to_string()),
            ));
        }
        Ok(Self { cube, density })
    }

    /// The box.
    pub fn cube(&self) -> &UnitCube {
        &self.cube
    }

    /// Log-likelihood at `point`; NaN is reported as `-inf`.
    pub fn ln_likelihood(&mut self, point: &[f64]) -> Result<f64, FrError> {
        let physical = self.cube.transform(point)?;
        let value = self.density.ln_density(&physical)?;
        Ok(if value.is_nan() { f64::NEG_INFINITY } else { value })
    }

    /// Releases the wrapped density.
    pub fn into_inner(self) -> D {
        self.density
    }
}
