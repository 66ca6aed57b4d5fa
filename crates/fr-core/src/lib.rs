#![deny(missing_docs)]
#![doc = "Core types for the flavour-ratio inference engine: tagged parameters, the error taxonomy, deterministic RNG and the log-density seam both samplers consume."]

pub mod errors;
pub mod params;
pub mod rng;

pub use errors::{ErrorInfo, FrError, Stage, UNKNOWN_PARAMETER};
pub use params::{ParamTag, Parameter, ParameterDef, ParameterSet, Prior, Range};
pub use rng::{derive_substream_seed, RngHandle};

/// Log-posterior evaluated at a physical parameter vector.
///
/// This is the single interface both sampling engines drive. Implementations
/// return `Ok(f64::NEG_INFINITY)` for rejected or forbidden points and reserve
/// `Err` for faults that must abort the run (shape mismatches, fitter
/// failures).
pub trait LogDensity {
    /// Number of coordinates expected in `theta`.
    fn dimension(&self) -> usize;

    /// Evaluates the log-density at `theta`.
    fn ln_density(&mut self, theta: &[f64]) -> Result<f64, FrError>;
}

impl<D: LogDensity + ?Sized> LogDensity for &mut D {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn ln_density(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        (**self).ln_density(theta)
    }
}

impl<D: LogDensity + ?Sized> LogDensity for Box<D> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn ln_density(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        (**self).ln_density(theta)
    }
}

/// Adapts a closure into a [`LogDensity`].
#[derive(Debug, Clone)]
pub struct FnDensity<F> {
    dimension: usize,
    func: F,
}

impl<F> FnDensity<F>
where
    F: FnMut(&[f64]) -> f64,
{
    /// Wraps an infallible closure of the given dimension.
    pub fn new(dimension: usize, func: F) -> Self {
        Self { dimension, func }
    }
}

impl<F> LogDensity for FnDensity<F>
where
    F: FnMut(&[f64]) -> f64,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn ln_density(&mut self, theta: &[f64]) -> Result<f64, FrError> {
        if theta.len() != self.dimension {
            return Err(FrError::Shape(
                ErrorInfo::new("theta-length", "parameter vector does not match the density")
                    .with_context("expected", self.dimension.to_string())
                    .with_context("received", theta.len().to_string()),
            ));
        }
        Ok((self.func)(theta))
    }
}
