//! Bounded derivative-free minimisation on argmin's Nelder-Mead simplex.

use std::cell::{Cell, RefCell};

use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::neldermead::NelderMead;
use fr_core::errors::{ErrorInfo, FrError};
use fr_core::Range;
use serde::{Deserialize, Serialize};

/// Simplex-search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Initial simplex edge, as a fraction of each coordinate's range.
    #[serde(default = "default_initial_step")]
    pub initial_step: f64,
    /// Stop once the spread of objective values over the simplex falls below this.
    #[serde(default = "default_sd_tolerance")]
    pub sd_tolerance: f64,
    /// Simplex iteration cap.
    #[serde(default = "default_max_iters")]
    pub max_iters: u64,
}

fn default_initial_step() -> f64 {
    0.25
}

fn default_sd_tolerance() -> f64 {
    1e-10
}

fn default_max_iters() -> u64 {
    1000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_step: default_initial_step(),
            sd_tolerance: default_sd_tolerance(),
            max_iters: default_max_iters(),
        }
    }
}

impl SearchConfig {
    /// Rejects settings the simplex cannot start or stop with.
    pub fn validate(&self) -> Result<(), FrError> {
        let ok = self.initial_step > 0.0
            && self.initial_step <= 1.0
            && self.sd_tolerance > 0.0
            && self.max_iters > 0;
        if !ok {
            return Err(FrError::Configuration(
                ErrorInfo::new(
                    "search-steps",
                    "need 0 < initial_step <= 1, a positive tolerance and a positive iteration cap",
                )
                .with_context("initial_step", self.initial_step.to_string())
                .with_context("sd_tolerance", self.sd_tolerance.to_string())
                .with_context("max_iters", self.max_iters.to_string()),
            ));
        }
        Ok(())
    }
}

/// Best point found by [`minimize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    /// Location.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
    /// Objective evaluations spent.
    pub evaluations: usize,
    /// Simplex iterations run.
    pub iterations: u64,
}

fn clamp_params(params: &[f64], bounds: &[Range]) -> Vec<f64> {
    params
        .iter()
        .zip(bounds)
        .map(|(&value, &[lo, hi])| value.clamp(lo, hi))
        .collect()
}

/// Objective evaluated at the clamped parameter vector.
///
/// The first error the wrapped objective reports is kept so [`minimize`] can
/// hand the original [`FrError`] back instead of argmin's.
struct BoundedObjective<'a, F> {
    objective: RefCell<F>,
    bounds: &'a [Range],
    evaluations: &'a Cell<usize>,
    failure: &'a RefCell<Option<FrError>>,
}

impl<F> CostFunction for BoundedObjective<'_, F>
where
    F: FnMut(&[f64]) -> Result<f64, FrError>,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        let x = clamp_params(param, self.bounds);
        self.evaluations.set(self.evaluations.get() + 1);
        let result = (self.objective.borrow_mut())(&x);
        match result {
            // The simplex orders vertices by cost and cannot rank NaN.
            Ok(value) if value.is_nan() => Ok(f64::INFINITY),
            Ok(value) => Ok(value),
            Err(err) => {
                let message = err.to_string();
                self.failure.borrow_mut().get_or_insert(err);
                Err(ArgminError::msg(message))
            }
        }
    }
}

fn initial_simplex(x0: &[f64], bounds: &[Range], step: f64) -> Vec<Vec<f64>> {
    let mut simplex = vec![x0.to_vec()];
    for (dim, &[lo, hi]) in bounds.iter().enumerate() {
        let mut offset = step * (hi - lo);
        if x0[dim] + offset > hi {
            offset = -offset;
        }
        let mut vertex = x0.to_vec();
        vertex[dim] += offset;
        simplex.push(vertex);
    }
    simplex
}

/// Minimises `objective` inside `bounds` starting from `init`.
///
/// The simplex moves freely; every vertex is scored at its clamped image, so
/// the objective only ever sees points inside `bounds` and the returned
/// location is clamped as well. Errors from `objective` abort the search.
pub fn minimize<F>(objective: F, init: &[f64], bounds: &[Range], config: &SearchConfig) -> Result<Minimum, FrError>
where
    F: FnMut(&[f64]) -> Result<f64, FrError>,
{
    if init.len() != bounds.len() {
        return Err(FrError::Shape(
            ErrorInfo::new("search-bounds", "start point and bounds differ in length")
                .with_context("init", init.len().to_string())
                .with_context("bounds", bounds.len().to_string()),
        ));
    }
    config.validate()?;
    let x0 = clamp_params(init, bounds);
    let simplex = initial_simplex(&x0, bounds, config.initial_step);

    let evaluations = Cell::new(0);
    let failure = RefCell::new(None);
    let problem = BoundedObjective {
        objective: RefCell::new(objective),
        bounds,
        evaluations: &evaluations,
        failure: &failure,
    };
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(config.sd_tolerance)
        .map_err(|err| FrError::configuration("search-steps", err.to_string()))?;

    let outcome = Executor::new(problem, solver)
        .configure(|state| state.max_iters(config.max_iters))
        .run();
    if let Some(err) = failure.borrow_mut().take() {
        return Err(err);
    }
    let result = outcome.map_err(|err| {
        FrError::Configuration(
            ErrorInfo::new("search-failed", "simplex search did not complete").with_context("reason", err.to_string()),
        )
    })?;

    let state = result.state();
    let best = state.get_best_param().cloned().unwrap_or(x0);
    Ok(Minimum {
        x: clamp_params(&best, bounds),
        value: state.get_best_cost(),
        evaluations: evaluations.get(),
        iterations: state.get_iter(),
    })
}
