//! Adapter that exposes a bounded estimation problem as an `argmin`
//! problem over the unconstrained internal space.
//!
//! The cost is the objective itself (a negative log-posterior is already
//! a minimization target), evaluated at `to_bounded(y)`. Analytic
//! gradients (when the objective provides them) are projected to free
//! coordinates and mapped through the chain rule. Otherwise the **cost**
//! closure is finite-differenced in internal space, so no chain rule is
//! needed in that branch.
use std::cell::RefCell;

use argmin::core::{CostFunction, Error, Gradient as ArgminGradient};
use finitediff::FiniteDiff;

use crate::{
    errors::FitError,
    optimize::transforms::BoundTransform,
    problem::Problem,
    types::{Gradient, Parameters},
};

/// Bridges a [`Problem`] to `argmin`'s `CostFunction` and `Gradient`.
///
/// - `CostFunction::cost` returns the objective at the bounded image of
///   the internal point; non-finite values are reported as errors so the
///   enclosing start can be recorded as failed.
/// - `Gradient::gradient` returns the chain-ruled analytic gradient, or
///   a finite-difference gradient of the cost.
#[derive(Clone)]
pub struct ObjectiveAdapter<'a> {
    problem: &'a Problem,
    transform: &'a BoundTransform,
}

impl<'a> ObjectiveAdapter<'a> {
    pub fn new(problem: &'a Problem, transform: &'a BoundTransform) -> Self {
        Self { problem, transform }
    }
}

impl CostFunction for ObjectiveAdapter<'_> {
    type Param = Parameters;
    type Output = f64;

    /// Evaluate the objective at the bounded image of `y`.
    ///
    /// # Errors
    /// - Propagates objective errors via `?`.
    /// - [`FitError::ObjectiveFailure`] for a non-finite value.
    fn cost(&self, y: &Self::Param) -> Result<Self::Output, Error> {
        let x = self.transform.to_bounded(y);
        let value = self.problem.value_free(&x).map_err(FitError::from)?;
        if !value.is_finite() {
            return Err(FitError::ObjectiveFailure {
                text: format!("non-finite objective value {value}"),
            }
            .into());
        }
        Ok(value)
    }
}

impl ArgminGradient for ObjectiveAdapter<'_> {
    type Param = Parameters;
    type Gradient = Gradient;

    /// Evaluate the internal-space gradient at `y`.
    ///
    /// Behavior:
    /// - With an analytic objective gradient: project to free
    ///   coordinates, validate, and chain through the transform.
    /// - Without one: finite-difference the cost closure, central first;
    ///   if a cost evaluation failed (captured via `closure_err`) or the
    ///   result fails validation, retry with forward differences.
    ///
    /// The FD closure must return `f64`, so errors raised inside it are
    /// captured into a `RefCell` and surfaced afterwards; the closure
    /// itself returns NaN at the failing point.
    fn gradient(&self, y: &Self::Param) -> Result<Self::Gradient, Error> {
        let dim = y.len();
        if self.problem.objective().provides_grad() {
            let x = self.transform.to_bounded(y);
            let grad_x = self.problem.grad_free(&x).map_err(FitError::from)?;
            validate_grad(&grad_x, dim)?;
            return Ok(self.transform.chain_gradient(y, &grad_x));
        }
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let cost_fn = |point: &Parameters| -> f64 {
            match self.cost(point) {
                Ok(value) => value,
                Err(err) => {
                    let mut slot = closure_err.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    f64::NAN
                }
            }
        };
        let fd_grad = y.central_diff(&cost_fn);
        if closure_err.borrow().is_some() {
            return run_forward_diff(y, &cost_fn, &closure_err);
        }
        match validate_grad(&fd_grad, dim) {
            Ok(()) => Ok(fd_grad),
            Err(_) => run_forward_diff(y, &cost_fn, &closure_err),
        }
    }
}

/// Check length and finiteness of a gradient.
fn validate_grad(grad: &Gradient, dim: usize) -> Result<(), Error> {
    if grad.len() != dim {
        return Err(FitError::GradientDimMismatch { expected: dim, found: grad.len() }.into());
    }
    if let Some((i, v)) = grad.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(FitError::ObjectiveFailure {
            text: format!("non-finite gradient entry {v} at index {i}"),
        }
        .into());
    }
    Ok(())
}

/// Forward-difference fallback with error capture, mirroring the central
/// path: clear the capture slot, differentiate, surface any captured
/// error, then validate.
fn run_forward_diff<G: Fn(&Parameters) -> f64>(
    y: &Parameters, cost_fn: &G, closure_err: &RefCell<Option<Error>>,
) -> Result<Gradient, Error> {
    closure_err.replace(None);
    let fd_grad = y.forward_diff(cost_fn);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&fd_grad, y.len())?;
    Ok(fd_grad)
}
