//! objective — the cost-function abstraction the whole toolbox runs on.
//!
//! Purpose
//! -------
//! Define the [`Objective`] trait (negative log-likelihood / generic cost
//! with optional derivative information) plus the combinators the
//! estimation workflows need: closure-backed objectives, least-squares
//! objectives, sums of objectives, parameter priors, finite-difference
//! fillers, evaluation tracing, and gradient checks.
//!
//! Key behaviors
//! -------------
//! - Required surface: `value` and `dim`. Derivatives (`grad`, `hess`,
//!   `residuals`, `sres`) default to a structured "not provided" error and
//!   are advertised through `provides_*` capability flags.
//! - Combinators never change the parameter dimension; they delegate and
//!   post-process.
//! - Everything is `Send + Sync` so the multi-threaded engine can share
//!   objectives across optimization starts.
//!
//! Invariants & assumptions
//! ------------------------
//! - Values are negative log-likelihoods (or any cost to be minimized);
//!   smaller is better everywhere in the crate.
//! - A non-finite value is data, not an error: exploration may step into
//!   undefined regions and callers decide how to react.
//! - `provides_*` flags agree with the corresponding methods: a flag may
//!   only be `true` when the method returns `Ok` for valid input.
//!
//! Conventions
//! -----------
//! - All methods take full-length parameter vectors; restriction to a free
//!   subspace is the job of [`crate::problem::Problem`].
//! - Gradients match `x` in length; Hessians are `n × n`; residual
//!   Jacobians are `m × n` with one row per residual.
//!
//! Downstream usage
//! ----------------
//! - `Problem` owns an objective and exposes reduced-space evaluation.
//! - The optimizer adapter calls `value`/`grad` through `Problem`.
//! - Profiles probe `value` directly when proposing step lengths.
//!
//! Testing notes
//! -------------
//! - Each combinator carries its own unit tests against closed-form
//!   objectives; the trait itself is exercised through them.
mod aggregated;
mod check;
mod fd;
mod function;
mod history;
mod priors;

pub use aggregated::AggregatedObjective;
pub use check::{check_grad, check_grad_multi_eps, GradientCheck, GradientCheckRow};
pub use fd::{DeltaUpdate, FdDelta, FdMethod, FdObjective, FdSwitch};
pub use function::{FnObjective, ResidualObjective};
pub use history::{HistoryEntry, MemoryHistory, TracedObjective};
pub use priors::{NegLogPriors, ParameterPrior, PriorKind};

use crate::{
    errors::{FitError, FitResult},
    types::{Gradient, HessianMatrix, JacobianMatrix, Parameters, Residuals},
};

/// User-implemented cost interface.
///
/// Implementors provide a value to *minimize* — conventionally a negative
/// log-likelihood or negative log-posterior. Derivative methods are
/// optional; leave them to their defaults and the corresponding
/// `provides_*` flag at `false` when a quantity is unavailable, or wrap
/// the objective in [`FdObjective`] to fill the gaps numerically.
///
/// Required:
/// - `dim() -> usize`: length of the parameter vector.
/// - `value(&Parameters) -> FitResult<f64>`: evaluate the cost.
///
/// Optional:
/// - `grad`, `hess`: first and second derivatives of the value.
/// - `residuals`, `sres`: residual vector and its Jacobian for
///   least-squares objectives (`value = ½‖r‖²` by convention).
pub trait Objective: Send + Sync {
    // Required methods
    fn dim(&self) -> usize;
    fn value(&self, x: &Parameters) -> FitResult<f64>;

    // Optional methods
    fn grad(&self, _x: &Parameters) -> FitResult<Gradient> {
        Err(FitError::SensitivityUnavailable { what: "grad" })
    }

    fn hess(&self, _x: &Parameters) -> FitResult<HessianMatrix> {
        Err(FitError::SensitivityUnavailable { what: "hess" })
    }

    fn residuals(&self, _x: &Parameters) -> FitResult<Residuals> {
        Err(FitError::SensitivityUnavailable { what: "residuals" })
    }

    fn sres(&self, _x: &Parameters) -> FitResult<JacobianMatrix> {
        Err(FitError::SensitivityUnavailable { what: "sres" })
    }

    // Capability flags
    fn provides_grad(&self) -> bool {
        false
    }

    fn provides_hess(&self) -> bool {
        false
    }

    fn provides_residuals(&self) -> bool {
        false
    }

    fn provides_sres(&self) -> bool {
        false
    }

    /// Short label used in logs and summaries.
    fn name(&self) -> &str {
        "objective"
    }
}

impl Objective for Box<dyn Objective> {
    fn dim(&self) -> usize {
        self.as_ref().dim()
    }

    fn value(&self, x: &Parameters) -> FitResult<f64> {
        self.as_ref().value(x)
    }

    fn grad(&self, x: &Parameters) -> FitResult<Gradient> {
        self.as_ref().grad(x)
    }

    fn hess(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        self.as_ref().hess(x)
    }

    fn residuals(&self, x: &Parameters) -> FitResult<Residuals> {
        self.as_ref().residuals(x)
    }

    fn sres(&self, x: &Parameters) -> FitResult<JacobianMatrix> {
        self.as_ref().sres(x)
    }

    fn provides_grad(&self) -> bool {
        self.as_ref().provides_grad()
    }

    fn provides_hess(&self) -> bool {
        self.as_ref().provides_hess()
    }

    fn provides_residuals(&self) -> bool {
        self.as_ref().provides_residuals()
    }

    fn provides_sres(&self) -> bool {
        self.as_ref().provides_sres()
    }

    fn name(&self) -> &str {
        self.as_ref().name()
    }
}
