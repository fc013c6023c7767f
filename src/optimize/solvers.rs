//! Purpose
//! -------
//! The [`Optimizer`] trait and the two bundled local optimizers:
//! [`LbfgsOptimizer`] (quasi-Newton, choice of line search) and
//! [`NelderMeadOptimizer`] (derivative-free downhill simplex).
//!
//! Key behaviors
//! -------------
//! - `minimize` runs one local optimization from a free-space start and
//!   returns a full-space [`OptimizerResult`].
//! - Bounds are enforced through the smooth internal-coordinate
//!   transform, so every reported point lies inside the box exactly.
//! - Starts outside the box are absorbed by the transform's clamping
//!   rather than rejected.
//! - A problem with every parameter fixed short-circuits to a single
//!   objective evaluation.
//!
//! Invariants & assumptions
//! ------------------------
//! - Option structs are validated before any solver is built, so option
//!   errors surface as crate errors rather than backend errors.
//! - The reported `fval` is the solver's best cost; no recomputation.
//! - The gradient at the solution is recorded in problem space whenever
//!   the objective provides one; evaluation failures there degrade to
//!   `None` with a warning instead of failing the start.
//!
//! Conventions
//! -----------
//! - `x0_free` and all solver work use free parameters; results scatter
//!   back to full space with fixed values filled in (`NaN` in `grad`).
//!
//! Downstream usage
//! ----------------
//! - Called per start by `optimize::minimize`; profiling reuses
//!   `Optimizer::minimize` for each path point.
//!
//! Testing notes
//! -------------
//! - Tests run both optimizers on small quadratics with fixed
//!   parameters and tight boxes; validation failures are checked
//!   per option.

use std::time::Instant;

use tracing::warn;

use crate::{
    errors::{FitError, FitResult},
    optimize::{
        adapter::ObjectiveAdapter,
        builders::{build_lbfgs_hager_zhang, build_lbfgs_more_thuente, build_nelder_mead},
        run::{run_gradient_solver, run_simplex_solver, SolverReport},
        transforms::BoundTransform,
    },
    problem::Problem,
    result::OptimizerResult,
    types::{FnEvalMap, Gradient, Parameters, DEFAULT_LBFGS_MEM},
};

// -------------------------------------------------------------------------
// Trait
// -------------------------------------------------------------------------

/// A local optimizer for bounded problems.
pub trait Optimizer: Send + Sync {
    /// Minimize the problem's objective over its free parameters,
    /// starting from `x0_free` and honoring the box bounds.
    ///
    /// `id` tags the produced result within a multistart run.
    ///
    /// # Errors
    /// - Option validation errors before the solver starts.
    /// - [`FitError::ParameterLengthMismatch`] for a start of the wrong
    ///   length, [`FitError::InvalidOptions`] for a non-finite start.
    /// - Backend failures from the solver run.
    fn minimize(
        &self, problem: &Problem, x0_free: &Parameters, id: usize,
    ) -> FitResult<OptimizerResult>;

    /// Display name used in logs and summaries.
    fn name(&self) -> &str;
}

// -------------------------------------------------------------------------
// L-BFGS
// -------------------------------------------------------------------------

/// Line search used inside L-BFGS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearcher {
    /// Moré–Thuente line search.
    #[default]
    MoreThuente,
    /// Hager–Zhang line search.
    HagerZhang,
}

/// Quasi-Newton optimizer with limited-memory curvature pairs.
///
/// Uses the objective's gradient when provided and falls back to finite
/// differences otherwise (see the adapter).
#[derive(Debug, Clone, PartialEq)]
pub struct LbfgsOptimizer {
    /// Number of curvature pairs kept.
    pub memory: usize,
    pub line_searcher: LineSearcher,
    /// Gradient-norm convergence tolerance; `None` keeps the backend default.
    pub tol_grad: Option<f64>,
    /// Cost-change convergence tolerance; `None` keeps the backend default.
    pub tol_cost: Option<f64>,
    /// Iteration cap; `None` runs until a tolerance fires.
    pub max_iters: Option<u64>,
    /// Attach a terminal observer (needs the `obs_slog` feature).
    pub verbose: bool,
}

impl Default for LbfgsOptimizer {
    fn default() -> Self {
        LbfgsOptimizer {
            memory: DEFAULT_LBFGS_MEM,
            line_searcher: LineSearcher::default(),
            tol_grad: None,
            tol_cost: None,
            max_iters: Some(500),
            verbose: false,
        }
    }
}

impl LbfgsOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_line_searcher(mut self, line_searcher: LineSearcher) -> Self {
        self.line_searcher = line_searcher;
        self
    }

    pub fn with_tol_grad(mut self, tol_grad: f64) -> Self {
        self.tol_grad = Some(tol_grad);
        self
    }

    pub fn with_tol_cost(mut self, tol_cost: f64) -> Self {
        self.tol_cost = Some(tol_cost);
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = Some(max_iters);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check every option before building a solver.
    ///
    /// # Errors
    /// - [`FitError::InvalidLbfgsMem`] for zero memory.
    /// - [`FitError::InvalidTolGrad`]/[`FitError::InvalidTolCost`] for
    ///   non-finite or negative tolerances.
    /// - [`FitError::InvalidMaxIter`] for a zero iteration cap.
    pub fn validate(&self) -> FitResult<()> {
        if self.memory == 0 {
            return Err(FitError::InvalidLbfgsMem { mem: 0, reason: "must be positive" });
        }
        if let Some(tol) = self.tol_grad {
            if !tol.is_finite() || tol < 0.0 {
                return Err(FitError::InvalidTolGrad {
                    tol,
                    reason: "must be finite and non-negative",
                });
            }
        }
        if let Some(tol) = self.tol_cost {
            if !tol.is_finite() || tol < 0.0 {
                return Err(FitError::InvalidTolCost {
                    tol,
                    reason: "must be finite and non-negative",
                });
            }
        }
        if self.max_iters == Some(0) {
            return Err(FitError::InvalidMaxIter { max_iter: 0, reason: "must be positive" });
        }
        Ok(())
    }
}

impl Optimizer for LbfgsOptimizer {
    fn minimize(
        &self, problem: &Problem, x0_free: &Parameters, id: usize,
    ) -> FitResult<OptimizerResult> {
        self.validate()?;
        check_start(problem, x0_free)?;
        let started = Instant::now();
        if problem.dim() == 0 {
            return fixed_point_result(problem, id, started);
        }

        let transform = BoundTransform::new(&problem.lb_free(), &problem.ub_free());
        let z0 = transform.to_internal(x0_free);
        let adapter = ObjectiveAdapter::new(problem, &transform);
        let report = match self.line_searcher {
            LineSearcher::MoreThuente => {
                let solver = build_lbfgs_more_thuente(self)?;
                run_gradient_solver(z0, self.max_iters, self.verbose, adapter, solver)?
            }
            LineSearcher::HagerZhang => {
                let solver = build_lbfgs_hager_zhang(self)?;
                run_gradient_solver(z0, self.max_iters, self.verbose, adapter, solver)?
            }
        };
        finalize(problem, &transform, x0_free, id, report, started)
    }

    fn name(&self) -> &str {
        "L-BFGS"
    }
}

// -------------------------------------------------------------------------
// Nelder–Mead
// -------------------------------------------------------------------------

/// Derivative-free downhill simplex optimizer.
///
/// The initial simplex is spanned from the start point with relative
/// steps per coordinate (absolute near zero).
#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadOptimizer {
    /// Iteration cap; `None` runs until the simplex collapses.
    pub max_iters: Option<u64>,
    /// Standard-deviation convergence tolerance on the simplex values;
    /// `None` keeps the backend default.
    pub sd_tolerance: Option<f64>,
    /// Relative step spanning the initial simplex.
    pub simplex_rel_step: f64,
    /// Absolute step for coordinates at zero.
    pub simplex_abs_step: f64,
}

impl Default for NelderMeadOptimizer {
    fn default() -> Self {
        NelderMeadOptimizer {
            max_iters: Some(1000),
            sd_tolerance: None,
            simplex_rel_step: 0.05,
            simplex_abs_step: 0.00025,
        }
    }
}

impl NelderMeadOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = Some(max_iters);
        self
    }

    pub fn with_sd_tolerance(mut self, sd_tolerance: f64) -> Self {
        self.sd_tolerance = Some(sd_tolerance);
        self
    }

    pub fn with_simplex_steps(mut self, rel_step: f64, abs_step: f64) -> Self {
        self.simplex_rel_step = rel_step;
        self.simplex_abs_step = abs_step;
        self
    }

    /// Check every option before building a solver.
    ///
    /// # Errors
    /// [`FitError::InvalidOptions`] or [`FitError::InvalidMaxIter`] for
    /// out-of-range settings.
    pub fn validate(&self) -> FitResult<()> {
        if let Some(tol) = self.sd_tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return Err(FitError::InvalidOptions {
                    reason: format!(
                        "simplex sd tolerance must be finite and non-negative, got {tol}"
                    ),
                });
            }
        }
        if !self.simplex_rel_step.is_finite() || self.simplex_rel_step == 0.0 {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "simplex relative step must be finite and nonzero, got {}",
                    self.simplex_rel_step
                ),
            });
        }
        if !self.simplex_abs_step.is_finite() || self.simplex_abs_step == 0.0 {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "simplex absolute step must be finite and nonzero, got {}",
                    self.simplex_abs_step
                ),
            });
        }
        if self.max_iters == Some(0) {
            return Err(FitError::InvalidMaxIter { max_iter: 0, reason: "must be positive" });
        }
        Ok(())
    }
}

impl Optimizer for NelderMeadOptimizer {
    fn minimize(
        &self, problem: &Problem, x0_free: &Parameters, id: usize,
    ) -> FitResult<OptimizerResult> {
        self.validate()?;
        check_start(problem, x0_free)?;
        let started = Instant::now();
        if problem.dim() == 0 {
            return fixed_point_result(problem, id, started);
        }

        let transform = BoundTransform::new(&problem.lb_free(), &problem.ub_free());
        let z0 = transform.to_internal(x0_free);
        let adapter = ObjectiveAdapter::new(problem, &transform);
        let solver = build_nelder_mead(self, &z0)?;
        let report = run_simplex_solver(self.max_iters, adapter, solver)?;
        finalize(problem, &transform, x0_free, id, report, started)
    }

    fn name(&self) -> &str {
        "Nelder-Mead"
    }
}

// -------------------------------------------------------------------------
// Shared start checks and result assembly
// -------------------------------------------------------------------------

/// Reject starts of the wrong length or with non-finite coordinates.
fn check_start(problem: &Problem, x0_free: &Parameters) -> FitResult<()> {
    if x0_free.len() != problem.dim() {
        return Err(FitError::ParameterLengthMismatch {
            expected: problem.dim(),
            actual: x0_free.len(),
        });
    }
    for &value in x0_free {
        if !value.is_finite() {
            return Err(FitError::InvalidOptions {
                reason: format!("start point has non-finite coordinate {value}"),
            });
        }
    }
    Ok(())
}

/// Result for a problem with no free parameters: one evaluation at the
/// fixed point, reported as converged.
fn fixed_point_result(
    problem: &Problem, id: usize, started: Instant,
) -> FitResult<OptimizerResult> {
    let x_free = Parameters::zeros(0);
    let x = problem.full_vector(&x_free)?;
    let fval = problem.value_free(&x_free)?;
    let mut fn_evals = FnEvalMap::new();
    fn_evals.insert(String::from("cost_count"), 1);
    Ok(OptimizerResult {
        id,
        x0: x.clone(),
        x,
        fval,
        grad: None,
        hess: None,
        fn_evals,
        n_iterations: 0,
        converged: true,
        status: String::from("All parameters fixed"),
        time: started.elapsed().as_secs_f64(),
    })
}

/// Map a solver report back to problem space and assemble the result.
fn finalize(
    problem: &Problem, transform: &BoundTransform, x0_free: &Parameters, id: usize,
    report: SolverReport, started: Instant,
) -> FitResult<OptimizerResult> {
    let x_free = transform.to_bounded(&report.z_best);
    for (index, &value) in x_free.iter().enumerate() {
        if !value.is_finite() {
            return Err(FitError::InvalidSolution {
                index,
                value,
                reason: "non-finite coordinate after bound transform",
            });
        }
    }

    let grad = if problem.objective().provides_grad() {
        match problem.grad_free(&x_free) {
            Ok(grad_free) => Some(scatter_free_gradient(problem, &grad_free)),
            Err(err) => {
                warn!("Gradient evaluation at the solution failed: {}", err);
                None
            }
        }
    } else {
        None
    };
    let x_full = problem.full_vector(&x_free)?;
    let hess = if problem.objective().provides_hess() {
        match problem.objective().hess(&x_full) {
            Ok(hess) => Some(hess),
            Err(err) => {
                warn!("Hessian evaluation at the solution failed: {}", err);
                None
            }
        }
    } else {
        None
    };

    Ok(OptimizerResult {
        id,
        x0: problem.full_vector(x0_free)?,
        x: x_full,
        fval: report.cost_best,
        grad,
        hess,
        fn_evals: report.fn_evals,
        n_iterations: report.iterations,
        converged: report.converged,
        status: report.status,
        time: started.elapsed().as_secs_f64(),
    })
}

/// Spread a free-space gradient over the full space, `NaN` at fixed
/// indices where the objective was never differentiated.
fn scatter_free_gradient(problem: &Problem, grad_free: &Gradient) -> Gradient {
    let mut grad = Gradient::from_elem(problem.dim_full(), f64::NAN);
    for (&index, &value) in problem.x_free_indices().iter().zip(grad_free.iter()) {
        grad[index] = value;
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::FnObjective;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Both optimizers end-to-end on a quadratic with a fixed parameter.
    // - Exact bound satisfaction when the minimum lies outside the box.
    // - The all-fixed short circuit and option validation.
    //
    // They intentionally DO NOT cover:
    // - Multistart orchestration (api tests).
    // -------------------------------------------------------------------------

    fn fixed_quadratic() -> Problem {
        let objective = FnObjective::new(3, |x: &Parameters| {
            (x[0] - 1.0).powi(2) + x[1].powi(2) + (x[2] + 2.0).powi(2)
        })
        .with_grad(|x: &Parameters| array![2.0 * (x[0] - 1.0), 2.0 * x[1], 2.0 * (x[2] + 2.0)]);
        let mut problem =
            Problem::new(objective, array![-5.0, -5.0, -5.0], array![5.0, 5.0, 5.0])
                .expect("valid problem");
        problem.fix_parameters(&[1], &[0.7]).expect("valid fix");
        problem
    }

    #[test]
    // Purpose
    // -------
    // L-BFGS must solve the free subproblem and report full-space
    // vectors with the fixed value carried through.
    //
    // Given
    // -----
    // - A 3-parameter quadratic with x1 fixed at 0.7, free minimum at
    //   (1, -2); start at the free-space origin.
    //
    // Expect
    // ------
    // - x = (1, 0.7, -2) within 1e-4, fval = 0.49, converged, and a
    //   full-space gradient with NaN exactly at the fixed index.
    fn lbfgs_solves_a_fixed_parameter_problem() {
        // Arrange
        let problem = fixed_quadratic();
        let optimizer = LbfgsOptimizer::default();

        // Act
        let result = optimizer
            .minimize(&problem, &array![0.0, 0.0], 0)
            .expect("minimize should succeed");

        // Assert
        assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(result.x[1], 0.7);
        assert_relative_eq!(result.x[2], -2.0, epsilon = 1e-4);
        assert_relative_eq!(result.fval, 0.49, epsilon = 1e-6);
        assert!(result.converged);
        assert_eq!(result.x0[1], 0.7);
        let grad = result.grad.as_ref().expect("analytic gradient recorded");
        assert!(grad[1].is_nan());
        assert!(grad[0].abs() < 1e-3);
        assert!(grad[2].abs() < 1e-3);
        assert!(result.n_fval() > 0);
        assert!(result.time >= 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Nelder–Mead must solve the same problem without gradients.
    //
    // Given
    // -----
    // - The fixed quadratic with the analytic gradient withheld.
    //
    // Expect
    // ------
    // - x within 1e-2 of (1, 0.7, -2) and no recorded gradient.
    fn nelder_mead_solves_without_gradients() {
        // Arrange
        let objective = FnObjective::new(3, |x: &Parameters| {
            (x[0] - 1.0).powi(2) + x[1].powi(2) + (x[2] + 2.0).powi(2)
        });
        let mut problem =
            Problem::new(objective, array![-5.0, -5.0, -5.0], array![5.0, 5.0, 5.0])
                .expect("valid problem");
        problem.fix_parameters(&[1], &[0.7]).expect("valid fix");
        let optimizer =
            NelderMeadOptimizer::default().with_max_iters(2000).with_sd_tolerance(1e-10);

        // Act
        let result = optimizer
            .minimize(&problem, &array![0.0, 0.0], 3)
            .expect("minimize should succeed");

        // Assert
        assert_eq!(result.id, 3);
        assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(result.x[1], 0.7);
        assert_relative_eq!(result.x[2], -2.0, epsilon = 1e-2);
        assert!(result.grad.is_none());
    }

    #[test]
    // Purpose
    // -------
    // When the unconstrained minimum lies outside the box, the solution
    // must sit inside the box, at most on its boundary.
    //
    // Given
    // -----
    // - Objective (x - 10)^2 with bounds [-1, 1].
    //
    // Expect
    // ------
    // - Solution within (0.99, 1.0], never beyond the upper bound.
    fn solutions_never_leave_the_box() {
        // Arrange
        let objective = FnObjective::new(1, |x: &Parameters| (x[0] - 10.0).powi(2))
            .with_grad(|x: &Parameters| array![2.0 * (x[0] - 10.0)]);
        let problem = Problem::new(objective, array![-1.0], array![1.0]).expect("valid problem");
        let optimizer = LbfgsOptimizer::default().with_max_iters(300);

        // Act
        let result =
            optimizer.minimize(&problem, &array![0.0], 0).expect("minimize should succeed");

        // Assert
        assert!(result.x[0] <= 1.0);
        assert!(result.x[0] > 0.99);
    }

    #[test]
    // Purpose
    // -------
    // A problem with every parameter fixed must short-circuit to one
    // evaluation instead of invoking a solver.
    //
    // Given
    // -----
    // - Both parameters fixed at (0.5, -0.5).
    //
    // Expect
    // ------
    // - fval = 0.5, converged with the all-fixed status, one counted
    //   cost evaluation.
    fn all_fixed_problems_short_circuit() {
        // Arrange
        let objective = FnObjective::new(2, |x: &Parameters| x.dot(x));
        let mut problem =
            Problem::new(objective, array![-1.0, -1.0], array![1.0, 1.0]).expect("valid problem");
        problem.fix_parameters(&[0, 1], &[0.5, -0.5]).expect("valid fix");

        // Act
        let result = LbfgsOptimizer::default()
            .minimize(&problem, &Parameters::zeros(0), 0)
            .expect("minimize should succeed");

        // Assert
        assert_relative_eq!(result.fval, 0.5);
        assert!(result.converged);
        assert_eq!(result.status, "All parameters fixed");
        assert_eq!(result.n_fval(), 1);
        assert_eq!(result.x, array![0.5, -0.5]);
    }

    #[test]
    // Purpose
    // -------
    // Option validation must reject out-of-range settings with the
    // matching error variant, before any solver work happens.
    //
    // Given
    // -----
    // - Zero memory, negative gradient tolerance, NaN sd tolerance, and
    //   a wrong-length start.
    //
    // Expect
    // ------
    // - InvalidLbfgsMem, InvalidTolGrad, InvalidOptions, and
    //   ParameterLengthMismatch respectively.
    fn invalid_options_and_starts_are_rejected() {
        // Arrange
        let objective = FnObjective::new(2, |x: &Parameters| x.dot(x));
        let problem =
            Problem::new(objective, array![-1.0, -1.0], array![1.0, 1.0]).expect("valid problem");
        let x0 = array![0.0, 0.0];

        // Act & Assert
        assert_eq!(
            LbfgsOptimizer::default().with_memory(0).minimize(&problem, &x0, 0),
            Err(FitError::InvalidLbfgsMem { mem: 0, reason: "must be positive" })
        );
        assert_eq!(
            LbfgsOptimizer::default().with_tol_grad(-1.0).minimize(&problem, &x0, 0),
            Err(FitError::InvalidTolGrad { tol: -1.0, reason: "must be finite and non-negative" })
        );
        assert!(matches!(
            NelderMeadOptimizer::default()
                .with_sd_tolerance(f64::NAN)
                .minimize(&problem, &x0, 0),
            Err(FitError::InvalidOptions { .. })
        ));
        assert_eq!(
            LbfgsOptimizer::default().minimize(&problem, &array![0.0], 0),
            Err(FitError::ParameterLengthMismatch { expected: 2, actual: 1 })
        );
    }
}
