//! Execution helpers that run an `argmin` solver on an adapted problem
//! and harvest the solver state into a [`SolverReport`].
//!
//! Two runners exist because argmin's iteration state is typed by the
//! quantities a solver maintains: the quasi-Newton path carries a
//! gradient, the simplex path does not. Both wire the executor the same
//! way (initial state, optional iteration cap, optional observer) and
//! read back the same fields.
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient as ArgminGradient};
use argmin::core::{Executor, State, TerminationReason, TerminationStatus};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;

use crate::{
    errors::{FitError, FitResult},
    optimize::adapter::ObjectiveAdapter,
    types::{FnEvalMap, Gradient, Parameters},
};

/// Internal-space outcome of one solver run.
#[derive(Debug, Clone)]
pub(crate) struct SolverReport {
    pub z_best: Parameters,
    pub cost_best: f64,
    pub iterations: u64,
    pub fn_evals: FnEvalMap,
    pub converged: bool,
    pub status: String,
}

/// Convergence flag and display text for a termination status.
fn describe(termination: &TerminationStatus) -> (bool, String) {
    match termination {
        TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
        TerminationStatus::Terminated(reason) => {
            let converged = matches!(
                reason,
                TerminationReason::SolverConverged | TerminationReason::TargetCostReached
            );
            (converged, reason.to_string())
        }
    }
}

/// Run a gradient-based solver (L-BFGS) from internal start `z0`.
///
/// With the `obs_slog` feature and `verbose`, a terminal observer is
/// attached and the initial cost (plus gradient norm, when available)
/// is printed before the first iteration.
///
/// # Errors
/// - Propagates argmin runtime errors (line-search failures, objective
///   failures) through the crate's `From<argmin::core::Error>`.
/// - [`FitError::MissingSolution`] when the solver kept no best point.
pub(crate) fn run_gradient_solver<'a, S>(
    z0: Parameters, max_iters: Option<u64>, verbose: bool, problem: ObjectiveAdapter<'a>,
    solver: S,
) -> FitResult<SolverReport>
where
    S: argmin::core::Solver<
            ObjectiveAdapter<'a>,
            argmin::core::IterState<Parameters, Gradient, (), (), (), f64>,
        > + Send
        + 'static,
{
    #[cfg(feature = "obs_slog")]
    if verbose {
        log_initial_cost(&z0, &problem)?;
    }
    #[cfg(not(feature = "obs_slog"))]
    let _ = verbose;
    let mut executor = Executor::new(problem, solver);
    executor = executor.configure(|state| state.param(z0));
    #[cfg(feature = "obs_slog")]
    if verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        executor = executor.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = max_iters {
        executor = executor.configure(|state| state.max_iters(max_iter));
    }

    let mut state = executor.run()?.state().clone();
    let iterations = state.get_iter();
    let fn_evals = state.get_func_counts().clone();
    let (converged, status) = describe(state.get_termination_status());
    let cost_best = state.get_best_cost();
    let z_best = state.take_best_param().ok_or(FitError::MissingSolution)?;
    Ok(SolverReport { z_best, cost_best, iterations, fn_evals, converged, status })
}

/// Run a simplex solver (Nelder–Mead); the start point lives in the
/// solver's initial simplex, so no parameter is set on the state.
///
/// # Errors
/// Same as [`run_gradient_solver`].
pub(crate) fn run_simplex_solver<'a, S>(
    max_iters: Option<u64>, problem: ObjectiveAdapter<'a>, solver: S,
) -> FitResult<SolverReport>
where
    S: argmin::core::Solver<
            ObjectiveAdapter<'a>,
            argmin::core::IterState<Parameters, (), (), (), (), f64>,
        > + Send
        + 'static,
{
    let mut executor = Executor::new(problem, solver);
    if let Some(max_iter) = max_iters {
        executor = executor.configure(|state| state.max_iters(max_iter));
    }

    let mut state = executor.run()?.state().clone();
    let iterations = state.get_iter();
    let fn_evals = state.get_func_counts().clone();
    let (converged, status) = describe(state.get_termination_status());
    let cost_best = state.get_best_cost();
    let z_best = state.take_best_param().ok_or(FitError::MissingSolution)?;
    Ok(SolverReport { z_best, cost_best, iterations, fn_evals, converged, status })
}

#[cfg(feature = "obs_slog")]
fn log_initial_cost(z0: &Parameters, problem: &ObjectiveAdapter<'_>) -> FitResult<()> {
    let c0 = problem.cost(z0)?;
    let g0n = problem.gradient(z0).ok().map(|g| g.l2_norm());

    eprintln!(
        "init: cost(z0) = {:.6}{}",
        c0,
        g0n.map(|n| format!(", ||grad|| = {:.6}", n)).unwrap_or_default()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        objective::FnObjective,
        optimize::{
            builders::{build_lbfgs_more_thuente, build_nelder_mead},
            solvers::{LbfgsOptimizer, NelderMeadOptimizer},
            transforms::BoundTransform,
        },
        problem::Problem,
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - A full L-BFGS and Nelder–Mead run on a transformed quadratic.
    // - Iteration-cap termination reporting.
    //
    // They intentionally DO NOT cover:
    // - Result assembly into OptimizerResult (solvers tests).
    // -------------------------------------------------------------------------

    fn quadratic_problem() -> Problem {
        let objective =
            FnObjective::new(2, |x: &Parameters| (x[0] - 1.0).powi(2) + (x[1] + 0.5).powi(2))
                .with_grad(|x: &Parameters| array![2.0 * (x[0] - 1.0), 2.0 * (x[1] + 0.5)]);
        Problem::new(objective, array![-5.0, -5.0], array![5.0, 5.0]).expect("valid problem")
    }

    #[test]
    // Purpose
    // -------
    // L-BFGS must reach the quadratic's minimum through the transform.
    //
    // Given
    // -----
    // - Minimum at (1, -0.5) inside [-5, 5]^2; start at the box center.
    //
    // Expect
    // ------
    // - Best bounded point within 1e-4 of the minimum; near-zero cost;
    //   the solver's own evaluation counts are recorded.
    fn lbfgs_reaches_the_minimum() {
        // Arrange
        let problem = quadratic_problem();
        let transform = BoundTransform::new(&problem.lb_free(), &problem.ub_free());
        let adapter = ObjectiveAdapter::new(&problem, &transform);
        let z0 = transform.to_internal(&array![0.0, 0.0]);
        let solver =
            build_lbfgs_more_thuente(&LbfgsOptimizer::default()).expect("valid solver config");

        // Act
        let report = run_gradient_solver(z0, Some(200), false, adapter, solver)
            .expect("solver run should succeed");

        // Assert
        let x_best = transform.to_bounded(&report.z_best);
        assert_relative_eq!(x_best[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(x_best[1], -0.5, epsilon = 1e-4);
        assert!(report.cost_best < 1e-8);
        assert!(report.fn_evals.values().sum::<u64>() > 0);
    }

    #[test]
    // Purpose
    // -------
    // Nelder–Mead must approach the same minimum without gradients, and
    // a tiny iteration cap must be reported as such.
    //
    // Given
    // -----
    // - The same quadratic; a full run and a 2-iteration run.
    //
    // Expect
    // ------
    // - Full run lands within 1e-2; capped run reports not converged
    //   with the max-iterations status text.
    fn nelder_mead_runs_and_reports_iteration_cap() {
        // Arrange
        let problem = quadratic_problem();
        let transform = BoundTransform::new(&problem.lb_free(), &problem.ub_free());
        let z0 = transform.to_internal(&array![0.0, 0.0]);
        let opts = NelderMeadOptimizer::default();

        // Act
        let full = run_simplex_solver(
            Some(500),
            ObjectiveAdapter::new(&problem, &transform),
            build_nelder_mead(&opts, &z0).expect("valid simplex"),
        )
        .expect("full run should succeed");
        let capped = run_simplex_solver(
            Some(2),
            ObjectiveAdapter::new(&problem, &transform),
            build_nelder_mead(&opts, &z0).expect("valid simplex"),
        )
        .expect("capped run should succeed");

        // Assert
        let x_best = transform.to_bounded(&full.z_best);
        assert_relative_eq!(x_best[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(x_best[1], -0.5, epsilon = 1e-2);
        assert!(!capped.converged);
        assert_eq!(capped.iterations, 2);
    }
}
