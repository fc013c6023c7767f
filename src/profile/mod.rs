//! profile — profile-likelihood computation.
//!
//! Purpose
//! -------
//! Compute per-parameter likelihood profiles by repeated constrained
//! reoptimization: fix one parameter at a sequence of values walking
//! from the optimum toward each bound, reoptimize the rest at every
//! value, and record the likelihood ratio `exp(f_opt - f)` along the
//! path. A Hessian-based Gaussian approximation and confidence-interval
//! helpers round out the module.
//!
//! Key behaviors
//! -------------
//! - One walk per profiled parameter, dispatched as independent engine
//!   tasks; results slot into [`ProfileResult`](crate::result::ProfileResult)
//!   lists by parameter index.
//! - Walks stop at the parameter's bound, or once the ratio falls under
//!   `ratio_min` (unless `whole_path`).
//! - Step lengths are fixed or adaptive; adaptive proposals extrapolate
//!   the remaining parameters by order 0/1 or polynomial regression.
//! - Ratios always refer to the global optimum of the multistart run,
//!   whichever start a profile was seeded from.
//!
//! Invariants & assumptions
//! ------------------------
//! - The profiled coordinate is strictly monotone along a path and the
//!   ratio path peaks at the seeding optimum.
//! - Profiling never mutates the caller's problem; each step works on a
//!   clone with one extra fixed parameter.
//!
//! Downstream usage
//! ----------------
//! - `approximate_ci` + `chi2_quantile_to_ratio` turn a stored path
//!   into a confidence interval.
//!
//! Testing notes
//! -------------
//! - Walk mechanics are pinned against closed-form Gaussian ratios in
//!   the walk module; orchestration (index defaulting, fixed-parameter
//!   skipping, list slotting) is tested here.
mod approximate;
mod options;
mod walk;

pub use approximate::{approximate_ci, approximate_parameter_profile, chi2_quantile_to_ratio};
pub use options::{NextGuessMethod, ProfileOptions};

use tracing::{info, warn};

use crate::{
    engine::{Engine, ProgressReporter, Task},
    errors::{FitError, FitResult},
    optimize::Optimizer,
    problem::Problem,
    profile::walk::walk_along_profile,
    result::{EstimationResult, ProfileResult, ProfilerResult},
    types::Parameters,
};

/// One parameter's profile walk, queued for an engine.
struct ProfilerTask<'a, O: Optimizer> {
    problem: &'a Problem,
    optimizer: &'a O,
    index: usize,
    x_start: Parameters,
    fval_start: f64,
    global_opt: f64,
    options: &'a ProfileOptions,
    method: NextGuessMethod,
}

impl<O: Optimizer> Task for ProfilerTask<'_, O> {
    type Output = (usize, FitResult<ProfilerResult>);

    fn run(self) -> Self::Output {
        let path = walk_along_profile(
            self.problem,
            self.optimizer,
            self.index,
            &self.x_start,
            self.fval_start,
            self.global_opt,
            self.options,
            self.method,
        );
        (self.index, path)
    }
}

/// Profile the given parameters and store the paths in `result`.
///
/// - `indices` defaults to all free parameters; fixed indices are
///   skipped with a warning.
/// - The walks are seeded from optimization entry `result_index`
///   (0 = best start); ratios refer to the best entry regardless.
/// - `profile_list = Some(k)` fills into the existing list `k`,
///   `None` appends a new list. The filled list index is returned.
///
/// # Errors
/// - [`FitError::EmptyOptimizeResult`] without a prior optimization, or
///   [`FitError::InvalidOptions`] for an out-of-range `result_index`.
/// - Option validation errors and per-walk failures.
#[allow(clippy::too_many_arguments)]
pub fn parameter_profile<O: Optimizer>(
    problem: &Problem, result: &mut EstimationResult, optimizer: &O, indices: Option<&[usize]>,
    options: &ProfileOptions, method: NextGuessMethod, engine: &Engine,
    profile_list: Option<usize>, result_index: usize,
) -> FitResult<usize> {
    options.validate()?;
    let optimize = result.optimize.as_ref().ok_or(FitError::EmptyOptimizeResult)?;
    if optimize.is_empty() {
        return Err(FitError::EmptyOptimizeResult);
    }
    let seed = optimize.list().get(result_index).ok_or_else(|| FitError::InvalidOptions {
        reason: format!(
            "result_index {} outside the {} optimization results",
            result_index,
            optimize.len()
        ),
    })?;
    let x_start = seed.x.clone();
    let fval_start = seed.fval;
    let global_opt = optimize.best().expect("non-empty optimize result").fval;

    let requested: Vec<usize> = match indices {
        Some(indices) => indices.to_vec(),
        None => problem.x_free_indices(),
    };
    let mut profiled = Vec::with_capacity(requested.len());
    for index in requested {
        if index >= problem.dim_full() {
            return Err(FitError::IndexOutOfRange { index, dim: problem.dim_full() });
        }
        if problem.x_fixed_indices().contains(&index) {
            warn!("Parameter {} is fixed, skipping its profile", index);
            continue;
        }
        profiled.push(index);
    }

    info!("Profiling {} parameters with {}", profiled.len(), optimizer.name());
    let tasks: Vec<ProfilerTask<'_, O>> = profiled
        .into_iter()
        .map(|index| ProfilerTask {
            problem,
            optimizer,
            index,
            x_start: x_start.clone(),
            fval_start,
            global_opt,
            options,
            method,
        })
        .collect();
    let outputs = engine.execute(tasks, &ProgressReporter::silent());

    let profiles = result.profile.get_or_insert_with(ProfileResult::new);
    let list_index = match profile_list {
        Some(k) => {
            // Validate the list before storing anything into it.
            profiles.profiles(k)?;
            k
        }
        None => profiles.push_list(problem.dim_full()),
    };
    for (index, path) in outputs {
        profiles.set(list_index, index, path?)?;
    }
    Ok(list_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        objective::FnObjective,
        optimize::{minimize, LbfgsOptimizer, OptimizeOptions},
        startpoint::UniformStartpoints,
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Orchestration: default indices, fixed-parameter skipping, list
    //   slotting, and the empty-result precondition.
    //
    // They intentionally DO NOT cover:
    // - Walk mechanics (walk module tests) and Gaussian approximations
    //   (approximate module tests).
    // -------------------------------------------------------------------------

    fn fitted_gaussian() -> (Problem, EstimationResult) {
        let objective = FnObjective::new(3, |x: &Parameters| {
            0.5 * ((x[0] - 1.0).powi(2) / 0.25 + (x[1] + 0.5).powi(2) + x[2].powi(2))
        })
        .with_grad(|x: &Parameters| {
            array![(x[0] - 1.0) / 0.25, x[1] + 0.5, x[2]]
        });
        let mut problem = Problem::new(
            objective,
            array![-4.0, -4.0, -4.0],
            array![4.0, 4.0, 4.0],
        )
        .expect("valid problem");
        problem.fix_parameters(&[2], &[0.25]).expect("valid fix");
        let optimize = minimize(
            &problem,
            &LbfgsOptimizer::default(),
            3,
            &UniformStartpoints,
            &Engine::SingleCore,
            &OptimizeOptions::new().with_seed(21),
        )
        .expect("optimization should succeed");
        let result = EstimationResult::new(&problem).with_optimize(optimize);
        (problem, result)
    }

    #[test]
    // Purpose
    // -------
    // Profiling with default indices must fill one slot per free
    // parameter and leave the fixed slot empty.
    //
    // Given
    // -----
    // - A fitted 3-parameter Gaussian with x2 fixed.
    //
    // Expect
    // ------
    // - Slots 0 and 1 filled with ratio peaks of 1; slot 2 empty; every
    //   path strictly monotone in its own coordinate.
    fn default_indices_profile_all_free_parameters() {
        // Arrange
        let (problem, mut result) = fitted_gaussian();

        // Act
        let list_index = parameter_profile(
            &problem,
            &mut result,
            &LbfgsOptimizer::default(),
            None,
            &ProfileOptions::default(),
            NextGuessMethod::AdaptiveStepOrder0,
            &Engine::SingleCore,
            None,
            0,
        )
        .expect("profiling should succeed");

        // Assert
        let profiles = result.profile.expect("profile section filled");
        assert_eq!(list_index, 0);
        assert!(profiles.get(0, 2).expect("valid lookup").is_none());
        for index in [0, 1] {
            let path = profiles
                .get(0, index)
                .expect("valid lookup")
                .expect("free parameter profiled");
            let peak = path.ratio_path.iter().fold(f64::MIN, |acc, &v| acc.max(v));
            assert_relative_eq!(peak, 1.0, epsilon = 1e-8);
            let coords = path.x_profiled(index);
            for pair in coords.windows(2) {
                assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Explicitly requesting a fixed parameter must skip it (not error),
    // and profiling into an unknown list must fail up front.
    //
    // Given
    // -----
    // - Requests for indices [1, 2] (2 is fixed); profile_list Some(3).
    //
    // Expect
    // ------
    // - First call fills only slot 1; second call errors with
    //   ProfileListMissing before any walk result is stored.
    fn fixed_indices_skip_and_unknown_lists_fail() {
        // Arrange
        let (problem, mut result) = fitted_gaussian();
        let optimizer = LbfgsOptimizer::default();

        // Act
        let list_index = parameter_profile(
            &problem,
            &mut result,
            &optimizer,
            Some(&[1, 2]),
            &ProfileOptions::default(),
            NextGuessMethod::AdaptiveStepOrder0,
            &Engine::SingleCore,
            None,
            0,
        )
        .expect("profiling should succeed");
        let missing_list = parameter_profile(
            &problem,
            &mut result,
            &optimizer,
            Some(&[0]),
            &ProfileOptions::default(),
            NextGuessMethod::AdaptiveStepOrder0,
            &Engine::SingleCore,
            Some(3),
            0,
        );

        // Assert
        let profiles = result.profile.expect("profile section filled");
        assert!(profiles.get(list_index, 1).expect("valid lookup").is_some());
        assert!(profiles.get(list_index, 2).expect("valid lookup").is_none());
        assert_eq!(
            missing_list,
            Err(FitError::ProfileListMissing { list_index: 3, n_lists: 1 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Profiling without an optimization section must fail with the
    // empty-result precondition.
    //
    // Given
    // -----
    // - A fresh EstimationResult with no optimize section.
    //
    // Expect
    // ------
    // - EmptyOptimizeResult.
    fn profiling_requires_an_optimization() {
        // Arrange
        let (problem, _) = fitted_gaussian();
        let mut empty = EstimationResult::new(&problem);

        // Act
        let err = parameter_profile(
            &problem,
            &mut empty,
            &LbfgsOptimizer::default(),
            None,
            &ProfileOptions::default(),
            NextGuessMethod::FixedStep,
            &Engine::SingleCore,
            None,
            0,
        );

        // Assert
        assert_eq!(err, Err(FitError::EmptyOptimizeResult));
    }
}
