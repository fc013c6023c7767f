//! The profile walk: step the profiled coordinate toward each bound,
//! reoptimize the remaining parameters at every step, and record the
//! likelihood ratio along the way.
//!
//! Each direction is walked separately from the optimum; the downhill
//! side is reversed and spliced onto the uphill side so the final path
//! is ascending in the profiled coordinate. Failed reoptimizations are
//! retried with a reduced step down to `min_step_size` before the
//! direction is abandoned with a warning.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::{
    errors::FitResult,
    optimize::Optimizer,
    problem::Problem,
    profile::options::{NextGuessMethod, ProfileOptions},
    result::ProfilerResult,
    types::{FnEvalMap, Gradient, Parameters},
};

/// Profile one parameter in both directions from the optimum.
///
/// `x_start`/`fval_start` are the full-space optimization result the
/// walk starts from; `global_opt` is the best value of the whole
/// multistart run, which the ratios refer to.
pub(crate) fn walk_along_profile<O: Optimizer>(
    problem: &Problem, optimizer: &O, index: usize, x_start: &Parameters, fval_start: f64,
    global_opt: f64, options: &ProfileOptions, method: NextGuessMethod,
) -> FitResult<ProfilerResult> {
    let clock = Instant::now();
    let gradnorm0 = gradnorm_excluding(problem, x_start, index);
    let mut path = walk_direction(
        problem, optimizer, index, x_start, fval_start, gradnorm0, global_opt, -1.0, options,
        method,
    )?;
    let up = walk_direction(
        problem, optimizer, index, x_start, fval_start, gradnorm0, global_opt, 1.0, options,
        method,
    )?;
    path.reverse();
    merge_counts(&mut path.fn_evals, &up.fn_evals);
    path.extend_skipping_first(up);
    path.time_total = clock.elapsed().as_secs_f64();
    Ok(path)
}

/// Whether a retried step advanced the path or the direction is done.
enum StepOutcome {
    Advanced { last_step: f64 },
    Abandoned,
}

#[allow(clippy::too_many_arguments)]
fn walk_direction<O: Optimizer>(
    problem: &Problem, optimizer: &O, index: usize, x_start: &Parameters, fval_start: f64,
    gradnorm0: f64, global_opt: f64, dir: f64, options: &ProfileOptions,
    method: NextGuessMethod,
) -> FitResult<ProfilerResult> {
    let bound = if dir < 0.0 { problem.lb()[index] } else { problem.ub()[index] };
    let mut path =
        ProfilerResult::single_point(x_start.clone(), fval_start, gradnorm0, global_opt);
    if !bound.is_finite() {
        warn!(
            "Parameter {} is unbounded in direction {:+}, stopping the profile at the optimum",
            index, dir
        );
        return Ok(path);
    }

    let mut step = options.default_step_size;
    loop {
        let v_cur = path.x_path.last().expect("walk path is never empty")[index];
        let ratio_cur = *path.ratio_path.last().expect("walk path is never empty");
        if v_cur == bound {
            break;
        }
        if !options.whole_path && ratio_cur < options.ratio_min {
            break;
        }
        step = match method {
            NextGuessMethod::FixedStep => options.default_step_size,
            _ => adapt_step(problem, &path, index, dir, bound, step, global_opt, options, method),
        };
        match advance_with_retries(
            problem, optimizer, &mut path, index, dir, bound, step, options, method,
        )? {
            StepOutcome::Advanced { last_step } => step = last_step,
            StepOutcome::Abandoned => break,
        }
    }
    Ok(path)
}

/// Fix the profiled coordinate one step further out and reoptimize the
/// rest, shrinking the step on failure until the retry budget runs out.
#[allow(clippy::too_many_arguments)]
fn advance_with_retries<O: Optimizer>(
    problem: &Problem, optimizer: &O, path: &mut ProfilerResult, index: usize, dir: f64,
    bound: f64, mut step: f64, options: &ProfileOptions, method: NextGuessMethod,
) -> FitResult<StepOutcome> {
    let v_cur = path.x_path.last().expect("walk path is never empty")[index];
    for attempt in 0..=options.max_step_reduce_attempts {
        let v_next = step_toward(v_cur, dir, step, bound);
        let x_prop = propose_point(problem, path, index, v_next, method, options);
        let mut sub = problem.clone();
        sub.fix_parameters(&[index], &[v_next])?;
        let x0_free = sub.reduced_vector(&x_prop)?;

        let clock = Instant::now();
        match optimizer.minimize(&sub, &x0_free, path.len()) {
            Ok(result) => {
                let gradnorm = finite_norm(result.grad.as_ref());
                merge_counts(&mut path.fn_evals, &result.fn_evals);
                path.push_back(result.x, result.fval, gradnorm, clock.elapsed().as_secs_f64());
                return Ok(StepOutcome::Advanced { last_step: step });
            }
            Err(err)
                if attempt < options.max_step_reduce_attempts
                    && step > options.min_step_size =>
            {
                debug!(
                    "Reoptimization at parameter {} = {} failed ({}), reducing the step",
                    index, v_next, err
                );
                step = (step / options.step_size_factor).max(options.min_step_size);
            }
            Err(err) => {
                warn!(
                    "Reoptimization at parameter {} = {} failed ({}), abandoning this direction",
                    index, v_next, err
                );
                return Ok(StepOutcome::Abandoned);
            }
        }
    }
    Ok(StepOutcome::Abandoned)
}

/// One bounded step of the profiled coordinate; lands exactly on the
/// bound when the step would cross it.
fn step_toward(v_cur: f64, dir: f64, step: f64, bound: f64) -> f64 {
    let v = v_cur + dir * step;
    if dir < 0.0 {
        v.max(bound)
    } else {
        v.min(bound)
    }
}

/// Tune the step so the proposed point changes the ratio by roughly
/// `delta_ratio_max`: shrink while the probe overshoots, grow while it
/// stays well under, never past the bound or the step limits.
///
/// Probes evaluate the raw objective at the extrapolated proposal; an
/// evaluation failure counts as an infinite change and shrinks the step.
#[allow(clippy::too_many_arguments)]
fn adapt_step(
    problem: &Problem, path: &ProfilerResult, index: usize, dir: f64, bound: f64,
    prev_step: f64, global_opt: f64, options: &ProfileOptions, method: NextGuessMethod,
) -> f64 {
    let v_cur = path.x_path.last().expect("walk path is never empty")[index];
    let ratio_cur = *path.ratio_path.last().expect("walk path is never empty");
    let change_at = |step: f64| -> f64 {
        let v = step_toward(v_cur, dir, step, bound);
        let x_prop = propose_point(problem, path, index, v, method, options);
        let fval = problem.objective().value(&x_prop).unwrap_or(f64::INFINITY);
        let change = ((global_opt - fval).exp() - ratio_cur).abs();
        if change.is_finite() {
            change
        } else {
            f64::INFINITY
        }
    };

    let mut step = prev_step.clamp(options.min_step_size, options.max_step_size);
    let mut change = change_at(step);
    if change > options.delta_ratio_max {
        while change > options.delta_ratio_max && step > options.min_step_size {
            step = (step / options.step_size_factor).max(options.min_step_size);
            change = change_at(step);
        }
    } else {
        while change < options.delta_ratio_max / options.step_size_factor
            && step < options.max_step_size
            && step_toward(v_cur, dir, step, bound) != bound
        {
            let grown = (step * options.step_size_factor).min(options.max_step_size);
            let grown_change = change_at(grown);
            if grown_change > options.delta_ratio_max {
                break;
            }
            step = grown;
            change = grown_change;
        }
    }
    step
}

/// Full-space start proposal for the next reoptimization.
///
/// The profiled coordinate is set exactly to `v_next`; the remaining
/// coordinates come from the chosen extrapolation and are clamped into
/// the box. Extrapolations that cannot be formed (too few points,
/// coincident coordinates, a degenerate regression) fall back to
/// holding the previous optimum.
fn propose_point(
    problem: &Problem, path: &ProfilerResult, index: usize, v_next: f64,
    method: NextGuessMethod, options: &ProfileOptions,
) -> Parameters {
    let last = path.x_path.last().expect("walk path is never empty");
    let mut x = match method {
        NextGuessMethod::FixedStep | NextGuessMethod::AdaptiveStepOrder0 => last.clone(),
        NextGuessMethod::AdaptiveStepOrder1 => {
            extrapolate_linear(path, index, v_next).unwrap_or_else(|| last.clone())
        }
        NextGuessMethod::AdaptiveStepRegression => {
            extrapolate_regression(path, index, v_next, options)
                .unwrap_or_else(|| last.clone())
        }
    };
    for j in 0..x.len() {
        x[j] = x[j].clamp(problem.lb()[j], problem.ub()[j]);
    }
    x[index] = v_next;
    x
}

/// Linear extrapolation from the last two path points, parameterized by
/// the profiled coordinate.
fn extrapolate_linear(path: &ProfilerResult, index: usize, v_next: f64) -> Option<Parameters> {
    let n = path.x_path.len();
    if n < 2 {
        return None;
    }
    let x0 = &path.x_path[n - 2];
    let x1 = &path.x_path[n - 1];
    let dv = x1[index] - x0[index];
    if dv.abs() < f64::EPSILON {
        return None;
    }
    let t = (v_next - x1[index]) / dv;
    Some(x1 + &((x1 - x0) * t))
}

/// Least-squares polynomial extrapolation over the recent path.
///
/// Fits every parameter as a polynomial of the profiled coordinate,
/// degree `min(reg_order, points - 1)`, over the last `reg_points`
/// points, and evaluates the fits at `v_next`. Coordinates are centered
/// and scaled before the Vandermonde solve.
fn extrapolate_regression(
    path: &ProfilerResult, index: usize, v_next: f64, options: &ProfileOptions,
) -> Option<Parameters> {
    let n = path.x_path.len();
    let m = n.min(options.reg_points);
    if m < 2 {
        return None;
    }
    let points = &path.x_path[n - m..];
    let degree = options.reg_order.min(m - 1);
    let dim = points[0].len();

    let center = points[m - 1][index];
    let scale = points
        .iter()
        .map(|x| (x[index] - center).abs())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);

    let vandermonde = DMatrix::from_fn(m, degree + 1, |r, c| {
        ((points[r][index] - center) / scale).powi(c as i32)
    });
    let targets = DMatrix::from_fn(m, dim, |r, c| points[r][c]);
    let coeffs = vandermonde.svd(true, true).solve(&targets, f64::EPSILON).ok()?;

    let t_next = (v_next - center) / scale;
    let basis = DVector::from_fn(degree + 1, |c, _| t_next.powi(c as i32));
    let predicted = coeffs.transpose() * basis;
    Some(Parameters::from_iter(predicted.iter().copied()))
}

/// Norm of the objective gradient over the free coordinates other than
/// the profiled one; `NaN` when no gradient is available.
fn gradnorm_excluding(problem: &Problem, x_full: &Parameters, index: usize) -> f64 {
    if !problem.objective().provides_grad() {
        return f64::NAN;
    }
    let grad = match problem.objective().grad(x_full) {
        Ok(grad) => grad,
        Err(_) => return f64::NAN,
    };
    problem
        .x_free_indices()
        .iter()
        .filter(|&&j| j != index)
        .map(|&j| grad[j] * grad[j])
        .sum::<f64>()
        .sqrt()
}

/// Norm over the finite entries of an optional full-space gradient
/// (fixed coordinates carry `NaN`); `NaN` when absent.
fn finite_norm(grad: Option<&Gradient>) -> f64 {
    match grad {
        Some(grad) => {
            grad.iter().filter(|v| v.is_finite()).map(|v| v * v).sum::<f64>().sqrt()
        }
        None => f64::NAN,
    }
}

/// Add `src`'s solver counters into `dst`.
fn merge_counts(dst: &mut FnEvalMap, src: &FnEvalMap) {
    for (key, count) in src {
        *dst.entry(key.clone()).or_insert(0) += count;
    }
}
