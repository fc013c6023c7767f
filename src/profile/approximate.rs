//! Hessian-based approximate profiles and confidence-interval helpers.
//!
//! The approximate profile replaces the reoptimization walk with a
//! Gaussian approximation at the optimum: per-parameter variances come
//! from the pseudoinverse of the Hessian (eigenvalue truncation guards
//! against rank deficiency), and the ratio curve is the corresponding
//! normal density, normalized to peak at 1 on the evaluation grid.

use nalgebra::{DMatrix, SymmetricEigen};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::warn;

use crate::{
    errors::{FitError, FitResult},
    problem::Problem,
    result::{EstimationResult, ProfileResult, ProfilerResult},
    types::{FnEvalMap, HessianMatrix, Parameters},
};

/// Eigenvalues below this fraction of the largest are truncated in the
/// pseudoinverse.
const EIGEN_TRUNCATION: f64 = 1e-12;

/// Fill approximate profiles for `indices` (default: all free
/// parameters) into a new profile list of `result`.
///
/// The Hessian comes from the best optimization entry when it recorded
/// one, otherwise from the objective at the optimum. Returns the index
/// of the filled profile list.
///
/// # Errors
/// - [`FitError::EmptyOptimizeResult`] without a prior optimization.
/// - [`FitError::SensitivityUnavailable`] when no Hessian source exists.
/// - [`FitError::DegenerateVariance`] for a parameter whose pseudo-
///   inverse variance is non-positive or non-finite.
/// - [`FitError::InvalidOptions`] for `n_steps < 2`.
pub fn approximate_parameter_profile(
    problem: &Problem, result: &mut EstimationResult, indices: Option<&[usize]>, n_steps: usize,
) -> FitResult<usize> {
    if n_steps < 2 {
        return Err(FitError::InvalidOptions {
            reason: format!("approximate profiles need at least 2 grid points, got {n_steps}"),
        });
    }
    let best = result
        .optimize
        .as_ref()
        .and_then(|optimize| optimize.best())
        .ok_or(FitError::EmptyOptimizeResult)?;
    let x_opt = best.x.clone();
    let fval_opt = best.fval;
    let hess = match &best.hess {
        Some(hess) => hess.clone(),
        None => problem.objective().hess(&x_opt)?,
    };
    let variances = pseudoinverse_diagonal(&hess)?;

    let indices: Vec<usize> = match indices {
        Some(indices) => indices.to_vec(),
        None => problem.x_free_indices(),
    };
    let profiles = result.profile.get_or_insert_with(ProfileResult::new);
    let list_index = profiles.push_list(problem.dim_full());
    for &index in &indices {
        if index >= problem.dim_full() {
            return Err(FitError::IndexOutOfRange { index, dim: problem.dim_full() });
        }
        if problem.x_fixed_indices().contains(&index) {
            warn!("Parameter {} is fixed, skipping its approximate profile", index);
            continue;
        }
        let variance = variances[index];
        if !variance.is_finite() || variance <= 0.0 {
            return Err(FitError::DegenerateVariance { index, value: variance });
        }
        let path = gaussian_path(problem, &x_opt, fval_opt, index, variance, n_steps);
        profiles.set(list_index, index, path)?;
    }
    Ok(list_index)
}

/// Diagonal of the eigenvalue-truncated pseudoinverse of a symmetric
/// Hessian.
///
/// # Errors
/// - [`FitError::HessianDimMismatch`] for a non-square input.
fn pseudoinverse_diagonal(hess: &HessianMatrix) -> FitResult<Vec<f64>> {
    let n = hess.nrows();
    if hess.ncols() != n {
        return Err(FitError::HessianDimMismatch {
            expected: n,
            found: (hess.nrows(), hess.ncols()),
        });
    }
    // Symmetrize before the eigendecomposition; objective Hessians can
    // carry asymmetric floating-point noise.
    let sym = DMatrix::from_fn(n, n, |r, c| 0.5 * (hess[[r, c]] + hess[[c, r]]));
    let eigen = SymmetricEigen::new(sym);
    let max_eig = eigen.eigenvalues.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
    let cutoff = max_eig * EIGEN_TRUNCATION;

    let mut diagonal = vec![0.0; n];
    for (i, entry) in diagonal.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (k, &eigval) in eigen.eigenvalues.iter().enumerate() {
            if eigval.abs() > cutoff {
                let v = eigen.eigenvectors[(i, k)];
                sum += v * v / eigval;
            }
        }
        *entry = sum;
    }
    Ok(diagonal)
}

/// Build the Gaussian ratio curve for one parameter over its bounds.
fn gaussian_path(
    problem: &Problem, x_opt: &Parameters, fval_opt: f64, index: usize, variance: f64,
    n_steps: usize,
) -> ProfilerResult {
    let lb = problem.lb()[index];
    let ub = problem.ub()[index];
    let spacing = (ub - lb) / (n_steps - 1) as f64;

    let mut x_path = Vec::with_capacity(n_steps);
    let mut raw_ratios = Vec::with_capacity(n_steps);
    for k in 0..n_steps {
        let xi = if k == n_steps - 1 { ub } else { lb + k as f64 * spacing };
        let mut x = x_opt.clone();
        x[index] = xi;
        x_path.push(x);
        let centered = xi - x_opt[index];
        raw_ratios.push((-centered * centered / (2.0 * variance)).exp());
    }
    let peak = raw_ratios.iter().fold(f64::MIN, |acc, &v| acc.max(v));
    let ratio_path: Vec<f64> = raw_ratios.iter().map(|r| r / peak).collect();
    let fval_path: Vec<f64> = ratio_path.iter().map(|r| fval_opt - r.ln()).collect();

    ProfilerResult {
        x_path,
        fval_path,
        ratio_path,
        gradnorm_path: vec![f64::NAN; n_steps],
        time_path: vec![0.0; n_steps],
        global_opt: fval_opt,
        fn_evals: FnEvalMap::new(),
        time_total: 0.0,
    }
}

/// Likelihood-ratio threshold for a `chi^2_df` confidence level:
/// `exp(-quantile(alpha) / 2)`.
///
/// `alpha = 0.95, df = 1` gives the familiar 0.1465.
///
/// # Errors
/// - [`FitError::InvalidOptions`] for `alpha` outside `(0, 1)` or a
///   non-positive `df`.
pub fn chi2_quantile_to_ratio(alpha: f64, df: f64) -> FitResult<f64> {
    if !(0.0..1.0).contains(&alpha) || alpha == 0.0 {
        return Err(FitError::InvalidOptions {
            reason: format!("confidence level must lie in (0, 1), got {alpha}"),
        });
    }
    let chi2 = ChiSquared::new(df).map_err(|err| FitError::InvalidOptions {
        reason: format!("invalid chi-squared degrees of freedom {df}: {err}"),
    })?;
    Ok((-chi2.inverse_cdf(alpha) / 2.0).exp())
}

/// Confidence interval from a ratio curve by linear interpolation from
/// both ends.
///
/// Grid points exactly at the threshold are taken as-is; when a side
/// never crosses the threshold the grid boundary is returned for that
/// side (the interval is then truncated by the bounds).
///
/// # Errors
/// - [`FitError::InvalidOptions`] for mismatched or empty inputs.
/// - [`FitError::RatioThresholdNotReached`] when no point lies at or
///   above the threshold.
pub fn approximate_ci(xs: &[f64], ratios: &[f64], threshold: f64) -> FitResult<(f64, f64)> {
    if xs.is_empty() || xs.len() != ratios.len() {
        return Err(FitError::InvalidOptions {
            reason: format!(
                "confidence interval needs matching non-empty grids, got {} xs and {} ratios",
                xs.len(),
                ratios.len()
            ),
        });
    }
    if !ratios.iter().any(|&r| r >= threshold) {
        return Err(FitError::RatioThresholdNotReached { threshold });
    }

    let first_above = ratios
        .iter()
        .position(|&r| r >= threshold)
        .expect("checked that a point reaches the threshold");
    let last_above = ratios
        .iter()
        .rposition(|&r| r >= threshold)
        .expect("checked that a point reaches the threshold");

    let lower = if first_above == 0 || ratios[first_above] == threshold {
        xs[first_above]
    } else {
        interpolate(
            xs[first_above - 1],
            ratios[first_above - 1],
            xs[first_above],
            ratios[first_above],
            threshold,
        )
    };
    let upper = if last_above == xs.len() - 1 || ratios[last_above] == threshold {
        xs[last_above]
    } else {
        interpolate(
            xs[last_above],
            ratios[last_above],
            xs[last_above + 1],
            ratios[last_above + 1],
            threshold,
        )
    };
    Ok((lower, upper))
}

/// X where the segment `(x0, r0) -> (x1, r1)` crosses `threshold`.
fn interpolate(x0: f64, r0: f64, x1: f64, r1: f64, threshold: f64) -> f64 {
    x0 + (threshold - r0) * (x1 - x0) / (r1 - r0)
}
