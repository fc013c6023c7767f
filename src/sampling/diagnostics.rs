//! Chain convergence diagnostics: Geweke burn-in detection and
//! autocorrelation-based effective sample size.

use tracing::{info, warn};

use crate::{
    errors::{FitError, FitResult},
    result::EstimationResult,
    types::Parameters,
};

/// Fractions of the chain tried as burn-in cut points.
const N_CUT_CANDIDATES: usize = 20;
/// Per-dimension z-score below which two windows count as matching.
const Z_THRESHOLD: f64 = 2.0;

// -------------------------------------------------------------------------
// Burn-in
// -------------------------------------------------------------------------

/// Geweke-style burn-in estimate for one chain.
///
/// Tries 20 evenly spaced cut points; at each cut the mean of the first
/// 10% of the remaining trace is compared against the mean of its last
/// 50%, per dimension, via a two-sample z-score. The first cut where
/// every dimension scores below 2 is the burn-in. When no cut passes
/// the whole chain is declared burn-in.
pub fn geweke_burn_in(trace: &[Parameters]) -> usize {
    let n = trace.len();
    if n < N_CUT_CANDIDATES {
        return 0;
    }
    for candidate in 0..N_CUT_CANDIDATES {
        let cut = candidate * n / N_CUT_CANDIDATES;
        let tail = &trace[cut..];
        let head_len = (tail.len() / 10).max(2);
        let back_len = tail.len() / 2;
        if head_len + back_len > tail.len() {
            break;
        }
        let head = &tail[..head_len];
        let back = &tail[tail.len() - back_len..];
        if max_zscore(head, back) < Z_THRESHOLD {
            return cut;
        }
    }
    warn!("No cut point passed the Geweke test, treating the whole chain as burn-in");
    n
}

/// Largest per-dimension two-sample z-score between two windows.
fn max_zscore(a: &[Parameters], b: &[Parameters]) -> f64 {
    let dim = a[0].len();
    let mut worst = 0.0_f64;
    for d in 0..dim {
        let (mean_a, var_a) = moments(a, d);
        let (mean_b, var_b) = moments(b, d);
        let denom = (var_a / a.len() as f64 + var_b / b.len() as f64).sqrt();
        let z = if denom > 0.0 {
            ((mean_a - mean_b) / denom).abs()
        } else if mean_a == mean_b {
            0.0
        } else {
            f64::INFINITY
        };
        worst = worst.max(z);
    }
    worst
}

fn moments(window: &[Parameters], d: usize) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().map(|x| x[d]).sum::<f64>() / n;
    let var = window.iter().map(|x| (x[d] - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

// -------------------------------------------------------------------------
// Effective sample size
// -------------------------------------------------------------------------

/// Effective sample size of a (post burn-in) trace.
///
/// Per dimension the integrated autocorrelation time is estimated with
/// Geyer's initial positive sequence: autocorrelations are summed while
/// the sums of adjacent lag pairs stay positive. The reported size is
/// the smallest across dimensions, so it is honest about the slowest
/// mixing coordinate.
pub fn effective_sample_size(trace: &[Parameters]) -> f64 {
    let n = trace.len();
    if n < 2 {
        return n as f64;
    }
    let dim = trace[0].len();
    let mut smallest = f64::INFINITY;
    for d in 0..dim {
        let (mean, var) = moments(trace, d);
        if var <= 0.0 {
            // A frozen coordinate carries no information either way.
            continue;
        }
        let mut tau = 1.0;
        let mut lag = 1;
        while lag + 1 < n {
            let pair = autocorrelation(trace, d, mean, var, lag)
                + autocorrelation(trace, d, mean, var, lag + 1);
            if pair <= 0.0 {
                break;
            }
            tau += 2.0 * pair;
            lag += 2;
        }
        smallest = smallest.min((n as f64 / tau).min(n as f64));
    }
    if smallest.is_finite() {
        smallest
    } else {
        n as f64
    }
}

fn autocorrelation(trace: &[Parameters], d: usize, mean: f64, var: f64, lag: usize) -> f64 {
    let n = trace.len();
    let mut sum = 0.0;
    for i in 0..n - lag {
        sum += (trace[i][d] - mean) * (trace[i + lag][d] - mean);
    }
    sum / ((n - lag) as f64 * var)
}

// -------------------------------------------------------------------------
// Result wiring
// -------------------------------------------------------------------------

/// Estimate and record the burn-in of the target chain.
///
/// # Errors
/// [`FitError::EmptySampleResult`] without a sampling section or with
/// an empty target chain.
pub fn compute_burn_in(result: &mut EstimationResult) -> FitResult<usize> {
    let sample = result.sample.as_mut().ok_or(FitError::EmptySampleResult)?;
    let chain = sample.trace_x.first().ok_or(FitError::EmptySampleResult)?;
    if chain.is_empty() {
        return Err(FitError::EmptySampleResult);
    }
    let burn_in = geweke_burn_in(chain);
    info!("Geweke burn-in: {} of {} samples", burn_in, chain.len());
    sample.burn_in = Some(burn_in);
    Ok(burn_in)
}

/// Estimate and record the effective sample size of the target chain
/// past its recorded burn-in (the whole chain when none is recorded).
///
/// # Errors
/// [`FitError::EmptySampleResult`] without a sampling section or when
/// burn-in consumed the whole chain.
pub fn compute_effective_sample_size(result: &mut EstimationResult) -> FitResult<f64> {
    let sample = result.sample.as_mut().ok_or(FitError::EmptySampleResult)?;
    let converged = sample.converged_samples();
    if converged.is_empty() {
        return Err(FitError::EmptySampleResult);
    }
    let ess = effective_sample_size(converged);
    info!("Effective sample size: {:.1} of {} samples", ess, converged.len());
    sample.effective_sample_size = Some(ess);
    Ok(ess)
}
