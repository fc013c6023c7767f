//! objective::check — analytic-vs-difference gradient verification.
//!
//! Purpose
//! -------
//! Compare an objective's analytic gradient against forward, backward,
//! and central differences, per parameter, before trusting it inside an
//! optimization. Misimplemented model sensitivities are the most common
//! cause of silently bad fits; this check catches them early.
//!
//! Key behaviors
//! -------------
//! - [`check_grad`] evaluates one step size and reports, per parameter,
//!   the analytic derivative, the three difference quotients, the
//!   forward/backward spread, and absolute plus relative error with
//!   `rel_err = |grad - fd_c| / (|fd_c| + eps)`.
//! - [`check_grad_multi_eps`] repeats the check over several step sizes
//!   and keeps, per parameter, the row with the smallest relative error,
//!   so a poorly scaled single step does not produce false alarms.
//!
//! Invariants & assumptions
//! ------------------------
//! - The objective must provide an analytic gradient; checking a
//!   difference gradient against itself is meaningless and surfaces as
//!   the underlying `SensitivityUnavailable` error.
//!
//! Testing notes
//! -------------
//! - A deliberately wrong gradient component must be flagged by exactly
//!   its own row.
use crate::{
    errors::{FitError, FitResult},
    objective::Objective,
    types::Parameters,
};

/// Per-parameter outcome of one gradient check.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientCheckRow {
    pub index: usize,
    /// Step size this row was computed with.
    pub eps: f64,
    /// Analytic derivative.
    pub grad: f64,
    /// Forward difference quotient.
    pub fd_f: f64,
    /// Backward difference quotient.
    pub fd_b: f64,
    /// Central difference quotient.
    pub fd_c: f64,
    /// Spread between forward and backward quotients.
    pub fd_err: f64,
    /// `|grad - fd_c|`.
    pub abs_err: f64,
    /// `|grad - fd_c| / (|fd_c| + eps)`.
    pub rel_err: f64,
}

/// Full gradient check, one row per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientCheck {
    pub rows: Vec<GradientCheckRow>,
}

impl GradientCheck {
    /// Largest relative error over all parameters; NaN if any row is NaN.
    pub fn max_rel_err(&self) -> f64 {
        self.rows.iter().map(|r| r.rel_err).fold(0.0, |acc, v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                acc.max(v)
            }
        })
    }

    /// True when every relative error is at most `tol`; NaN rows fail.
    pub fn passes(&self, tol: f64) -> bool {
        self.rows.iter().all(|r| r.rel_err <= tol)
    }

    /// Indices whose relative error exceeds `tol`.
    pub fn failures(&self, tol: f64) -> Vec<usize> {
        self.rows.iter().filter(|r| !(r.rel_err <= tol)).map(|r| r.index).collect()
    }
}

/// Compare the analytic gradient at `x` against difference quotients
/// with step `eps`.
///
/// # Errors
/// - [`FitError::InvalidOptions`] for a non-positive or non-finite `eps`.
/// - [`FitError::ParameterLengthMismatch`] for a wrong-length `x`.
/// - Whatever the objective's `value`/`grad` return, propagated.
pub fn check_grad<O: Objective + ?Sized>(
    objective: &O, x: &Parameters, eps: f64,
) -> FitResult<GradientCheck> {
    if !eps.is_finite() || eps <= 0.0 {
        return Err(FitError::InvalidOptions {
            reason: format!("gradient-check step must be positive and finite, got {eps}"),
        });
    }
    if x.len() != objective.dim() {
        return Err(FitError::ParameterLengthMismatch {
            expected: objective.dim(),
            actual: x.len(),
        });
    }
    let grad = objective.grad(x)?;
    let f0 = objective.value(x)?;
    let mut rows = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let mut xp = x.clone();
        xp[i] += eps;
        let mut xm = x.clone();
        xm[i] -= eps;
        let fp = objective.value(&xp)?;
        let fm = objective.value(&xm)?;
        let fd_f = (fp - f0) / eps;
        let fd_b = (f0 - fm) / eps;
        let fd_c = (fp - fm) / (2.0 * eps);
        let abs_err = (grad[i] - fd_c).abs();
        rows.push(GradientCheckRow {
            index: i,
            eps,
            grad: grad[i],
            fd_f,
            fd_b,
            fd_c,
            fd_err: (fd_f - fd_b).abs(),
            abs_err,
            rel_err: abs_err / (fd_c.abs() + eps),
        });
    }
    Ok(GradientCheck { rows })
}

/// Run [`check_grad`] for every step in `epsilons` and keep, per
/// parameter, the row with the smallest relative error.
///
/// # Errors
/// - [`FitError::InvalidOptions`] for an empty step list, plus everything
///   [`check_grad`] can return.
pub fn check_grad_multi_eps<O: Objective + ?Sized>(
    objective: &O, x: &Parameters, epsilons: &[f64],
) -> FitResult<GradientCheck> {
    let Some((first, rest)) = epsilons.split_first() else {
        return Err(FitError::InvalidOptions {
            reason: "gradient check needs at least one step size".to_string(),
        });
    };
    let mut best = check_grad(objective, x, *first)?;
    for &eps in rest {
        let candidate = check_grad(objective, x, eps)?;
        for (kept, row) in best.rows.iter_mut().zip(candidate.rows) {
            if row.rel_err < kept.rel_err {
                *kept = row;
            }
        }
    }
    Ok(best)
}
