//! optimize::builders — argmin solver construction helpers.
//!
//! Purpose
//! -------
//! Hide argmin's generic wiring behind small builders so the optimizer
//! types can request configured solvers without touching argmin types.
//! Initial parameters and iteration limits stay with the runner layer;
//! these builders are side-effect free.
//!
//! Key behaviors
//! -------------
//! - L-BFGS with either line search, tolerances applied through argmin's
//!   `with_tolerance_*` setters (invalid values surface as crate errors
//!   via `From<argmin::core::Error>`).
//! - Nelder–Mead from an axis-aligned initial simplex around the start
//!   point, with an optional standard-deviation tolerance.
use argmin::solver::{neldermead::NelderMead, quasinewton::LBFGS};

use crate::{
    errors::FitResult,
    optimize::solvers::{LbfgsOptimizer, NelderMeadOptimizer},
    types::{Gradient, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente, MoreThuenteLS, Parameters},
};

/// Construct L-BFGS with More–Thuente line search.
///
/// # Errors
/// Propagates argmin's rejection of a configured tolerance.
pub(crate) fn build_lbfgs_more_thuente(opts: &LbfgsOptimizer) -> FitResult<LbfgsMoreThuente> {
    let line_search = MoreThuenteLS::new();
    let lbfgs = LbfgsMoreThuente::new(line_search, opts.memory);
    configure_lbfgs(lbfgs, opts)
}

/// [`build_lbfgs_more_thuente`] with Hager–Zhang line search.
pub(crate) fn build_lbfgs_hager_zhang(opts: &LbfgsOptimizer) -> FitResult<LbfgsHagerZhang> {
    let line_search = HagerZhangLS::new();
    let lbfgs = LbfgsHagerZhang::new(line_search, opts.memory);
    configure_lbfgs(lbfgs, opts)
}

/// Apply the optional gradient and cost-change tolerances, whatever the
/// line-search type. Absent tolerances leave argmin's defaults in place.
fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Parameters, Gradient, f64>, opts: &LbfgsOptimizer,
) -> FitResult<LBFGS<L, Parameters, Gradient, f64>> {
    if let Some(tol) = opts.tol_grad {
        solver = solver.with_tolerance_grad(tol)?;
    }
    if let Some(tol) = opts.tol_cost {
        solver = solver.with_tolerance_cost(tol)?;
    }
    Ok(solver)
}

/// Construct Nelder–Mead on the simplex spanned by `z0` and one
/// axis-perturbed vertex per coordinate.
///
/// # Errors
/// Propagates argmin's rejection of the standard-deviation tolerance.
pub(crate) fn build_nelder_mead(
    opts: &NelderMeadOptimizer, z0: &Parameters,
) -> FitResult<NelderMead<Parameters, f64>> {
    let mut solver = NelderMead::new(initial_simplex(z0, opts.simplex_rel_step,
        opts.simplex_abs_step));
    if let Some(tol) = opts.sd_tolerance {
        solver = solver.with_sd_tolerance(tol)?;
    }
    Ok(solver)
}

/// Axis-aligned simplex: `z0` plus, per coordinate, a vertex shifted by
/// a relative step (absolute for zero coordinates).
fn initial_simplex(z0: &Parameters, rel_step: f64, abs_step: f64) -> Vec<Parameters> {
    let mut vertices = Vec::with_capacity(z0.len() + 1);
    vertices.push(z0.clone());
    for i in 0..z0.len() {
        let mut vertex = z0.clone();
        vertex[i] = if vertex[i] != 0.0 { vertex[i] * (1.0 + rel_step) } else { abs_step };
        vertices.push(vertex);
    }
    vertices
}
