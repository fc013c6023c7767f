//! types — numeric aliases shared across the crate.
//!
//! Purpose
//! -------
//! Name the handful of array and solver shapes every module passes
//! around, so signatures read in estimation terms (`Parameters`,
//! `Gradient`) rather than in `ndarray`/argmin generics. Everything is
//! dense `f64`; values are negative log-likelihoods and the whole crate
//! minimizes.
//!
//! Conventions
//! -----------
//! - Whether a vector is full-space or free-space is decided at the call
//!   site; `Problem` owns the mapping between the two.
//! - The L-BFGS aliases pin argmin's `(Param, Gradient, Float)` triple
//!   once, so solver construction sites stay short.

use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// A parameter vector.
pub type Parameters = Array1<f64>;

/// Objective gradient, same length as the parameter vector it was
/// evaluated at.
pub type Gradient = Array1<f64>;

/// Dense objective Hessian, square in the parameter dimension.
pub type HessianMatrix = Array2<f64>;

/// Residual vector of a least-squares objective.
pub type Residuals = Array1<f64>;

/// Residual sensitivities, one row per residual and one column per
/// parameter.
pub type JacobianMatrix = Array2<f64>;

/// Evaluation counters harvested from a solver run, keyed by the
/// backend's counter names (`"cost_count"`, `"gradient_count"`, ...).
pub type FnEvalMap = HashMap<String, u64>;

/// L-BFGS history length used when the caller does not choose one.
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Hager-Zhang line search over this crate's vector types.
pub type HagerZhangLS = HagerZhangLineSearch<Parameters, Gradient, f64>;

/// More-Thuente line search over this crate's vector types.
pub type MoreThuenteLS = MoreThuenteLineSearch<Parameters, Gradient, f64>;

/// L-BFGS with a Hager-Zhang line search.
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Parameters, Gradient, f64>;

/// L-BFGS with a More-Thuente line search.
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Parameters, Gradient, f64>;
