//! optimize::transforms — smooth mapping between bounded and internal space.
//!
//! Purpose
//! -------
//! The gradient solvers run unconstrained, while estimation problems
//! carry box bounds. [`BoundTransform`] maps each free coordinate
//! between its bounded interval and an unconstrained internal axis so
//! solver iterates can never leave the box.
//!
//! Key behaviors
//! -------------
//! - Two finite bounds: logistic rescaling onto `(l, u)`.
//! - One finite bound: softplus shift above `l` or below `u`.
//! - No finite bound: identity. Degenerate `l == u`: the coordinate is
//!   pinned to `l`.
//! - `chain_gradient` maps bounded-space gradients into internal space
//!   with the elementwise chain rule `dc/dy = dc/dx * dx/dy`.
//! - Points on (or outside) a bound are nudged strictly inside before
//!   the inverse map, so `to_internal` always returns finite values.
//!
//! Invariants & assumptions
//! ------------------------
//! - Bounds were validated by `Problem::new` (`l <= u`, no NaN).
//! - `to_bounded(to_internal(x))` reproduces `x` up to the nudge and
//!   floating-point rounding; every output of `to_bounded` satisfies
//!   `l <= x <= u` exactly.
//!
//! Conventions
//! -----------
//! - `x` denotes bounded (problem) space, `y` internal (solver) space.
//!
//! Testing notes
//! -------------
//! - Round trips per bound case and a finite-difference check of the
//!   chain rule pin the formulas.
use crate::types::{Gradient, Parameters};

/// Clamp for logit inputs, keeping the inverse map finite on the bounds.
const LOGIT_EPS: f64 = 1e-10;
/// Above this input softplus and its inverse are numerically the identity.
const SOFTPLUS_CUTOFF: f64 = 20.0;
/// Relative nudge applied to points sitting on a bound.
const BOUND_NUDGE: f64 = 1e-10;

/// `ln(1 + e^y)` without overflow for large `y`.
fn safe_softplus(y: f64) -> f64 {
    if y > SOFTPLUS_CUTOFF {
        y
    } else {
        y.exp().ln_1p()
    }
}

/// Inverse of [`safe_softplus`]; `s` must be strictly positive.
fn safe_softplus_inv(s: f64) -> f64 {
    if s > SOFTPLUS_CUTOFF {
        s
    } else {
        (s.exp() - 1.0).ln()
    }
}

/// `1 / (1 + e^-y)`; saturates to 0 and 1 without producing NaN.
fn safe_logistic(y: f64) -> f64 {
    1.0 / (1.0 + (-y).exp())
}

/// `ln(p / (1 - p))` with `p` clamped away from 0 and 1.
fn safe_logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

/// Per-coordinate bound classification.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    /// `l == u`; the coordinate is constant.
    Pinned { value: f64 },
    /// Finite `l < u`: logistic rescaling.
    TwoSided { lower: f64, width: f64 },
    /// Finite lower bound only: `x = l + softplus(y)`.
    LowerOnly { lower: f64 },
    /// Finite upper bound only: `x = u - softplus(y)`.
    UpperOnly { upper: f64 },
    /// No finite bound.
    Free,
}

impl Axis {
    fn classify(lower: f64, upper: f64) -> Self {
        match (lower.is_finite(), upper.is_finite()) {
            (true, true) if lower == upper => Axis::Pinned { value: lower },
            (true, true) => Axis::TwoSided { lower, width: upper - lower },
            (true, false) => Axis::LowerOnly { lower },
            (false, true) => Axis::UpperOnly { upper },
            (false, false) => Axis::Free,
        }
    }

    fn to_internal(self, x: f64) -> f64 {
        match self {
            Axis::Pinned { .. } => 0.0,
            Axis::TwoSided { lower, width } => {
                let nudge = width * BOUND_NUDGE;
                let x = x.clamp(lower + nudge, lower + width - nudge);
                safe_logit((x - lower) / width)
            }
            Axis::LowerOnly { lower } => {
                let nudge = BOUND_NUDGE * lower.abs().max(1.0);
                safe_softplus_inv((x - lower).max(nudge))
            }
            Axis::UpperOnly { upper } => {
                let nudge = BOUND_NUDGE * upper.abs().max(1.0);
                safe_softplus_inv((upper - x).max(nudge))
            }
            Axis::Free => x,
        }
    }

    fn to_bounded(self, y: f64) -> f64 {
        match self {
            Axis::Pinned { value } => value,
            Axis::TwoSided { lower, width } => lower + width * safe_logistic(y),
            Axis::LowerOnly { lower } => lower + safe_softplus(y),
            Axis::UpperOnly { upper } => upper - safe_softplus(y),
            Axis::Free => y,
        }
    }

    /// `dx/dy` at internal coordinate `y`.
    fn slope(self, y: f64) -> f64 {
        match self {
            Axis::Pinned { .. } => 0.0,
            Axis::TwoSided { width, .. } => {
                let s = safe_logistic(y);
                width * s * (1.0 - s)
            }
            Axis::LowerOnly { .. } => safe_logistic(y),
            Axis::UpperOnly { .. } => -safe_logistic(y),
            Axis::Free => 1.0,
        }
    }
}

/// Invertible map between the bounded free space and the solvers'
/// unconstrained internal space.
#[derive(Debug, Clone)]
pub struct BoundTransform {
    axes: Vec<Axis>,
}

impl BoundTransform {
    /// Build from free-space bounds (as returned by
    /// `Problem::lb_free`/`ub_free`).
    pub fn new(lb: &Parameters, ub: &Parameters) -> Self {
        let axes = lb.iter().zip(ub.iter()).map(|(&l, &u)| Axis::classify(l, u)).collect();
        Self { axes }
    }

    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// Map a bounded point into internal space, nudging off the bounds.
    pub fn to_internal(&self, x: &Parameters) -> Parameters {
        Parameters::from_iter(self.axes.iter().zip(x.iter()).map(|(axis, &v)| axis.to_internal(v)))
    }

    /// Map an internal point back into the bounded box.
    pub fn to_bounded(&self, y: &Parameters) -> Parameters {
        Parameters::from_iter(self.axes.iter().zip(y.iter()).map(|(axis, &v)| axis.to_bounded(v)))
    }

    /// Map a bounded-space gradient at internal point `y` into internal
    /// space.
    pub fn chain_gradient(&self, y: &Parameters, grad_x: &Gradient) -> Gradient {
        Gradient::from_iter(
            self.axes
                .iter()
                .zip(y.iter())
                .zip(grad_x.iter())
                .map(|((axis, &yi), &gi)| gi * axis.slope(yi)),
        )
    }
}
