//! objective::fd — finite-difference derivative filler.
//!
//! Purpose
//! -------
//! Wrap an inner [`Objective`] and supply any derivative it does not
//! provide by finite differences, so gradient-based optimizers and
//! profile walks can run on value-only models.
//!
//! Key behaviors
//! -------------
//! - Per-quantity switches (`FdSwitch`): `Auto` uses the inner analytic
//!   derivative when present and falls back to differences otherwise,
//!   `Fd` always differentiates, `Off` reports the quantity unavailable.
//! - Forward, backward, and central difference schemes.
//! - Hessians come from second differences of values, or from first
//!   differences of inner gradients when `hess_via_fval` is off and the
//!   inner objective provides gradients.
//! - Step sizes are managed by [`FdDelta`]: a fixed user step, or
//!   per-coordinate steps `eps^(1/3) * max(|x_i|, 1)` re-estimated
//!   according to an update strategy (`DeltaUpdate`).
//!
//! Invariants & assumptions
//! ------------------------
//! - The wrapper never changes `dim()`; value and residual calls are
//!   plain delegation.
//! - Steps are not clipped to bounds; callers evaluating near a bound
//!   own that concern.
//! - Difference-based Hessians are symmetrized by averaging the
//!   off-diagonal pairs.
//!
//! Downstream usage
//! ----------------
//! - `optimize` consumes wrapped objectives like any other; the gradient
//!   check in `objective::check` uses raw differences directly instead.
//!
//! Testing notes
//! -------------
//! - Quadratics give exact derivatives up to rounding, which pins the
//!   difference formulas tightly.
use std::sync::Mutex;

use ndarray::Array1;

use crate::{
    errors::{FitError, FitResult},
    objective::Objective,
    types::{Gradient, HessianMatrix, JacobianMatrix, Parameters, Residuals},
};

/// Re-estimate per-coordinate steps every this many step queries under
/// `DeltaUpdate::Steps`.
const STEPS_PERIOD: u64 = 30;
/// Re-estimate under `DeltaUpdate::Distance` once the point has moved
/// further than this multiple of the step-vector norm.
const DISTANCE_FACTOR: f64 = 10.0;

/// Difference scheme used for all filled derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdMethod {
    Forward,
    Backward,
    Central,
}

/// Per-quantity policy of the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdSwitch {
    /// Inner analytic derivative when provided, differences otherwise.
    Auto,
    /// Always differentiate, ignoring inner derivatives.
    Fd,
    /// Report the quantity as unavailable.
    Off,
}

/// When adaptive steps are re-estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaUpdate {
    /// Estimate once at the first query and keep it.
    Constant,
    /// Re-estimate after moving far relative to the current steps.
    Distance,
    /// Re-estimate every [`STEPS_PERIOD`]-th query.
    Steps,
    /// Re-estimate at every query.
    Always,
}

/// Step-size state shared by all difference computations of one wrapper.
#[derive(Debug, Clone)]
pub struct FdDelta {
    fixed: Option<f64>,
    update: DeltaUpdate,
    delta: Option<Array1<f64>>,
    updates: u64,
    n_queries: u64,
    last_x: Option<Parameters>,
}

impl FdDelta {
    /// Fixed scalar step for every coordinate; never re-estimated.
    ///
    /// # Errors
    /// - [`FitError::InvalidOptions`] if `step` is not strictly positive
    ///   and finite.
    pub fn fixed(step: f64) -> FitResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(FitError::InvalidOptions {
                reason: format!("finite-difference step must be positive and finite, got {step}"),
            });
        }
        Ok(Self {
            fixed: Some(step),
            update: DeltaUpdate::Constant,
            delta: None,
            updates: 0,
            n_queries: 0,
            last_x: None,
        })
    }

    /// Adaptive per-coordinate steps with the given update strategy.
    pub fn adaptive(update: DeltaUpdate) -> Self {
        Self { fixed: None, update, delta: None, updates: 0, n_queries: 0, last_x: None }
    }

    /// Number of step re-estimations so far; stays zero for fixed steps.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn estimate(x: &Parameters) -> Array1<f64> {
        x.mapv(|v| f64::EPSILON.cbrt() * v.abs().max(1.0))
    }

    /// Per-coordinate steps to use at `x`, re-estimating when the update
    /// strategy calls for it.
    fn steps_for(&mut self, x: &Parameters) -> Array1<f64> {
        if let Some(step) = self.fixed {
            return Array1::from_elem(x.len(), step);
        }
        self.n_queries += 1;
        let stale = matches!(&self.delta, Some(d) if d.len() != x.len());
        let recompute = stale
            || match (&self.delta, self.update) {
                (None, _) => true,
                (_, DeltaUpdate::Constant) => false,
                (_, DeltaUpdate::Always) => true,
                (_, DeltaUpdate::Steps) => self.n_queries % STEPS_PERIOD == 0,
                (Some(delta), DeltaUpdate::Distance) => match &self.last_x {
                    Some(prev) if prev.len() == x.len() => {
                        let moved = (x - prev).mapv(|v| v * v).sum().sqrt();
                        let scale = delta.mapv(|v| v * v).sum().sqrt();
                        moved > DISTANCE_FACTOR * scale
                    }
                    _ => true,
                },
            };
        if recompute {
            self.delta = Some(Self::estimate(x));
            self.updates += 1;
            self.last_x = Some(x.clone());
        }
        match &self.delta {
            Some(d) if d.len() == x.len() => d.clone(),
            _ => Self::estimate(x),
        }
    }
}

impl Default for FdDelta {
    fn default() -> Self {
        Self::adaptive(DeltaUpdate::Constant)
    }
}

/// Finite-difference wrapper around an inner objective.
pub struct FdObjective<O: Objective> {
    inner: O,
    method: FdMethod,
    grad_switch: FdSwitch,
    hess_switch: FdSwitch,
    sres_switch: FdSwitch,
    hess_via_fval: bool,
    delta: Mutex<FdDelta>,
}

impl<O: Objective> FdObjective<O> {
    /// Wrap `inner` with central differences, `Auto` switches, and
    /// constant adaptive steps.
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            method: FdMethod::Central,
            grad_switch: FdSwitch::Auto,
            hess_switch: FdSwitch::Auto,
            sres_switch: FdSwitch::Auto,
            hess_via_fval: true,
            delta: Mutex::new(FdDelta::default()),
        }
    }

    pub fn with_method(mut self, method: FdMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_grad(mut self, switch: FdSwitch) -> Self {
        self.grad_switch = switch;
        self
    }

    pub fn with_hess(mut self, switch: FdSwitch) -> Self {
        self.hess_switch = switch;
        self
    }

    pub fn with_sres(mut self, switch: FdSwitch) -> Self {
        self.sres_switch = switch;
        self
    }

    pub fn with_delta(mut self, delta: FdDelta) -> Self {
        self.delta = Mutex::new(delta);
        self
    }

    /// `false` switches difference-based Hessians to first differences of
    /// inner gradients (requires `inner.provides_grad()`).
    pub fn with_hess_via_fval(mut self, via_fval: bool) -> Self {
        self.hess_via_fval = via_fval;
        self
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Number of adaptive step re-estimations performed so far.
    pub fn delta_updates(&self) -> u64 {
        self.lock_delta().updates()
    }

    fn lock_delta(&self) -> std::sync::MutexGuard<'_, FdDelta> {
        self.delta.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn steps_at(&self, x: &Parameters) -> Array1<f64> {
        self.lock_delta().steps_for(x)
    }

    /// Gradient by first differences of values.
    fn fd_grad(&self, x: &Parameters) -> FitResult<Gradient> {
        let steps = self.steps_at(x);
        let n = x.len();
        let mut g = Gradient::zeros(n);
        match self.method {
            FdMethod::Central => {
                for i in 0..n {
                    let d = steps[i];
                    let mut xp = x.clone();
                    xp[i] += d;
                    let mut xm = x.clone();
                    xm[i] -= d;
                    g[i] = (self.inner.value(&xp)? - self.inner.value(&xm)?) / (2.0 * d);
                }
            }
            FdMethod::Forward => {
                let f0 = self.inner.value(x)?;
                for i in 0..n {
                    let d = steps[i];
                    let mut xp = x.clone();
                    xp[i] += d;
                    g[i] = (self.inner.value(&xp)? - f0) / d;
                }
            }
            FdMethod::Backward => {
                let f0 = self.inner.value(x)?;
                for i in 0..n {
                    let d = steps[i];
                    let mut xm = x.clone();
                    xm[i] -= d;
                    g[i] = (f0 - self.inner.value(&xm)?) / d;
                }
            }
        }
        Ok(g)
    }

    /// Hessian by second differences of values.
    fn fd_hess_values(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        let steps = self.steps_at(x);
        let n = x.len();
        let mut h = HessianMatrix::zeros((n, n));
        match self.method {
            FdMethod::Central => {
                let f0 = self.inner.value(x)?;
                for i in 0..n {
                    let di = steps[i];
                    let mut xp = x.clone();
                    xp[i] += di;
                    let mut xm = x.clone();
                    xm[i] -= di;
                    h[[i, i]] =
                        (self.inner.value(&xp)? - 2.0 * f0 + self.inner.value(&xm)?) / (di * di);
                    for j in (i + 1)..n {
                        let dj = steps[j];
                        let mut xpp = x.clone();
                        xpp[i] += di;
                        xpp[j] += dj;
                        let mut xpm = x.clone();
                        xpm[i] += di;
                        xpm[j] -= dj;
                        let mut xmp = x.clone();
                        xmp[i] -= di;
                        xmp[j] += dj;
                        let mut xmm = x.clone();
                        xmm[i] -= di;
                        xmm[j] -= dj;
                        let v = (self.inner.value(&xpp)? - self.inner.value(&xpm)?
                            - self.inner.value(&xmp)?
                            + self.inner.value(&xmm)?)
                            / (4.0 * di * dj);
                        h[[i, j]] = v;
                        h[[j, i]] = v;
                    }
                }
            }
            FdMethod::Forward | FdMethod::Backward => {
                // One-sided second differences share a formula up to the
                // sign of the step.
                let sign = if self.method == FdMethod::Forward { 1.0 } else { -1.0 };
                let f0 = self.inner.value(x)?;
                let mut f_single = vec![0.0; n];
                for (i, f_i) in f_single.iter_mut().enumerate() {
                    let mut xi = x.clone();
                    xi[i] += sign * steps[i];
                    *f_i = self.inner.value(&xi)?;
                }
                for i in 0..n {
                    for j in i..n {
                        let mut xij = x.clone();
                        xij[i] += sign * steps[i];
                        xij[j] += sign * steps[j];
                        let v = (self.inner.value(&xij)? - f_single[i] - f_single[j] + f0)
                            / (steps[i] * steps[j]);
                        h[[i, j]] = v;
                        h[[j, i]] = v;
                    }
                }
            }
        }
        Ok(h)
    }

    /// Hessian by first differences of inner analytic gradients.
    fn fd_hess_grads(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        let steps = self.steps_at(x);
        let n = x.len();
        let mut h = HessianMatrix::zeros((n, n));
        match self.method {
            FdMethod::Central => {
                for i in 0..n {
                    let d = steps[i];
                    let mut xp = x.clone();
                    xp[i] += d;
                    let mut xm = x.clone();
                    xm[i] -= d;
                    let col = (self.inner.grad(&xp)? - self.inner.grad(&xm)?) / (2.0 * d);
                    h.column_mut(i).assign(&col);
                }
            }
            FdMethod::Forward => {
                let g0 = self.inner.grad(x)?;
                for i in 0..n {
                    let d = steps[i];
                    let mut xp = x.clone();
                    xp[i] += d;
                    let col = (self.inner.grad(&xp)? - &g0) / d;
                    h.column_mut(i).assign(&col);
                }
            }
            FdMethod::Backward => {
                let g0 = self.inner.grad(x)?;
                for i in 0..n {
                    let d = steps[i];
                    let mut xm = x.clone();
                    xm[i] -= d;
                    let col = (&g0 - self.inner.grad(&xm)?) / d;
                    h.column_mut(i).assign(&col);
                }
            }
        }
        symmetrize(&mut h);
        Ok(h)
    }

    /// Residual Jacobian by first differences of inner residuals.
    fn fd_sres(&self, x: &Parameters) -> FitResult<JacobianMatrix> {
        let steps = self.steps_at(x);
        let n = x.len();
        let r0 = self.inner.residuals(x)?;
        let mut jac = JacobianMatrix::zeros((r0.len(), n));
        for j in 0..n {
            let d = steps[j];
            let col: Residuals = match self.method {
                FdMethod::Central => {
                    let mut xp = x.clone();
                    xp[j] += d;
                    let mut xm = x.clone();
                    xm[j] -= d;
                    (self.inner.residuals(&xp)? - self.inner.residuals(&xm)?) / (2.0 * d)
                }
                FdMethod::Forward => {
                    let mut xp = x.clone();
                    xp[j] += d;
                    (self.inner.residuals(&xp)? - &r0) / d
                }
                FdMethod::Backward => {
                    let mut xm = x.clone();
                    xm[j] -= d;
                    (&r0 - self.inner.residuals(&xm)?) / d
                }
            };
            jac.column_mut(j).assign(&col);
        }
        Ok(jac)
    }
}

/// Average off-diagonal pairs in place.
fn symmetrize(h: &mut HessianMatrix) {
    let n = h.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (h[[i, j]] + h[[j, i]]);
            h[[i, j]] = avg;
            h[[j, i]] = avg;
        }
    }
}

impl<O: Objective> Objective for FdObjective<O> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn value(&self, x: &Parameters) -> FitResult<f64> {
        self.inner.value(x)
    }

    fn grad(&self, x: &Parameters) -> FitResult<Gradient> {
        match self.grad_switch {
            FdSwitch::Off => Err(FitError::SensitivityUnavailable { what: "grad" }),
            FdSwitch::Auto if self.inner.provides_grad() => self.inner.grad(x),
            FdSwitch::Auto | FdSwitch::Fd => self.fd_grad(x),
        }
    }

    fn hess(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        match self.hess_switch {
            FdSwitch::Off => Err(FitError::SensitivityUnavailable { what: "hess" }),
            FdSwitch::Auto if self.inner.provides_hess() => self.inner.hess(x),
            FdSwitch::Auto | FdSwitch::Fd => {
                if !self.hess_via_fval && self.inner.provides_grad() {
                    self.fd_hess_grads(x)
                } else {
                    self.fd_hess_values(x)
                }
            }
        }
    }

    fn residuals(&self, x: &Parameters) -> FitResult<Residuals> {
        self.inner.residuals(x)
    }

    fn sres(&self, x: &Parameters) -> FitResult<JacobianMatrix> {
        match self.sres_switch {
            FdSwitch::Off => Err(FitError::SensitivityUnavailable { what: "sres" }),
            FdSwitch::Auto if self.inner.provides_sres() => self.inner.sres(x),
            FdSwitch::Auto | FdSwitch::Fd => {
                if self.inner.provides_residuals() {
                    self.fd_sres(x)
                } else {
                    Err(FitError::SensitivityUnavailable { what: "sres" })
                }
            }
        }
    }

    fn provides_grad(&self) -> bool {
        self.grad_switch != FdSwitch::Off
    }

    fn provides_hess(&self) -> bool {
        self.hess_switch != FdSwitch::Off
    }

    fn provides_residuals(&self) -> bool {
        self.inner.provides_residuals()
    }

    fn provides_sres(&self) -> bool {
        match self.sres_switch {
            FdSwitch::Off => false,
            FdSwitch::Fd => self.inner.provides_residuals(),
            FdSwitch::Auto => self.inner.provides_sres() || self.inner.provides_residuals(),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
