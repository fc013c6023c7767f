//! objective::function — closure-backed objectives.
//!
//! [`FnObjective`] wraps plain closures for the value and, optionally, its
//! derivatives. [`ResidualObjective`] wraps a residual closure and derives
//! value, gradient, and a Gauss–Newton Hessian from it. Both are the
//! quickest route from a formula to something the toolbox can optimize;
//! models with state or fallible evaluation should implement
//! [`Objective`](super::Objective) directly.
use crate::{
    errors::{FitError, FitResult},
    objective::Objective,
    types::{Gradient, HessianMatrix, JacobianMatrix, Parameters, Residuals},
};

type ValueFn = Box<dyn Fn(&Parameters) -> f64 + Send + Sync>;
type GradFn = Box<dyn Fn(&Parameters) -> Gradient + Send + Sync>;
type HessFn = Box<dyn Fn(&Parameters) -> HessianMatrix + Send + Sync>;
type ResFn = Box<dyn Fn(&Parameters) -> Residuals + Send + Sync>;
type JacFn = Box<dyn Fn(&Parameters) -> JacobianMatrix + Send + Sync>;

/// Objective defined by closures.
///
/// The value closure is required; gradient and Hessian closures are
/// attached with [`FnObjective::with_grad`] / [`FnObjective::with_hess`]
/// and drive the corresponding capability flags. Closures are trusted to
/// be deterministic; non-finite return values are passed through as data.
pub struct FnObjective {
    dim: usize,
    name: String,
    value_fn: ValueFn,
    grad_fn: Option<GradFn>,
    hess_fn: Option<HessFn>,
}

impl FnObjective {
    pub fn new<F>(dim: usize, value_fn: F) -> Self
    where
        F: Fn(&Parameters) -> f64 + Send + Sync + 'static,
    {
        Self {
            dim,
            name: "fn objective".to_string(),
            value_fn: Box::new(value_fn),
            grad_fn: None,
            hess_fn: None,
        }
    }

    pub fn with_grad<G>(mut self, grad_fn: G) -> Self
    where
        G: Fn(&Parameters) -> Gradient + Send + Sync + 'static,
    {
        self.grad_fn = Some(Box::new(grad_fn));
        self
    }

    pub fn with_hess<H>(mut self, hess_fn: H) -> Self
    where
        H: Fn(&Parameters) -> HessianMatrix + Send + Sync + 'static,
    {
        self.hess_fn = Some(Box::new(hess_fn));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn check_len(&self, x: &Parameters) -> FitResult<()> {
        if x.len() != self.dim {
            return Err(FitError::ParameterLengthMismatch { expected: self.dim, actual: x.len() });
        }
        Ok(())
    }
}

impl Objective for FnObjective {
    fn dim(&self) -> usize {
        self.dim
    }

    fn value(&self, x: &Parameters) -> FitResult<f64> {
        self.check_len(x)?;
        Ok((self.value_fn)(x))
    }

    fn grad(&self, x: &Parameters) -> FitResult<Gradient> {
        self.check_len(x)?;
        let grad_fn = self
            .grad_fn
            .as_ref()
            .ok_or(FitError::SensitivityUnavailable { what: "grad" })?;
        let g = grad_fn(x);
        if g.len() != self.dim {
            return Err(FitError::GradientDimMismatch { expected: self.dim, found: g.len() });
        }
        Ok(g)
    }

    fn hess(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        self.check_len(x)?;
        let hess_fn = self
            .hess_fn
            .as_ref()
            .ok_or(FitError::SensitivityUnavailable { what: "hess" })?;
        let h = hess_fn(x);
        if h.nrows() != self.dim || h.ncols() != self.dim {
            return Err(FitError::HessianDimMismatch {
                expected: self.dim,
                found: (h.nrows(), h.ncols()),
            });
        }
        Ok(h)
    }

    fn provides_grad(&self) -> bool {
        self.grad_fn.is_some()
    }

    fn provides_hess(&self) -> bool {
        self.hess_fn.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Least-squares objective defined by a residual closure.
///
/// With residuals `r(x)` the value is `½‖r‖²`. When a Jacobian closure
/// `J = ∂r/∂x` is attached, the gradient `Jᵀr` and the Gauss–Newton
/// Hessian `JᵀJ` become available as well. The Gauss–Newton matrix drops
/// the second-order residual term, which is the standard approximation
/// near a good fit.
pub struct ResidualObjective {
    dim: usize,
    name: String,
    res_fn: ResFn,
    jac_fn: Option<JacFn>,
}

impl ResidualObjective {
    pub fn new<R>(dim: usize, res_fn: R) -> Self
    where
        R: Fn(&Parameters) -> Residuals + Send + Sync + 'static,
    {
        Self {
            dim,
            name: "residual objective".to_string(),
            res_fn: Box::new(res_fn),
            jac_fn: None,
        }
    }

    pub fn with_jacobian<J>(mut self, jac_fn: J) -> Self
    where
        J: Fn(&Parameters) -> JacobianMatrix + Send + Sync + 'static,
    {
        self.jac_fn = Some(Box::new(jac_fn));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn check_len(&self, x: &Parameters) -> FitResult<()> {
        if x.len() != self.dim {
            return Err(FitError::ParameterLengthMismatch { expected: self.dim, actual: x.len() });
        }
        Ok(())
    }

    fn jacobian(&self, x: &Parameters) -> FitResult<JacobianMatrix> {
        let jac_fn = self
            .jac_fn
            .as_ref()
            .ok_or(FitError::SensitivityUnavailable { what: "sres" })?;
        Ok(jac_fn(x))
    }
}

impl Objective for ResidualObjective {
    fn dim(&self) -> usize {
        self.dim
    }

    fn value(&self, x: &Parameters) -> FitResult<f64> {
        self.check_len(x)?;
        let r = (self.res_fn)(x);
        Ok(0.5 * r.dot(&r))
    }

    fn grad(&self, x: &Parameters) -> FitResult<Gradient> {
        self.check_len(x)?;
        let r = (self.res_fn)(x);
        let jac = self.jacobian(x)?;
        Ok(jac.t().dot(&r))
    }

    fn hess(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        self.check_len(x)?;
        let jac = self.jacobian(x)?;
        Ok(jac.t().dot(&jac))
    }

    fn residuals(&self, x: &Parameters) -> FitResult<Residuals> {
        self.check_len(x)?;
        Ok((self.res_fn)(x))
    }

    fn sres(&self, x: &Parameters) -> FitResult<JacobianMatrix> {
        self.check_len(x)?;
        self.jacobian(x)
    }

    fn provides_grad(&self) -> bool {
        self.jac_fn.is_some()
    }

    fn provides_hess(&self) -> bool {
        self.jac_fn.is_some()
    }

    fn provides_residuals(&self) -> bool {
        true
    }

    fn provides_sres(&self) -> bool {
        self.jac_fn.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
