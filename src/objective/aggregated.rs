//! objective::aggregated — sum of independent objective terms.
//!
//! The usual composition is likelihood + priors: values, gradients, and
//! Hessians add; residual vectors concatenate and residual Jacobians
//! stack row-wise. A quantity is only advertised when every component
//! provides it.
use crate::{
    errors::{FitError, FitResult},
    objective::Objective,
    types::{Gradient, HessianMatrix, JacobianMatrix, Parameters, Residuals},
};
use ndarray::Array2;

/// Sum of objectives sharing one parameter vector.
pub struct AggregatedObjective {
    parts: Vec<Box<dyn Objective>>,
    dim: usize,
    name: String,
}

impl std::fmt::Debug for AggregatedObjective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatedObjective")
            .field("dim", &self.dim)
            .field("name", &self.name)
            .field("parts", &self.parts.len())
            .finish()
    }
}

impl AggregatedObjective {
    /// Combine `parts` into a single objective.
    ///
    /// # Errors
    /// - [`FitError::EmptyAggregate`] when `parts` is empty.
    /// - [`FitError::ParameterLengthMismatch`] when the parts disagree on
    ///   the parameter dimension.
    pub fn new(parts: Vec<Box<dyn Objective>>) -> FitResult<Self> {
        let first = parts.first().ok_or(FitError::EmptyAggregate)?;
        let dim = first.dim();
        for part in &parts {
            if part.dim() != dim {
                return Err(FitError::ParameterLengthMismatch {
                    expected: dim,
                    actual: part.dim(),
                });
            }
        }
        Ok(Self { parts, dim, name: "aggregated objective".to_string() })
    }

    pub fn parts(&self) -> &[Box<dyn Objective>] {
        &self.parts
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Objective for AggregatedObjective {
    fn dim(&self) -> usize {
        self.dim
    }

    fn value(&self, x: &Parameters) -> FitResult<f64> {
        let mut total = 0.0;
        for part in &self.parts {
            total += part.value(x)?;
        }
        Ok(total)
    }

    fn grad(&self, x: &Parameters) -> FitResult<Gradient> {
        let mut total = Gradient::zeros(self.dim);
        for part in &self.parts {
            total += &part.grad(x)?;
        }
        Ok(total)
    }

    fn hess(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        let mut total = HessianMatrix::zeros((self.dim, self.dim));
        for part in &self.parts {
            total += &part.hess(x)?;
        }
        Ok(total)
    }

    fn residuals(&self, x: &Parameters) -> FitResult<Residuals> {
        let mut stacked = Vec::new();
        for part in &self.parts {
            stacked.extend(part.residuals(x)?.into_iter());
        }
        Ok(Residuals::from_vec(stacked))
    }

    fn sres(&self, x: &Parameters) -> FitResult<JacobianMatrix> {
        let mut rows = Vec::new();
        let mut n_rows = 0;
        for part in &self.parts {
            let jac = part.sres(x)?;
            if jac.ncols() != self.dim {
                return Err(FitError::ParameterLengthMismatch {
                    expected: self.dim,
                    actual: jac.ncols(),
                });
            }
            n_rows += jac.nrows();
            rows.extend(jac.into_iter());
        }
        Array2::from_shape_vec((n_rows, self.dim), rows)
            .map_err(|_| FitError::ParameterLengthMismatch { expected: self.dim, actual: 0 })
    }

    fn provides_grad(&self) -> bool {
        self.parts.iter().all(|p| p.provides_grad())
    }

    fn provides_hess(&self) -> bool {
        self.parts.iter().all(|p| p.provides_hess())
    }

    fn provides_residuals(&self) -> bool {
        self.parts.iter().all(|p| p.provides_residuals())
    }

    fn provides_sres(&self) -> bool {
        self.parts.iter().all(|p| p.provides_sres())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
