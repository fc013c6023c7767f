//! objective::priors — parameter priors as an additive objective term.
//!
//! Purpose
//! -------
//! Express per-parameter priors as a negative-log-density objective so
//! they can be added to a likelihood via
//! [`AggregatedObjective`](super::AggregatedObjective), turning a
//! maximum-likelihood fit into a maximum-a-posteriori fit without
//! touching the likelihood code.
//!
//! Key behaviors
//! -------------
//! - Supported densities: normal, Laplace, log-normal, uniform.
//! - Analytic gradient and (diagonal) Hessian for every kind; the
//!   Laplace gradient uses the sign convention `sign(0) = 0` at the kink.
//! - Parameters without a prior contribute nothing; gradients and
//!   Hessians are zero there.
//!
//! Invariants & assumptions
//! ------------------------
//! - Priors act on the parameters exactly as the optimizer sees them; any
//!   scale transformation (log10 parameterization and the like) must be
//!   applied by the caller before constructing the prior.
//! - Outside a density's support the value is `+inf` and derivatives are
//!   zero; bounded problems should keep the optimizer away from there.
//!
//! Testing notes
//! -------------
//! - Closed-form checks per density kind, including support boundaries.
use crate::{
    errors::{FitError, FitResult},
    objective::Objective,
    types::{Gradient, HessianMatrix, Parameters},
};

const HALF_LN_TWO_PI: f64 = 0.918_938_533_204_672_7;

/// Prior density family for a single parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriorKind {
    Normal { mean: f64, std: f64 },
    Laplace { mean: f64, scale: f64 },
    LogNormal { log_mean: f64, log_std: f64 },
    Uniform { lower: f64, upper: f64 },
}

impl PriorKind {
    /// Negative log-density at `x`.
    fn neg_log_density(&self, x: f64) -> f64 {
        match *self {
            PriorKind::Normal { mean, std } => {
                let z = (x - mean) / std;
                HALF_LN_TWO_PI + std.ln() + 0.5 * z * z
            }
            PriorKind::Laplace { mean, scale } => (2.0 * scale).ln() + (x - mean).abs() / scale,
            PriorKind::LogNormal { log_mean, log_std } => {
                if x <= 0.0 {
                    return f64::INFINITY;
                }
                let z = (x.ln() - log_mean) / log_std;
                x.ln() + log_std.ln() + HALF_LN_TWO_PI + 0.5 * z * z
            }
            PriorKind::Uniform { lower, upper } => {
                if x < lower || x > upper {
                    f64::INFINITY
                } else {
                    (upper - lower).ln()
                }
            }
        }
    }

    /// First derivative of the negative log-density.
    fn neg_log_density_grad(&self, x: f64) -> f64 {
        match *self {
            PriorKind::Normal { mean, std } => (x - mean) / (std * std),
            PriorKind::Laplace { mean, scale } => {
                if x == mean {
                    0.0
                } else {
                    (x - mean).signum() / scale
                }
            }
            PriorKind::LogNormal { log_mean, log_std } => {
                if x <= 0.0 {
                    return 0.0;
                }
                let s2 = log_std * log_std;
                1.0 / x + (x.ln() - log_mean) / (s2 * x)
            }
            PriorKind::Uniform { .. } => 0.0,
        }
    }

    /// Second derivative of the negative log-density.
    fn neg_log_density_curv(&self, x: f64) -> f64 {
        match *self {
            PriorKind::Normal { std, .. } => 1.0 / (std * std),
            PriorKind::Laplace { .. } => 0.0,
            PriorKind::LogNormal { log_mean, log_std } => {
                if x <= 0.0 {
                    return 0.0;
                }
                let s2 = log_std * log_std;
                let x2 = x * x;
                -1.0 / x2 + (1.0 - (x.ln() - log_mean)) / (s2 * x2)
            }
            PriorKind::Uniform { .. } => 0.0,
        }
    }

    fn validate(&self, index: usize) -> FitResult<()> {
        let ok = match *self {
            PriorKind::Normal { mean, std } => mean.is_finite() && std.is_finite() && std > 0.0,
            PriorKind::Laplace { mean, scale } => {
                mean.is_finite() && scale.is_finite() && scale > 0.0
            }
            PriorKind::LogNormal { log_mean, log_std } => {
                log_mean.is_finite() && log_std.is_finite() && log_std > 0.0
            }
            PriorKind::Uniform { lower, upper } => {
                lower.is_finite() && upper.is_finite() && lower < upper
            }
        };
        if ok {
            Ok(())
        } else {
            Err(FitError::InvalidPrior {
                index,
                reason: "location must be finite and the scale/width strictly positive",
            })
        }
    }
}

/// Prior attached to one parameter index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterPrior {
    pub index: usize,
    pub kind: PriorKind,
}

impl ParameterPrior {
    pub fn new(index: usize, kind: PriorKind) -> Self {
        Self { index, kind }
    }
}

/// Negative log-prior over a parameter vector.
#[derive(Debug)]
pub struct NegLogPriors {
    dim: usize,
    priors: Vec<ParameterPrior>,
}

impl NegLogPriors {
    /// Build a prior objective over a `dim`-dimensional parameter space.
    ///
    /// # Errors
    /// - [`FitError::IndexOutOfRange`] for a prior index `>= dim`.
    /// - [`FitError::InvalidPrior`] for non-finite locations or
    ///   non-positive scales.
    pub fn new(dim: usize, priors: Vec<ParameterPrior>) -> FitResult<Self> {
        for prior in &priors {
            if prior.index >= dim {
                return Err(FitError::IndexOutOfRange { index: prior.index, dim });
            }
            prior.kind.validate(prior.index)?;
        }
        Ok(Self { dim, priors })
    }

    pub fn priors(&self) -> &[ParameterPrior] {
        &self.priors
    }
}

impl Objective for NegLogPriors {
    fn dim(&self) -> usize {
        self.dim
    }

    fn value(&self, x: &Parameters) -> FitResult<f64> {
        if x.len() != self.dim {
            return Err(FitError::ParameterLengthMismatch { expected: self.dim, actual: x.len() });
        }
        Ok(self.priors.iter().map(|p| p.kind.neg_log_density(x[p.index])).sum())
    }

    fn grad(&self, x: &Parameters) -> FitResult<Gradient> {
        if x.len() != self.dim {
            return Err(FitError::ParameterLengthMismatch { expected: self.dim, actual: x.len() });
        }
        let mut g = Gradient::zeros(self.dim);
        for p in &self.priors {
            g[p.index] += p.kind.neg_log_density_grad(x[p.index]);
        }
        Ok(g)
    }

    fn hess(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        if x.len() != self.dim {
            return Err(FitError::ParameterLengthMismatch { expected: self.dim, actual: x.len() });
        }
        let mut h = HessianMatrix::zeros((self.dim, self.dim));
        for p in &self.priors {
            h[[p.index, p.index]] += p.kind.neg_log_density_curv(x[p.index]);
        }
        Ok(h)
    }

    fn provides_grad(&self) -> bool {
        true
    }

    fn provides_hess(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "negative log-prior"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Closed-form values and derivatives for each density kind.
    // - Support boundaries (uniform outside its box, log-normal at x <= 0).
    // - Validation of prior parameters and indices.
    //
    // They intentionally DO NOT cover:
    // - Aggregation with likelihoods (objective::aggregated tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check the standard-normal prior against its closed form.
    //
    // Given
    // -----
    // - A Normal(0, 1) prior on parameter 0 of a 2-D space, evaluated at 1.5.
    //
    // Expect
    // ------
    // - value == 0.5*ln(2π) + 0.5*1.5², grad == [1.5, 0], hess diag == [1, 0].
    fn normal_prior_matches_closed_form() {
        // Arrange
        let priors = NegLogPriors::new(
            2,
            vec![ParameterPrior::new(0, PriorKind::Normal { mean: 0.0, std: 1.0 })],
        )
        .expect("valid prior");
        let x = array![1.5, -7.0];

        // Act
        let val = priors.value(&x).expect("value should evaluate");
        let grad = priors.grad(&x).expect("gradient should evaluate");
        let hess = priors.hess(&x).expect("Hessian should evaluate");

        // Assert
        assert_relative_eq!(val, HALF_LN_TWO_PI + 0.5 * 1.5 * 1.5, epsilon = 1e-12);
        assert_relative_eq!(grad[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(grad[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(hess[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(hess[[1, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Check Laplace value and the sign convention of its gradient.
    //
    // Given
    // -----
    // - A Laplace(1, 2) prior evaluated left of, right of, and at its mean.
    //
    // Expect
    // ------
    // - value == ln(2*2) + |x-1|/2; grad == -1/2, +1/2, and 0 at the kink.
    fn laplace_prior_gradient_sign_convention() {
        // Arrange
        let priors = NegLogPriors::new(
            1,
            vec![ParameterPrior::new(0, PriorKind::Laplace { mean: 1.0, scale: 2.0 })],
        )
        .expect("valid prior");

        // Act / Assert
        let val = priors.value(&array![0.0]).expect("value left of mean");
        assert_relative_eq!(val, 4.0_f64.ln() + 0.5, epsilon = 1e-12);
        assert_relative_eq!(
            priors.grad(&array![0.0]).expect("grad left")[0],
            -0.5,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            priors.grad(&array![5.0]).expect("grad right")[0],
            0.5,
            epsilon = 1e-12
        );
        assert_relative_eq!(priors.grad(&array![1.0]).expect("grad at kink")[0], 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Verify support handling for the uniform and log-normal kinds.
    //
    // Given
    // -----
    // - Uniform(0, 2) and LogNormal(0, 1) priors on separate parameters.
    //
    // Expect
    // ------
    // - Inside the box the uniform contributes ln(2); outside, +inf.
    // - LogNormal at a non-positive coordinate is +inf with zero gradient.
    fn support_boundaries_yield_infinite_values() {
        // Arrange
        let priors = NegLogPriors::new(
            2,
            vec![
                ParameterPrior::new(0, PriorKind::Uniform { lower: 0.0, upper: 2.0 }),
                ParameterPrior::new(1, PriorKind::LogNormal { log_mean: 0.0, log_std: 1.0 }),
            ],
        )
        .expect("valid priors");

        // Act
        let inside = priors.value(&array![1.0, 1.0]).expect("inside support");
        let outside_box = priors.value(&array![3.0, 1.0]).expect("outside uniform box");
        let nonpositive = priors.value(&array![1.0, 0.0]).expect("log-normal at zero");
        let grad = priors.grad(&array![1.0, -1.0]).expect("gradient outside support");

        // Assert
        assert_relative_eq!(inside, 2.0_f64.ln() + HALF_LN_TWO_PI, epsilon = 1e-12);
        assert!(outside_box.is_infinite());
        assert!(nonpositive.is_infinite());
        assert_relative_eq!(grad[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Ensure invalid prior specifications are rejected at construction.
    //
    // Given
    // -----
    // - A zero-width uniform prior and an out-of-range index.
    //
    // Expect
    // ------
    // - InvalidPrior and IndexOutOfRange respectively.
    fn invalid_priors_are_rejected() {
        // Act
        let zero_width = NegLogPriors::new(
            1,
            vec![ParameterPrior::new(0, PriorKind::Uniform { lower: 1.0, upper: 1.0 })],
        )
        .expect_err("zero-width uniform must be rejected");
        let out_of_range = NegLogPriors::new(
            1,
            vec![ParameterPrior::new(3, PriorKind::Normal { mean: 0.0, std: 1.0 })],
        )
        .expect_err("index 3 outside dim 1 must be rejected");

        // Assert
        match zero_width {
            FitError::InvalidPrior { index: 0, .. } => {}
            other => panic!("Expected InvalidPrior, got {other:?}"),
        }
        match out_of_range {
            FitError::IndexOutOfRange { index: 3, dim: 1 } => {}
            other => panic!("Expected IndexOutOfRange, got {other:?}"),
        }
    }
}
