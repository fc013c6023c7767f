//! problem — the estimation problem container.
//!
//! Purpose
//! -------
//! Tie an [`Objective`] to parameter bounds, names, fixed parameters,
//! and startpoint guesses. Everything downstream (multi-start
//! optimization, profiles, sampling) consumes a `Problem` and works in
//! the reduced space of free parameters; this module owns the mapping
//! between full and reduced vectors.
//!
//! Key behaviors
//! -------------
//! - Construction validates bound lengths against the objective
//!   dimension and `lb <= ub` elementwise; infinite bounds are legal
//!   (startpoint sampling rejects them later, optimization does not).
//! - The fixed-parameter set is kept sorted and duplicate-free; fixing
//!   an already-fixed index overwrites its value; values are clipped
//!   into the bounds with a logged warning.
//! - `value_free`/`grad_free`/`hess_free` inflate a reduced vector to
//!   full space, call the objective, and project derivatives back.
//!
//! Invariants & assumptions
//! ------------------------
//! - `dim() + x_fixed_indices().len() == dim_full()` at all times.
//! - `full_vector(&reduced_vector(x)?)? == x` whenever `x` carries the
//!   current fixed values.
//! - Cloning is cheap: the objective is behind an `Arc`, so profile and
//!   sampling tasks clone the problem per task.
//!
//! Conventions
//! -----------
//! - "Full" vectors have `dim_full()` entries, "free"/"reduced" vectors
//!   have `dim()` entries; helper names carry the suffix.
//!
//! Downstream usage
//! ----------------
//! - `optimize::minimize` runs in free space against `lb_free`/`ub_free`;
//!   `profile` fixes one parameter at a time via `fix_parameters`;
//!   `sampling` evaluates through `value_free`.
//!
//! Testing notes
//! -------------
//! - Round trips between full and reduced space and the clipping rule
//!   are pinned by unit tests below.
use std::{collections::BTreeMap, sync::Arc};

use tracing::warn;

use crate::{
    errors::{FitError, FitResult},
    objective::Objective,
    types::{Gradient, HessianMatrix, Parameters},
};

/// Parameter estimation problem: objective, box bounds, fixed subset.
#[derive(Clone)]
pub struct Problem {
    objective: Arc<dyn Objective>,
    lb: Parameters,
    ub: Parameters,
    x_names: Vec<String>,
    x_fixed_indices: Vec<usize>,
    x_fixed_vals: Vec<f64>,
    x_guesses: Vec<Parameters>,
}

impl std::fmt::Debug for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("dim_full", &self.dim_full())
            .field("dim", &self.dim())
            .field("x_fixed_indices", &self.x_fixed_indices)
            .field("n_guesses", &self.x_guesses.len())
            .finish()
    }
}

impl Problem {
    /// Build a problem over the full parameter space of `objective`.
    ///
    /// # Errors
    /// - [`FitError::BoundsLengthMismatch`] when a bound vector does not
    ///   have the objective dimension.
    /// - [`FitError::InvalidBounds`] when `lb[i] > ub[i]` or a bound is
    ///   NaN.
    pub fn new(
        objective: impl Objective + 'static, lb: Parameters, ub: Parameters,
    ) -> FitResult<Self> {
        let dim = objective.dim();
        if lb.len() != dim {
            return Err(FitError::BoundsLengthMismatch { expected: dim, actual: lb.len() });
        }
        if ub.len() != dim {
            return Err(FitError::BoundsLengthMismatch { expected: dim, actual: ub.len() });
        }
        for i in 0..dim {
            if lb[i].is_nan() || ub[i].is_nan() || lb[i] > ub[i] {
                return Err(FitError::InvalidBounds { index: i, lower: lb[i], upper: ub[i] });
            }
        }
        let x_names = (0..dim).map(|i| format!("x{i}")).collect();
        Ok(Self {
            objective: Arc::new(objective),
            lb,
            ub,
            x_names,
            x_fixed_indices: Vec::new(),
            x_fixed_vals: Vec::new(),
            x_guesses: Vec::new(),
        })
    }

    /// Replace the generated parameter names.
    ///
    /// # Errors
    /// - [`FitError::ParameterLengthMismatch`] when `names` does not have
    ///   one entry per full-space parameter.
    pub fn with_names(mut self, names: Vec<String>) -> FitResult<Self> {
        if names.len() != self.dim_full() {
            return Err(FitError::ParameterLengthMismatch {
                expected: self.dim_full(),
                actual: names.len(),
            });
        }
        self.x_names = names;
        Ok(self)
    }

    // ---- Dimensions and accessors ----

    /// Dimension of the underlying objective (all parameters).
    pub fn dim_full(&self) -> usize {
        self.objective.dim()
    }

    /// Number of free (non-fixed) parameters.
    pub fn dim(&self) -> usize {
        self.dim_full() - self.x_fixed_indices.len()
    }

    pub fn objective(&self) -> &dyn Objective {
        self.objective.as_ref()
    }

    pub fn lb(&self) -> &Parameters {
        &self.lb
    }

    pub fn ub(&self) -> &Parameters {
        &self.ub
    }

    pub fn x_names(&self) -> &[String] {
        &self.x_names
    }

    /// Fixed indices, sorted ascending without duplicates.
    pub fn x_fixed_indices(&self) -> &[usize] {
        &self.x_fixed_indices
    }

    /// Fixed values, parallel to [`Self::x_fixed_indices`].
    pub fn x_fixed_vals(&self) -> &[f64] {
        &self.x_fixed_vals
    }

    /// Free indices, sorted ascending.
    pub fn x_free_indices(&self) -> Vec<usize> {
        (0..self.dim_full()).filter(|i| !self.is_fixed(*i)).collect()
    }

    fn is_fixed(&self, index: usize) -> bool {
        self.x_fixed_indices.binary_search(&index).is_ok()
    }

    /// Lower bounds restricted to free coordinates.
    pub fn lb_free(&self) -> Parameters {
        self.select_free(&self.lb)
    }

    /// Upper bounds restricted to free coordinates.
    pub fn ub_free(&self) -> Parameters {
        self.select_free(&self.ub)
    }

    // ---- Fixed parameters ----

    /// Fix `indices[k]` to `values[k]`, clipping into the bounds.
    ///
    /// Re-fixing an index overwrites its value. Clipped values are
    /// logged as warnings.
    ///
    /// # Errors
    /// - [`FitError::InvalidOptions`] when the slices have different
    ///   lengths.
    /// - [`FitError::IndexOutOfRange`] / [`FitError::NonFiniteFixedValue`]
    ///   per entry.
    pub fn fix_parameters(&mut self, indices: &[usize], values: &[f64]) -> FitResult<()> {
        if indices.len() != values.len() {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "fix_parameters needs one value per index, got {} indices and {} values",
                    indices.len(),
                    values.len()
                ),
            });
        }
        let mut fixed: BTreeMap<usize, f64> =
            self.x_fixed_indices.iter().copied().zip(self.x_fixed_vals.iter().copied()).collect();
        for (&index, &value) in indices.iter().zip(values) {
            if index >= self.dim_full() {
                return Err(FitError::IndexOutOfRange { index, dim: self.dim_full() });
            }
            if !value.is_finite() {
                return Err(FitError::NonFiniteFixedValue { index, value });
            }
            let clipped = value.clamp(self.lb[index], self.ub[index]);
            if clipped != value {
                warn!(
                    "Fixed value {} for parameter {} lies outside [{}, {}], clipping to {}",
                    value, index, self.lb[index], self.ub[index], clipped
                );
            }
            fixed.insert(index, clipped);
        }
        self.x_fixed_indices = fixed.keys().copied().collect();
        self.x_fixed_vals = fixed.values().copied().collect();
        Ok(())
    }

    /// Release fixed parameters; indices that are not fixed are ignored.
    ///
    /// # Errors
    /// - [`FitError::IndexOutOfRange`] for an index outside the full
    ///   dimension.
    pub fn unfix_parameters(&mut self, indices: &[usize]) -> FitResult<()> {
        let mut fixed: BTreeMap<usize, f64> =
            self.x_fixed_indices.iter().copied().zip(self.x_fixed_vals.iter().copied()).collect();
        for &index in indices {
            if index >= self.dim_full() {
                return Err(FitError::IndexOutOfRange { index, dim: self.dim_full() });
            }
            fixed.remove(&index);
        }
        self.x_fixed_indices = fixed.keys().copied().collect();
        self.x_fixed_vals = fixed.values().copied().collect();
        Ok(())
    }

    // ---- Full/reduced mapping ----

    /// Expand a free-space vector to full space using the fixed values.
    ///
    /// # Errors
    /// - [`FitError::ParameterLengthMismatch`] when `x_free` does not
    ///   have `dim()` entries.
    pub fn full_vector(&self, x_free: &Parameters) -> FitResult<Parameters> {
        if x_free.len() != self.dim() {
            return Err(FitError::ParameterLengthMismatch {
                expected: self.dim(),
                actual: x_free.len(),
            });
        }
        let mut full = Parameters::zeros(self.dim_full());
        let mut next_free = 0;
        let mut next_fixed = 0;
        for i in 0..self.dim_full() {
            if next_fixed < self.x_fixed_indices.len() && self.x_fixed_indices[next_fixed] == i {
                full[i] = self.x_fixed_vals[next_fixed];
                next_fixed += 1;
            } else {
                full[i] = x_free[next_free];
                next_free += 1;
            }
        }
        Ok(full)
    }

    /// Restrict a full-space vector to the free coordinates.
    ///
    /// # Errors
    /// - [`FitError::ParameterLengthMismatch`] when `x_full` does not
    ///   have `dim_full()` entries.
    pub fn reduced_vector(&self, x_full: &Parameters) -> FitResult<Parameters> {
        if x_full.len() != self.dim_full() {
            return Err(FitError::ParameterLengthMismatch {
                expected: self.dim_full(),
                actual: x_full.len(),
            });
        }
        Ok(self.select_free(x_full))
    }

    /// Position of full-space index `i` within the free vector; `None`
    /// when `i` is fixed or out of range.
    pub fn full_index_to_free_index(&self, i: usize) -> Option<usize> {
        if i >= self.dim_full() || self.is_fixed(i) {
            return None;
        }
        let n_fixed_before = self.x_fixed_indices.partition_point(|&fixed| fixed < i);
        Some(i - n_fixed_before)
    }

    fn select_free(&self, v: &Parameters) -> Parameters {
        Parameters::from_iter(
            v.iter().enumerate().filter(|(i, _)| !self.is_fixed(*i)).map(|(_, value)| *value),
        )
    }

    // ---- Startpoint guesses ----

    /// Full-space guesses consumed before sampled start points.
    ///
    /// # Errors
    /// - [`FitError::ParameterLengthMismatch`] for a guess of the wrong
    ///   length.
    pub fn set_x_guesses(&mut self, points: Vec<Parameters>) -> FitResult<()> {
        for point in &points {
            if point.len() != self.dim_full() {
                return Err(FitError::ParameterLengthMismatch {
                    expected: self.dim_full(),
                    actual: point.len(),
                });
            }
        }
        self.x_guesses = points;
        Ok(())
    }

    pub fn x_guesses(&self) -> &[Parameters] {
        &self.x_guesses
    }

    // ---- Reduced-space evaluation ----

    /// Objective value at a free-space point.
    pub fn value_free(&self, x_free: &Parameters) -> FitResult<f64> {
        let full = self.full_vector(x_free)?;
        self.objective.value(&full)
    }

    /// Objective gradient at a free-space point, projected to the free
    /// coordinates.
    pub fn grad_free(&self, x_free: &Parameters) -> FitResult<Gradient> {
        let full = self.full_vector(x_free)?;
        let grad = self.objective.grad(&full)?;
        if grad.len() != self.dim_full() {
            return Err(FitError::GradientDimMismatch {
                expected: self.dim_full(),
                found: grad.len(),
            });
        }
        Ok(self.select_free(&grad))
    }

    /// Objective Hessian at a free-space point, restricted to the
    /// free-by-free block.
    pub fn hess_free(&self, x_free: &Parameters) -> FitResult<HessianMatrix> {
        let full = self.full_vector(x_free)?;
        let hess = self.objective.hess(&full)?;
        if hess.nrows() != self.dim_full() || hess.ncols() != self.dim_full() {
            return Err(FitError::HessianDimMismatch {
                expected: self.dim_full(),
                found: (hess.nrows(), hess.ncols()),
            });
        }
        let free = self.x_free_indices();
        let mut out = HessianMatrix::zeros((free.len(), free.len()));
        for (r, &i) in free.iter().enumerate() {
            for (c, &j) in free.iter().enumerate() {
                out[[r, c]] = hess[[i, j]];
            }
        }
        Ok(out)
    }
}
