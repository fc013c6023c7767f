//! Profile-walk options and next-guess strategy selection.

use crate::errors::{FitError, FitResult};

/// How the next point along a profile is proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NextGuessMethod {
    /// Constant step in the profiled coordinate, other parameters held
    /// at the previous optimum.
    FixedStep,
    /// Adaptive step length, other parameters held (order 0).
    #[default]
    AdaptiveStepOrder0,
    /// Adaptive step length, other parameters extrapolated linearly
    /// from the last two path points (order 1).
    AdaptiveStepOrder1,
    /// Adaptive step length, other parameters extrapolated by a
    /// least-squares polynomial over the recent path.
    AdaptiveStepRegression,
}

/// Options governing the walk along a likelihood profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileOptions {
    /// Initial (and fixed-step) step length in the profiled coordinate.
    pub default_step_size: f64,
    /// Smallest adaptive step; also the floor for failure retries.
    pub min_step_size: f64,
    /// Largest adaptive step.
    pub max_step_size: f64,
    /// Multiplicative factor for growing/shrinking the adaptive step.
    pub step_size_factor: f64,
    /// Target bound on the ratio change per step for adaptive methods.
    pub delta_ratio_max: f64,
    /// Walk stops once the ratio drops below this (unless `whole_path`).
    /// The default is just below the 95%/1-df likelihood threshold.
    pub ratio_min: f64,
    /// Number of recent path points used by regression extrapolation.
    pub reg_points: usize,
    /// Maximum polynomial degree for regression extrapolation.
    pub reg_order: usize,
    /// Walk all the way to the bounds regardless of the ratio.
    pub whole_path: bool,
    /// Step reductions attempted when a reoptimization fails before the
    /// direction is abandoned.
    pub max_step_reduce_attempts: usize,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        ProfileOptions {
            default_step_size: 0.01,
            min_step_size: 1e-3,
            max_step_size: 1.0,
            step_size_factor: 1.25,
            delta_ratio_max: 0.1,
            ratio_min: 0.145,
            reg_points: 10,
            reg_order: 4,
            whole_path: false,
            max_step_reduce_attempts: 5,
        }
    }
}

impl ProfileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_step_size(mut self, step: f64) -> Self {
        self.default_step_size = step;
        self
    }

    pub fn with_step_range(mut self, min: f64, max: f64) -> Self {
        self.min_step_size = min;
        self.max_step_size = max;
        self
    }

    pub fn with_ratio_min(mut self, ratio_min: f64) -> Self {
        self.ratio_min = ratio_min;
        self
    }

    pub fn with_whole_path(mut self, whole_path: bool) -> Self {
        self.whole_path = whole_path;
        self
    }

    /// Check the option set before any walk starts.
    ///
    /// # Errors
    /// [`FitError::InvalidOptions`] for non-positive step sizes, a step
    /// ordering violation (`min <= default <= max`), a growth factor not
    /// above 1, or a ratio bound outside `(0, 1)`.
    pub fn validate(&self) -> FitResult<()> {
        for (name, value) in [
            ("default_step_size", self.default_step_size),
            ("min_step_size", self.min_step_size),
            ("max_step_size", self.max_step_size),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FitError::InvalidOptions {
                    reason: format!("{name} must be positive and finite, got {value}"),
                });
            }
        }
        if self.min_step_size > self.default_step_size
            || self.default_step_size > self.max_step_size
        {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "step sizes must satisfy min <= default <= max, got {} <= {} <= {}",
                    self.min_step_size, self.default_step_size, self.max_step_size
                ),
            });
        }
        if !self.step_size_factor.is_finite() || self.step_size_factor <= 1.0 {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "step_size_factor must be greater than 1, got {}",
                    self.step_size_factor
                ),
            });
        }
        if !self.delta_ratio_max.is_finite() || self.delta_ratio_max <= 0.0 {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "delta_ratio_max must be positive, got {}",
                    self.delta_ratio_max
                ),
            });
        }
        if !self.ratio_min.is_finite() || !(0.0..1.0).contains(&self.ratio_min) {
            return Err(FitError::InvalidOptions {
                reason: format!("ratio_min must lie in [0, 1), got {}", self.ratio_min),
            });
        }
        if self.reg_points < 2 {
            return Err(FitError::InvalidOptions {
                reason: format!("reg_points must be at least 2, got {}", self.reg_points),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Default options validating cleanly.
    // - Each validation rule rejecting its malformed setting.
    //
    // They intentionally DO NOT cover:
    // - How options shape the walk (walk module tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The shipped defaults must pass their own validation.
    //
    // Given
    // -----
    // - ProfileOptions::default().
    //
    // Expect
    // ------
    // - validate() returns Ok.
    fn defaults_validate() {
        assert!(ProfileOptions::default().validate().is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Each malformed setting must be rejected with InvalidOptions.
    //
    // Given
    // -----
    // - Zero step, inverted step ordering, factor 1, ratio_min 1.
    //
    // Expect
    // ------
    // - validate() errors in every case.
    fn malformed_settings_are_rejected() {
        // Arrange
        let zero_step = ProfileOptions { default_step_size: 0.0, ..Default::default() };
        let inverted = ProfileOptions::default().with_step_range(0.5, 0.9);
        let flat_factor = ProfileOptions { step_size_factor: 1.0, ..Default::default() };
        let ratio_one = ProfileOptions::default().with_ratio_min(1.0);

        // Act & Assert
        for options in [zero_step, inverted, flat_factor, ratio_one] {
            assert!(matches!(options.validate(), Err(FitError::InvalidOptions { .. })));
        }
    }
}
