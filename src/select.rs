//! select — model comparison by information criteria.
//!
//! Purpose
//! -------
//! Rank candidate models that were each fitted to the same data by
//! AIC, corrected AIC, or BIC, computed from the fitted negative
//! log-likelihood and the model's parameter count.
//!
//! Key behaviors
//! -------------
//! - Criteria are comparable only within one candidate set; absolute
//!   values carry no meaning, so ranking works on deltas.
//! - AICc requires `n_observations > n_parameters + 1`; the correction
//!   diverges at the boundary and is refused below it.
//!
//! Testing notes
//! -------------
//! - Scores are pinned against hand-computed values; ranking against a
//!   nested-model setup where the criteria disagree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{FitError, FitResult};

// -------------------------------------------------------------------------
// Criteria
// -------------------------------------------------------------------------

/// Information criterion used to score a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Akaike: `2k + 2 nllh`.
    Aic,
    /// Small-sample corrected Akaike: adds `2k(k + 1) / (n - k - 1)`.
    Aicc,
    /// Bayesian: `k ln(n) + 2 nllh`.
    Bic,
}

/// One fitted candidate model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFit {
    /// Label the ranking reports.
    pub name: String,
    /// Negative log-likelihood at the fitted optimum.
    pub nllh: f64,
    /// Number of estimated (free) parameters.
    pub n_parameters: usize,
    /// Number of observations the model was fitted to.
    pub n_observations: usize,
}

impl ModelFit {
    pub fn new(
        name: impl Into<String>, nllh: f64, n_parameters: usize, n_observations: usize,
    ) -> Self {
        ModelFit { name: name.into(), nllh, n_parameters, n_observations }
    }

    /// Score this fit under the given criterion.
    ///
    /// # Errors
    /// - [`FitError::InvalidOptions`] for a non-finite `nllh`, for BIC
    ///   without observations, or for AICc with
    ///   `n_observations <= n_parameters + 1`.
    pub fn score(&self, criterion: Criterion) -> FitResult<f64> {
        if !self.nllh.is_finite() {
            return Err(FitError::InvalidOptions {
                reason: format!("model {} has non-finite nllh {}", self.name, self.nllh),
            });
        }
        let k = self.n_parameters as f64;
        let n = self.n_observations as f64;
        let aic = 2.0 * k + 2.0 * self.nllh;
        match criterion {
            Criterion::Aic => Ok(aic),
            Criterion::Aicc => {
                if self.n_observations <= self.n_parameters + 1 {
                    return Err(FitError::InvalidOptions {
                        reason: format!(
                            "AICc for model {} needs more than {} observations, got {}",
                            self.name,
                            self.n_parameters + 1,
                            self.n_observations
                        ),
                    });
                }
                Ok(aic + 2.0 * k * (k + 1.0) / (n - k - 1.0))
            }
            Criterion::Bic => {
                if self.n_observations == 0 {
                    return Err(FitError::InvalidOptions {
                        reason: format!("BIC for model {} needs observations", self.name),
                    });
                }
                Ok(k * n.ln() + 2.0 * self.nllh)
            }
        }
    }
}

// -------------------------------------------------------------------------
// Ranking
// -------------------------------------------------------------------------

/// The candidate with the lowest score under `criterion`.
///
/// # Errors
/// - [`FitError::InvalidOptions`] for an empty candidate set or any
///   unscorable candidate.
pub fn best_model(models: &[ModelFit], criterion: Criterion) -> FitResult<&ModelFit> {
    let scored = delta_scores(models, criterion)?;
    let mut best = 0;
    for (i, &delta) in scored.iter().enumerate() {
        if delta < scored[best] {
            best = i;
        }
    }
    debug!("Best model under {:?}: {}", criterion, models[best].name);
    Ok(&models[best])
}

/// Scores relative to the candidate set's minimum, in input order.
///
/// The best model scores 0; a delta above roughly 10 is conventionally
/// read as essentially no support for that candidate.
pub fn delta_scores(models: &[ModelFit], criterion: Criterion) -> FitResult<Vec<f64>> {
    if models.is_empty() {
        return Err(FitError::InvalidOptions {
            reason: String::from("model ranking needs at least one candidate"),
        });
    }
    let mut scores = Vec::with_capacity(models.len());
    for model in models {
        scores.push(model.score(criterion)?);
    }
    let minimum = scores.iter().fold(f64::INFINITY, |acc, &s| acc.min(s));
    Ok(scores.into_iter().map(|s| s - minimum).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Criterion formulas against hand-computed values.
    // - Ranking where AIC and BIC disagree about a nested pair.
    // - Precondition failures.
    //
    // They intentionally DO NOT cover:
    // - Obtaining nllh values (optimize module tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Each criterion must reproduce its textbook formula.
    //
    // Given
    // -----
    // - A fit with nllh 10, 3 parameters, 20 observations.
    //
    // Expect
    // ------
    // - AIC 26, AICc 26 + 24/16 = 27.5, BIC 3 ln(20) + 20.
    fn criteria_match_their_formulas() {
        // Arrange
        let fit = ModelFit::new("m", 10.0, 3, 20);

        // Act & Assert
        assert_relative_eq!(fit.score(Criterion::Aic).expect("scorable"), 26.0);
        assert_relative_eq!(fit.score(Criterion::Aicc).expect("scorable"), 27.5);
        assert_relative_eq!(
            fit.score(Criterion::Bic).expect("scorable"),
            3.0 * 20.0_f64.ln() + 20.0
        );
    }

    #[test]
    // Purpose
    // -------
    // BIC's stronger complexity penalty must flip the ranking of a
    // nested pair that AIC narrowly prefers complex.
    //
    // Given
    // -----
    // - A 2-parameter fit with nllh 50 and a 6-parameter fit with nllh
    //   45 on 100 observations: AIC scores 104 vs 102, BIC scores
    //   2 ln(100) + 100 vs 6 ln(100) + 90.
    //
    // Expect
    // ------
    // - best_model: complex under AIC, simple under BIC; deltas are 0
    //   for each winner.
    fn aic_and_bic_can_disagree() {
        // Arrange
        let models = vec![
            ModelFit::new("simple", 50.0, 2, 100),
            ModelFit::new("complex", 45.0, 6, 100),
        ];

        // Act
        let by_aic = best_model(&models, Criterion::Aic).expect("rankable");
        let by_bic = best_model(&models, Criterion::Bic).expect("rankable");
        let deltas_aic = delta_scores(&models, Criterion::Aic).expect("rankable");
        let deltas_bic = delta_scores(&models, Criterion::Bic).expect("rankable");

        // Assert
        assert_eq!(by_aic.name, "complex");
        assert_eq!(by_bic.name, "simple");
        assert_relative_eq!(deltas_aic[1], 0.0);
        assert_relative_eq!(deltas_aic[0], 2.0);
        assert_relative_eq!(deltas_bic[0], 0.0);
        // BIC penalty difference: 4 ln(100) ~ 18.42 against 10 nllh gain.
        assert_relative_eq!(deltas_bic[1], 4.0 * 100.0_f64.ln() - 10.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Unscorable inputs must be refused with a reason.
    //
    // Given
    // -----
    // - An empty candidate set, an AICc request with n = k + 1, and an
    //   infinite nllh.
    //
    // Expect
    // ------
    // - All three fail with InvalidOptions.
    fn unscorable_inputs_are_refused() {
        // Arrange
        let boundary = ModelFit::new("boundary", 1.0, 4, 5);
        let failed = ModelFit::new("failed", f64::INFINITY, 1, 10);

        // Act & Assert
        assert!(matches!(
            delta_scores(&[], Criterion::Aic),
            Err(FitError::InvalidOptions { .. })
        ));
        assert!(matches!(boundary.score(Criterion::Aicc), Err(FitError::InvalidOptions { .. })));
        assert!(matches!(failed.score(Criterion::Aic), Err(FitError::InvalidOptions { .. })));
    }
}
