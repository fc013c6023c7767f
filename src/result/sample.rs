//! MCMC sampling result container.

use serde::{Deserialize, Serialize};

use crate::types::Parameters;

/// Chains produced by one sampling run.
///
/// Traces are free-space (the space the sampler walks in) and indexed
/// `[chain][iteration]`. Chain 0 is the target chain: for tempered
/// samplers it carries inverse temperature 1, for single-chain samplers
/// it is the only chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McmcResult {
    /// Sampled free-space points per chain, including the initial point.
    pub trace_x: Vec<Vec<Parameters>>,
    /// Negative log-posterior at each trace point.
    pub trace_neglogpost: Vec<Vec<f64>>,
    /// Inverse temperature of each chain; `[1.0]` for single-chain runs.
    pub betas: Vec<f64>,
    /// Within-chain proposal acceptance rate per chain.
    pub acceptance_rates: Vec<f64>,
    /// Between-chain swap acceptance rate; `None` without tempering.
    pub swap_rate: Option<f64>,
    /// Burn-in index for chain 0, once a convergence diagnostic set it.
    pub burn_in: Option<usize>,
    /// Effective sample size of chain 0 past burn-in, once computed.
    pub effective_sample_size: Option<f64>,
    /// Wall-clock seconds for the whole run.
    pub time: f64,
}

impl McmcResult {
    /// Number of chains.
    pub fn n_chains(&self) -> usize {
        self.trace_x.len()
    }

    /// Trace length of chain 0 (initial point included).
    pub fn n_samples(&self) -> usize {
        self.trace_x.first().map_or(0, Vec::len)
    }

    /// Chain-0 samples past the recorded burn-in (all samples when no
    /// burn-in has been set).
    pub fn converged_samples(&self) -> &[Parameters] {
        let cut = self.burn_in.unwrap_or(0);
        match self.trace_x.first() {
            Some(chain) => &chain[cut.min(chain.len())..],
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Burn-in slicing of the target chain.
    //
    // They intentionally DO NOT cover:
    // - Producing chains (sampling module tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // converged_samples must honor the recorded burn-in and degrade
    // gracefully when none is set or the cut exceeds the trace.
    //
    // Given
    // -----
    // - One chain of 4 points.
    //
    // Expect
    // ------
    // - No burn-in: all 4; burn-in 2: last 2; burn-in 10: empty.
    fn burn_in_slices_the_target_chain() {
        // Arrange
        let chain = vec![array![0.0], array![1.0], array![2.0], array![3.0]];
        let mut result = McmcResult {
            trace_x: vec![chain],
            trace_neglogpost: vec![vec![0.0; 4]],
            betas: vec![1.0],
            acceptance_rates: vec![0.5],
            swap_rate: None,
            burn_in: None,
            effective_sample_size: None,
            time: 0.0,
        };

        // Act & Assert
        assert_eq!(result.converged_samples().len(), 4);
        result.burn_in = Some(2);
        assert_eq!(result.converged_samples().len(), 2);
        assert_eq!(result.converged_samples()[0], array![2.0]);
        result.burn_in = Some(10);
        assert!(result.converged_samples().is_empty());
    }
}
