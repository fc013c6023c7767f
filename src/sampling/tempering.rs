//! Parallel tempering over a ladder of adaptive Metropolis chains.

use std::time::Instant;

use rand::Rng;
use tracing::debug;

use crate::{
    errors::{FitError, FitResult},
    problem::Problem,
    result::McmcResult,
    sampling::chain::{chain_step, posterior_value, AdaptiveKernel, ChainState},
    sampling::metropolis::{seeded_rng, AdaptiveMetropolisSampler},
    sampling::Sampler,
    types::Parameters,
};

/// Parallel tempering sampler.
///
/// Runs one adaptive Metropolis chain per rung of a geometric inverse
/// temperature ladder from 1 down to `beta_min` and proposes state
/// swaps between neighboring rungs after every sweep. Hot chains cross
/// barriers the cold chain cannot; swaps funnel their discoveries down
/// to chain 0, the only chain that samples the actual posterior.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelTemperingSampler {
    n_chains: usize,
    beta_min: f64,
    within_chain: AdaptiveMetropolisSampler,
    seed: Option<u64>,
}

impl Default for ParallelTemperingSampler {
    fn default() -> Self {
        ParallelTemperingSampler {
            n_chains: 4,
            beta_min: 1e-2,
            within_chain: AdaptiveMetropolisSampler::new(),
            seed: None,
        }
    }
}

impl ParallelTemperingSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rungs on the temperature ladder; at least 2.
    pub fn with_n_chains(mut self, n_chains: usize) -> Self {
        self.n_chains = n_chains;
        self
    }

    /// Inverse temperature of the hottest chain, in (0, 1).
    pub fn with_beta_min(mut self, beta_min: f64) -> Self {
        self.beta_min = beta_min;
        self
    }

    /// Settings for the adaptive Metropolis kernel each chain runs.
    pub fn with_within_chain(mut self, within_chain: AdaptiveMetropolisSampler) -> Self {
        self.within_chain = within_chain;
        self
    }

    /// Seed for the run's random number generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> FitResult<()> {
        if self.n_chains < 2 {
            return Err(FitError::InvalidOptions {
                reason: format!("tempering needs at least 2 chains, got {}", self.n_chains),
            });
        }
        if !(self.beta_min > 0.0 && self.beta_min < 1.0) {
            return Err(FitError::InvalidOptions {
                reason: format!("beta_min must lie in (0, 1), got {}", self.beta_min),
            });
        }
        Ok(())
    }

    /// Geometric ladder: `beta_min^(i / (n - 1))` for rung `i`, so rung
    /// 0 is the untempered posterior and the last rung is `beta_min`.
    fn betas(&self) -> Vec<f64> {
        let n = self.n_chains;
        (0..n).map(|i| self.beta_min.powf(i as f64 / (n - 1) as f64)).collect()
    }
}

impl Sampler for ParallelTemperingSampler {
    fn sample(
        &self, problem: &Problem, x0_free: &Parameters, n_samples: usize,
    ) -> FitResult<McmcResult> {
        self.validate()?;
        let clock = Instant::now();
        let lb_free = problem.lb_free();
        let ub_free = problem.ub_free();
        let fval0 = posterior_value(problem, &lb_free, &ub_free, x0_free);
        if !fval0.is_finite() {
            return Err(FitError::NonFiniteStart { value: fval0 });
        }

        let betas = self.betas();
        let mut rng = seeded_rng(self.seed);
        let mut states: Vec<ChainState> =
            betas.iter().map(|&beta| ChainState::new(x0_free.clone(), fval0, beta)).collect();
        let mut kernels: Vec<AdaptiveKernel> = Vec::with_capacity(self.n_chains);
        for _ in 0..self.n_chains {
            kernels.push(self.within_chain.kernel(x0_free)?);
        }

        let mut swaps_proposed = 0usize;
        let mut swaps_accepted = 0usize;
        for iteration in 0..n_samples {
            for (state, kernel) in states.iter_mut().zip(kernels.iter_mut()) {
                chain_step(problem, &lb_free, &ub_free, state, kernel, &mut rng, iteration)?;
            }
            // Neighbor swaps, hottest pair first so a good state can
            // travel several rungs toward chain 0 within one sweep.
            for i in (0..self.n_chains - 1).rev() {
                swaps_proposed += 1;
                let log_swap =
                    (betas[i] - betas[i + 1]) * (states[i].fval - states[i + 1].fval);
                if log_swap >= 0.0 || rng.gen::<f64>() < log_swap.exp() {
                    swaps_accepted += 1;
                    let (cold, hot) = states.split_at_mut(i + 1);
                    std::mem::swap(&mut cold[i].x, &mut hot[0].x);
                    std::mem::swap(&mut cold[i].fval, &mut hot[0].fval);
                }
            }
        }

        let swap_rate = if swaps_proposed == 0 {
            None
        } else {
            Some(swaps_accepted as f64 / swaps_proposed as f64)
        };
        debug!(
            "Tempering done: {} chains, swap rate {:?}",
            self.n_chains, swap_rate
        );
        let acceptance_rates = states.iter().map(ChainState::acceptance_rate).collect();
        let (trace_x, trace_neglogpost) =
            states.into_iter().map(|s| (s.trace_x, s.trace_fval)).unzip();
        Ok(McmcResult {
            trace_x,
            trace_neglogpost,
            betas,
            acceptance_rates,
            swap_rate,
            burn_in: None,
            effective_sample_size: None,
            time: clock.elapsed().as_secs_f64(),
        })
    }

    fn name(&self) -> &str {
        "ParallelTempering"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::FnObjective;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Ladder construction and result shape.
    // - Mode hopping on a bimodal target the cold chain alone gets
    //   stuck on.
    //
    // They intentionally DO NOT cover:
    // - Within-chain adaptation (chain and metropolis module tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The ladder must run geometrically from 1 to beta_min and the
    // result must carry one trace and acceptance rate per rung.
    //
    // Given
    // -----
    // - 4 chains with beta_min 1e-2 on a unit Gaussian, 200 sweeps.
    //
    // Expect
    // ------
    // - Betas [1, 0.215.., 0.046.., 0.01] descending; 4 traces of 201
    //   points; a swap rate in [0, 1].
    fn ladder_is_geometric_and_shapes_match() {
        // Arrange
        let objective = FnObjective::new(1, |x: &Parameters| 0.5 * x[0] * x[0]);
        let problem =
            Problem::new(objective, array![-5.0], array![5.0]).expect("valid problem");
        let sampler = ParallelTemperingSampler::new().with_seed(31);

        // Act
        let result = sampler.sample(&problem, &array![0.0], 200).expect("run should succeed");

        // Assert
        assert_eq!(result.n_chains(), 4);
        assert_eq!(result.n_samples(), 201);
        assert_relative_eq!(result.betas[0], 1.0);
        assert_relative_eq!(result.betas[3], 1e-2);
        assert_relative_eq!(result.betas[1], 1e-2_f64.powf(1.0 / 3.0), epsilon = 1e-12);
        for pair in result.betas.windows(2) {
            assert!(pair[0] > pair[1]);
        }
        let swap_rate = result.swap_rate.expect("swaps were proposed");
        assert!((0.0..=1.0).contains(&swap_rate));
        assert_eq!(result.acceptance_rates.len(), 4);
    }

    #[test]
    // Purpose
    // -------
    // Tempering must let the target chain visit both wells of a
    // deep-barrier bimodal posterior.
    //
    // Given
    // -----
    // - Negative log-posterior with modes at -3 and 3 separated by a
    //   barrier of height ~18, 4000 sweeps from the left mode, seed 41.
    //
    // Expect
    // ------
    // - Chain 0 spends at least 10% of its time on each side of 0.
    fn target_chain_visits_both_modes() {
        // Arrange
        let objective = FnObjective::new(1, |x: &Parameters| {
            let left = 2.0 * (x[0] + 3.0).powi(2);
            let right = 2.0 * (x[0] - 3.0).powi(2);
            -((-left).exp() + (-right).exp()).ln()
        });
        let problem =
            Problem::new(objective, array![-8.0], array![8.0]).expect("valid problem");
        let sampler = ParallelTemperingSampler::new().with_beta_min(1e-2).with_seed(41);

        // Act
        let result =
            sampler.sample(&problem, &array![-3.0], 4000).expect("run should succeed");

        // Assert
        let cold = &result.trace_x[0];
        let n_right = cold.iter().filter(|x| x[0] > 0.0).count();
        let share = n_right as f64 / cold.len() as f64;
        assert!(share > 0.1 && share < 0.9, "right-mode share was {share}");
    }
}
