//! Single-chain Metropolis samplers: fixed-kernel and adaptive.

use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};
use tracing::debug;

use crate::{
    errors::{FitError, FitResult},
    problem::Problem,
    result::McmcResult,
    sampling::chain::{chain_step, posterior_value, AdaptiveKernel, ChainState, FixedKernel},
    sampling::Sampler,
    types::Parameters,
};

// -------------------------------------------------------------------------
// Fixed-kernel Metropolis
// -------------------------------------------------------------------------

/// Random-walk Metropolis with isotropic Gaussian proposals of a fixed
/// standard deviation.
///
/// Simple and transparent; the adaptive variant is the better default
/// whenever the posterior's scales are unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct MetropolisSampler {
    proposal_std: f64,
    seed: Option<u64>,
}

impl Default for MetropolisSampler {
    fn default() -> Self {
        MetropolisSampler { proposal_std: 1.0, seed: None }
    }
}

impl MetropolisSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard deviation of the Gaussian proposal in every coordinate.
    pub fn with_proposal_std(mut self, proposal_std: f64) -> Self {
        self.proposal_std = proposal_std;
        self
    }

    /// Seed for the chain's random number generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> FitResult<()> {
        if !(self.proposal_std.is_finite() && self.proposal_std > 0.0) {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "proposal_std must be positive and finite, got {}",
                    self.proposal_std
                ),
            });
        }
        Ok(())
    }
}

impl Sampler for MetropolisSampler {
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
        let mut rng = seeded_rng(self.seed);
        let mut state = ChainState::new(x0_free.clone(), fval0, 1.0);
        let mut kernel = FixedKernel { std: self.proposal_std };
        for iteration in 0..n_samples {
            chain_step(problem, &lb_free, &ub_free, &mut state, &mut kernel, &mut rng, iteration)?;
        }
        debug!("Metropolis chain done, acceptance rate {:.3}", state.acceptance_rate());
        Ok(single_chain_result(state, clock.elapsed().as_secs_f64()))
    }

    fn name(&self) -> &str {
        "Metropolis"
    }
}

// -------------------------------------------------------------------------
// Adaptive Metropolis
// -------------------------------------------------------------------------

/// Random-walk Metropolis whose proposal covariance and scale adapt to
/// the chain history, targeting a fixed acceptance rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveMetropolisSampler {
    initial_std: f64,
    target_acceptance: f64,
    decay_constant: f64,
    reg_factor: f64,
    seed: Option<u64>,
}

impl Default for AdaptiveMetropolisSampler {
    fn default() -> Self {
        AdaptiveMetropolisSampler {
            initial_std: 1.0,
            target_acceptance: 0.234,
            decay_constant: 0.51,
            reg_factor: 1e-6,
            seed: None,
        }
    }
}

impl AdaptiveMetropolisSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proposal standard deviation before any adaptation.
    pub fn with_initial_std(mut self, initial_std: f64) -> Self {
        self.initial_std = initial_std;
        self
    }

    /// Acceptance rate the scale adaptation drifts toward.
    pub fn with_target_acceptance(mut self, target_acceptance: f64) -> Self {
        self.target_acceptance = target_acceptance;
        self
    }

    /// Exponent of the adaptation weight decay; must lie in (0.5, 1]
    /// for the adaptation to vanish fast enough.
    pub fn with_decay_constant(mut self, decay_constant: f64) -> Self {
        self.decay_constant = decay_constant;
        self
    }

    /// Ridge added to the adapted covariance before factorization.
    pub fn with_reg_factor(mut self, reg_factor: f64) -> Self {
        self.reg_factor = reg_factor;
        self
    }

    /// Seed for the chain's random number generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> FitResult<()> {
        if !(self.initial_std.is_finite() && self.initial_std > 0.0) {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "initial_std must be positive and finite, got {}",
                    self.initial_std
                ),
            });
        }
        if !(self.target_acceptance > 0.0 && self.target_acceptance < 1.0) {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "target_acceptance must lie in (0, 1), got {}",
                    self.target_acceptance
                ),
            });
        }
        if !(self.decay_constant > 0.5 && self.decay_constant <= 1.0) {
            return Err(FitError::InvalidOptions {
                reason: format!(
                    "decay_constant must lie in (0.5, 1], got {}",
                    self.decay_constant
                ),
            });
        }
        if !(self.reg_factor.is_finite() && self.reg_factor > 0.0) {
            return Err(FitError::InvalidOptions {
                reason: format!("reg_factor must be positive and finite, got {}", self.reg_factor),
            });
        }
        Ok(())
    }

    /// Kernel seeded at the chain start, for this sampler's settings.
    pub(crate) fn kernel(&self, x0_free: &Parameters) -> FitResult<AdaptiveKernel> {
        AdaptiveKernel::new(
            x0_free,
            self.initial_std,
            self.target_acceptance,
            self.decay_constant,
            self.reg_factor,
        )
    }
}

impl Sampler for AdaptiveMetropolisSampler {
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
        let mut rng = seeded_rng(self.seed);
        let mut state = ChainState::new(x0_free.clone(), fval0, 1.0);
        let mut kernel = self.kernel(x0_free)?;
        for iteration in 0..n_samples {
            chain_step(problem, &lb_free, &ub_free, &mut state, &mut kernel, &mut rng, iteration)?;
        }
        debug!(
            "Adaptive Metropolis chain done, acceptance rate {:.3}",
            state.acceptance_rate()
        );
        Ok(single_chain_result(state, clock.elapsed().as_secs_f64()))
    }

    fn name(&self) -> &str {
        "AdaptiveMetropolis"
    }
}

// -------------------------------------------------------------------------
// Shared helpers
// -------------------------------------------------------------------------

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn single_chain_result(state: ChainState, time: f64) -> McmcResult {
    let acceptance = state.acceptance_rate();
    McmcResult {
        trace_x: vec![state.trace_x],
        trace_neglogpost: vec![state.trace_fval],
        betas: vec![1.0],
        acceptance_rates: vec![acceptance],
        swap_rate: None,
        burn_in: None,
        effective_sample_size: None,
        time,
    }
}
