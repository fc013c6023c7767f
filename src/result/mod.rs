//! Purpose
//! -------
//! Result containers for every estimation task. Each task module fills
//! one container type; this module bundles them into an
//! [`EstimationResult`] that the store serializes as a unit.
//!
//! Key behaviors
//! -------------
//! - [`OptimizerResult`]/[`OptimizeResult`] hold multistart outcomes,
//!   sorted ascending by objective value.
//! - [`ProfilerResult`]/[`ProfileResult`] hold per-parameter likelihood
//!   profiles grouped into lists.
//! - [`McmcResult`] holds posterior chains and their diagnostics.
//! - [`ProblemSummary`] captures the problem definition without the
//!   objective callable, so results stay self-describing on disk.
//!
//! Invariants & assumptions
//! ------------------------
//! - All containers are plain data: no callables, no problem handles.
//! - Everything derives `Serialize`/`Deserialize`. Fields that can hold
//!   non-finite floats (failed-start values, fixed-coordinate gradient
//!   slots, profile paths) round-trip them losslessly through JSON via
//!   the `floats` helpers instead of degrading to `null`.
//!
//! Conventions
//! -----------
//! - Optimize results store full-space vectors; sampling traces store
//!   free-space vectors (the space the sampler walks in).
//!
//! Downstream usage
//! ----------------
//! - Filled by `optimize::minimize`, `profile::parameter_profile`, and
//!   `sampling::sample`; persisted by `store`.
//!
//! Testing notes
//! -------------
//! - Container behavior (sorting, lookups) is tested here; end-to-end
//!   filling is covered by the task modules and integration tests.

pub(crate) mod floats;
pub mod optimize;
pub mod profile;
pub mod sample;

pub use optimize::{OptimizeResult, OptimizerResult};
pub use profile::{ProfileResult, ProfilerResult};
pub use sample::McmcResult;

use serde::{Deserialize, Serialize};

use crate::{
    problem::Problem,
    types::Parameters,
};

// -------------------------------------------------------------------------
// Problem summary
// -------------------------------------------------------------------------

/// Serializable snapshot of a problem definition.
///
/// The objective itself cannot be persisted; its reported name is kept
/// so stored results remain attributable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSummary {
    pub dim_full: usize,
    pub dim: usize,
    pub lb: Parameters,
    pub ub: Parameters,
    pub x_names: Vec<String>,
    pub x_fixed_indices: Vec<usize>,
    pub x_fixed_vals: Vec<f64>,
    pub objective_name: String,
}

impl ProblemSummary {
    /// Snapshot the given problem.
    pub fn from_problem(problem: &Problem) -> Self {
        ProblemSummary {
            dim_full: problem.dim_full(),
            dim: problem.dim(),
            lb: problem.lb().clone(),
            ub: problem.ub().clone(),
            x_names: problem.x_names().to_vec(),
            x_fixed_indices: problem.x_fixed_indices().to_vec(),
            x_fixed_vals: problem.x_fixed_vals().to_vec(),
            objective_name: problem.objective().name().to_string(),
        }
    }
}

// -------------------------------------------------------------------------
// Top-level bundle
// -------------------------------------------------------------------------

/// Everything produced for one estimation problem.
///
/// Task sections are optional so a bundle can be stored after any subset
/// of optimization, profiling, and sampling has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub problem: ProblemSummary,
    pub optimize: Option<OptimizeResult>,
    pub profile: Option<ProfileResult>,
    pub sample: Option<McmcResult>,
}

impl EstimationResult {
    /// Empty bundle for the given problem.
    pub fn new(problem: &Problem) -> Self {
        EstimationResult {
            problem: ProblemSummary::from_problem(problem),
            optimize: None,
            profile: None,
            sample: None,
        }
    }

    /// Attach a multistart optimization section.
    pub fn with_optimize(mut self, optimize: OptimizeResult) -> Self {
        self.optimize = Some(optimize);
        self
    }

    /// Attach a profiling section.
    pub fn with_profile(mut self, profile: ProfileResult) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Attach a sampling section.
    pub fn with_sample(mut self, sample: McmcResult) -> Self {
        self.sample = Some(sample);
        self
    }
}
