//! Multistart-level options, separate from per-solver settings.

/// Options governing a multistart run as a whole.
///
/// Per-solver settings (tolerances, iteration caps, memory) live on the
/// optimizer structs in [`crate::optimize::solvers`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    /// Keep going when individual starts fail, recording an infinite-value
    /// placeholder result for each failure. When `false`, the first failed
    /// start aborts the whole run.
    pub allow_failed_starts: bool,
    /// Seed for startpoint sampling. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions { allow_failed_starts: true, seed: None }
    }
}

impl OptimizeOptions {
    /// Fresh options with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the startpoint seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the failed-start policy.
    pub fn with_allow_failed_starts(mut self, allow: bool) -> Self {
        self.allow_failed_starts = allow;
        self
    }
}
