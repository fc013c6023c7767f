//! Multistart optimization result containers.
//!
//! One [`OptimizerResult`] per start, collected into an
//! [`OptimizeResult`] that keeps its entries sorted ascending by
//! objective value so index 0 is always the incumbent best.

use serde::{Deserialize, Serialize};

use crate::types::{FnEvalMap, Gradient, HessianMatrix, Parameters};

// -------------------------------------------------------------------------
// Single start
// -------------------------------------------------------------------------

/// Outcome of one local optimization.
///
/// Vectors are full-space: fixed parameters carry their fixed values in
/// `x0`/`x`, and `grad` holds `NaN` at fixed indices since the objective
/// was never differentiated there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerResult {
    /// Start index within the multistart run.
    pub id: usize,
    /// Full-space start point.
    pub x0: Parameters,
    /// Full-space best point found.
    pub x: Parameters,
    /// Objective value at `x`; infinite for failed starts.
    #[serde(with = "crate::result::floats::float")]
    pub fval: f64,
    /// Full-space objective gradient at `x`, when the objective provides one.
    #[serde(with = "crate::result::floats::opt_grad")]
    pub grad: Option<Gradient>,
    /// Full-space objective Hessian at `x`, when the objective provides one.
    pub hess: Option<HessianMatrix>,
    /// Solver evaluation counters, keyed as the backend reports them.
    pub fn_evals: FnEvalMap,
    /// Iterations the solver performed.
    pub n_iterations: u64,
    /// Whether the solver terminated by its own convergence criterion.
    pub converged: bool,
    /// Human-readable termination status.
    pub status: String,
    /// Wall-clock seconds spent on this start.
    pub time: f64,
}

impl OptimizerResult {
    /// Number of objective value evaluations the solver counted.
    pub fn n_fval(&self) -> u64 {
        self.fn_evals.get("cost_count").copied().unwrap_or(0)
    }

    /// Number of gradient evaluations the solver counted.
    pub fn n_grad(&self) -> u64 {
        self.fn_evals.get("gradient_count").copied().unwrap_or(0)
    }
}

// -------------------------------------------------------------------------
// Multistart collection
// -------------------------------------------------------------------------

/// All starts of a multistart run, sorted ascending by `fval`.
///
/// `NaN` values sort last under `total_cmp`, so failed starts never
/// shadow a finite optimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptimizeResult {
    list: Vec<OptimizerResult>,
}

impl OptimizeResult {
    /// Collect and sort start results.
    pub fn new(mut list: Vec<OptimizerResult>) -> Self {
        list.sort_by(|a, b| a.fval.total_cmp(&b.fval));
        OptimizeResult { list }
    }

    /// Insert one result, keeping the ascending order.
    pub fn push(&mut self, result: OptimizerResult) {
        let pos = self.list.partition_point(|r| r.fval.total_cmp(&result.fval).is_le());
        self.list.insert(pos, result);
    }

    /// Best start, `None` for an empty run.
    pub fn best(&self) -> Option<&OptimizerResult> {
        self.list.first()
    }

    /// All starts, best first.
    pub fn list(&self) -> &[OptimizerResult] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Objective values in sorted order (the waterfall vector).
    pub fn fvals(&self) -> Vec<f64> {
        self.list.iter().map(|r| r.fval).collect()
    }

    /// Best points in sorted order.
    pub fn xs(&self) -> Vec<&Parameters> {
        self.list.iter().map(|r| &r.x).collect()
    }

    /// Number of starts whose solver reported convergence.
    pub fn n_converged(&self) -> usize {
        self.list.iter().filter(|r| r.converged).count()
    }

    /// Short multi-line report of the run.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Optimization run: {} starts, {} converged\n",
            self.len(),
            self.n_converged()
        );
        if let Some(best) = self.best() {
            out.push_str(&format!(
                "  best fval  {:+.6e} (start {}, {})\n",
                best.fval, best.id, best.status
            ));
        }
        if let Some(worst) = self.list.last() {
            out.push_str(&format!("  worst fval {:+.6e} (start {})\n", worst.fval, worst.id));
        }
        out
    }
}
