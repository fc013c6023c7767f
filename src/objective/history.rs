//! objective::history — evaluation counting and trace recording.
//!
//! Purpose
//! -------
//! Wrap an inner [`Objective`] so every delegated call is counted and,
//! optionally, every successful value evaluation is recorded as an
//! `(x, value)` pair. Optimizer result summaries and convergence plots
//! are built from these records.
//!
//! Key behaviors
//! -------------
//! - Counts are incremented exactly once per delegated call, whether or
//!   not the inner call succeeds.
//! - The trace stores only successful value evaluations, in call order.
//! - Thread-safe: the wrapper is shared across concurrently running
//!   starts, so the history sits behind a mutex. The lock is never held
//!   across the inner evaluation.
//!
//! Downstream usage
//! ----------------
//! - `optimize::minimize` reads a snapshot via [`TracedObjective::history`]
//!   after each start when callers wire a traced objective into the
//!   problem.
use std::sync::Mutex;

use crate::{
    errors::FitResult,
    objective::Objective,
    types::{Gradient, HessianMatrix, JacobianMatrix, Parameters, Residuals},
};

/// One recorded value evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub x: Parameters,
    pub value: f64,
}

/// Call counts plus the optional value trace.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    pub n_value: u64,
    pub n_grad: u64,
    pub n_hess: u64,
    pub n_residuals: u64,
    pub n_sres: u64,
    pub trace: Vec<HistoryEntry>,
}

impl MemoryHistory {
    /// Best (lowest) recorded value so far, if the trace is on and
    /// non-empty.
    pub fn best_value(&self) -> Option<f64> {
        self.trace.iter().map(|e| e.value).fold(None, |best, v| match best {
            Some(b) if b <= v => Some(b),
            _ => Some(v),
        })
    }
}

/// Objective wrapper that maintains a [`MemoryHistory`].
pub struct TracedObjective<O: Objective> {
    inner: O,
    record_trace: bool,
    history: Mutex<MemoryHistory>,
}

impl<O: Objective> TracedObjective<O> {
    /// Wrap `inner` with counting only; the value trace stays off.
    pub fn new(inner: O) -> Self {
        Self { inner, record_trace: false, history: Mutex::new(MemoryHistory::default()) }
    }

    /// Enable or disable `(x, value)` trace recording.
    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Snapshot of the current counts and trace.
    pub fn history(&self) -> MemoryHistory {
        self.lock().clone()
    }

    /// Clear counts and trace, keeping the recording flag.
    pub fn reset(&self) {
        *self.lock() = MemoryHistory::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryHistory> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<O: Objective> Objective for TracedObjective<O> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn value(&self, x: &Parameters) -> FitResult<f64> {
        self.lock().n_value += 1;
        let result = self.inner.value(x);
        if self.record_trace {
            if let Ok(value) = result {
                self.lock().trace.push(HistoryEntry { x: x.clone(), value });
            }
        }
        result
    }

    fn grad(&self, x: &Parameters) -> FitResult<Gradient> {
        self.lock().n_grad += 1;
        self.inner.grad(x)
    }

    fn hess(&self, x: &Parameters) -> FitResult<HessianMatrix> {
        self.lock().n_hess += 1;
        self.inner.hess(x)
    }

    fn residuals(&self, x: &Parameters) -> FitResult<Residuals> {
        self.lock().n_residuals += 1;
        self.inner.residuals(x)
    }

    fn sres(&self, x: &Parameters) -> FitResult<JacobianMatrix> {
        self.lock().n_sres += 1;
        self.inner.sres(x)
    }

    fn provides_grad(&self) -> bool {
        self.inner.provides_grad()
    }

    fn provides_hess(&self) -> bool {
        self.inner.provides_hess()
    }

    fn provides_residuals(&self) -> bool {
        self.inner.provides_residuals()
    }

    fn provides_sres(&self) -> bool {
        self.inner.provides_sres()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
