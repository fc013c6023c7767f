//! engine — execution backends for batches of independent tasks.
//!
//! Purpose
//! -------
//! Run embarrassingly parallel workloads (one optimization per start,
//! one profile per parameter, one chain per temperature) either
//! sequentially or on a thread pool, behind one `execute` call.
//!
//! Key behaviors
//! -------------
//! - Output order always equals input order, whatever the engine; task
//!   results never depend on the backend.
//! - `MultiThread` uses rayon when the `parallel` feature is on and
//!   falls back to sequential execution (with a warning) otherwise.
//! - A requested thread count that cannot be honored falls back to the
//!   global pool instead of failing the batch.
//!
//! Invariants & assumptions
//! ------------------------
//! - Tasks are independent; nothing here synchronizes between them
//!   beyond the progress counter.
//!
//! Downstream usage
//! ----------------
//! - `optimize::minimize`, `profile::parameter_profile`, and the
//!   parallel-tempering sampler all submit task batches here.
mod progress;

pub use progress::{Progress, ProgressReporter};

#[cfg(feature = "parallel")]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::warn;

/// A unit of work executed by an [`Engine`].
pub trait Task: Send {
    type Output: Send;

    fn run(self) -> Self::Output;
}

/// Execution backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// In-order sequential execution on the calling thread.
    #[default]
    SingleCore,
    /// Rayon-backed execution; `None` uses the global pool size.
    MultiThread { n_threads: Option<usize> },
}

impl Engine {
    /// Run all tasks and return their outputs in input order.
    pub fn execute<T: Task>(&self, tasks: Vec<T>, progress: &ProgressReporter) -> Vec<T::Output> {
        progress.report(Progress::Started { total: tasks.len() });
        let outputs = match self {
            Engine::SingleCore => run_sequential(tasks, progress),
            Engine::MultiThread { n_threads } => run_parallel(tasks, progress, *n_threads),
        };
        progress.report(Progress::Finished);
        outputs
    }
}

fn run_sequential<T: Task>(tasks: Vec<T>, progress: &ProgressReporter) -> Vec<T::Output> {
    let total = tasks.len();
    tasks
        .into_iter()
        .enumerate()
        .map(|(i, task)| {
            let output = task.run();
            progress.report(Progress::TaskFinished { finished: i + 1, total });
            output
        })
        .collect()
}

#[cfg(feature = "parallel")]
fn run_parallel<T: Task>(
    tasks: Vec<T>, progress: &ProgressReporter, n_threads: Option<usize>,
) -> Vec<T::Output> {
    match n_threads {
        None => par_map(tasks, progress),
        Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
            Ok(pool) => pool.install(|| par_map(tasks, progress)),
            Err(err) => {
                warn!("Could not build a {}-thread pool ({}), using the global pool", n, err);
                par_map(tasks, progress)
            }
        },
    }
}

#[cfg(feature = "parallel")]
fn par_map<T: Task>(tasks: Vec<T>, progress: &ProgressReporter) -> Vec<T::Output> {
    let total = tasks.len();
    let finished = AtomicUsize::new(0);
    tasks
        .into_par_iter()
        .map(|task| {
            let output = task.run();
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            progress.report(Progress::TaskFinished { finished: done, total });
            output
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn run_parallel<T: Task>(
    tasks: Vec<T>, progress: &ProgressReporter, _n_threads: Option<usize>,
) -> Vec<T::Output> {
    warn!("Thread engine requested without the `parallel` feature, running sequentially");
    run_sequential(tasks, progress)
}
