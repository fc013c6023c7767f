//! engine::progress — optional progress reporting for task batches.
//!
//! Purpose
//! -------
//! Let callers observe long multi-start or profile runs without coupling
//! the engines to any particular UI. The default reporter is silent; a
//! logging reporter is provided for command-line use.
use tracing::info;

/// Progress events emitted by an engine while executing a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Started { total: usize },
    /// `finished` counts completed tasks; under a thread engine the
    /// events arrive in completion order, not input order.
    TaskFinished { finished: usize, total: usize },
    Finished,
}

/// Callback holder passed to [`Engine::execute`](super::Engine::execute).
#[derive(Default)]
pub struct ProgressReporter {
    callback: Option<Box<dyn Fn(Progress) + Send + Sync>>,
}

impl ProgressReporter {
    /// Reporter that swallows all events.
    pub fn silent() -> Self {
        Self { callback: None }
    }

    /// Reporter invoking `callback` for every event.
    pub fn new(callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        Self { callback: Some(Box::new(callback)) }
    }

    /// Reporter that logs events at info level.
    pub fn log() -> Self {
        Self::new(|event| match event {
            Progress::Started { total } => info!("Running {} tasks", total),
            Progress::TaskFinished { finished, total } => {
                info!("Finished task {}/{}", finished, total)
            }
            Progress::Finished => info!("All tasks finished"),
        })
    }

    pub fn report(&self, event: Progress) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").field("silent", &self.callback.is_none()).finish()
    }
}
