//! optimize — local solvers and multistart orchestration.
//!
//! Purpose
//! -------
//! Provide the [`Optimizer`] trait with two argmin-backed local solvers
//! and the [`minimize`] entry point that runs many independent starts
//! on an [`Engine`](crate::engine::Engine) and collects them into a
//! sorted [`OptimizeResult`](crate::result::OptimizeResult).
//!
//! Key behaviors
//! -------------
//! - Box bounds are enforced by a smooth invertible coordinate
//!   transform, never by projection; solver iterates cannot leave the
//!   box.
//! - All start points are drawn up front from one seeded RNG, so a run
//!   produces the same starts whatever the engine.
//! - Failed starts are recorded as infinite-value placeholders by
//!   default (`allow_failed_starts`); disabling that makes the first
//!   failure abort the whole run.
//!
//! Module map
//! ----------
//! - `solvers` — the [`Optimizer`] trait, [`LbfgsOptimizer`],
//!   [`NelderMeadOptimizer`].
//! - `api` — the [`minimize`] multistart driver and its task type.
//! - `options` — [`OptimizeOptions`] for the run as a whole.
//! - `transforms` — the bounded/internal coordinate map.
//! - `adapter` / `builders` / `run` — argmin plumbing.
//!
//! Downstream usage
//! ----------------
//! - Profiling calls [`Optimizer::minimize`] directly for every path
//!   point; the multistart driver is the usual user entry.
pub(crate) mod adapter;
mod api;
pub(crate) mod builders;
mod options;
pub(crate) mod run;
mod solvers;
pub(crate) mod transforms;

pub use api::minimize;
pub use options::OptimizeOptions;
pub use solvers::{LbfgsOptimizer, LineSearcher, NelderMeadOptimizer, Optimizer};
pub use transforms::BoundTransform;
