//! dynafit — multi-start parameter estimation for dynamical-systems models.
//!
//! Purpose
//! -------
//! Provide one problem abstraction (a boxed objective over bounded
//! parameters, some possibly fixed) and the estimation tasks that run
//! on top of it: multi-start local optimization, profile-likelihood
//! computation, MCMC sampling of the posterior, and information-
//! criterion model comparison, with JSON persistence for everything a
//! run produces.
//!
//! Key behaviors
//! -------------
//! - [`objective`] defines the [`Objective`](objective::Objective)
//!   trait (value, optional gradient/Hessian/residuals) plus closure,
//!   finite-difference, aggregate, prior, and history wrappers.
//! - [`problem`] binds an objective to bounds, names, fixed parameters,
//!   and full/free vector mapping.
//! - [`optimize`] runs multi-start bound-constrained minimization on
//!   argmin solvers (L-BFGS via smooth bound transforms, Nelder-Mead).
//! - [`profile`] walks per-parameter likelihood profiles by repeated
//!   reoptimization, with a Hessian-based Gaussian shortcut.
//! - [`sampling`] draws posterior samples (Metropolis, adaptive
//!   Metropolis, parallel tempering) and diagnoses the chains.
//! - [`select`] ranks fitted candidate models by AIC/AICc/BIC.
//! - [`engine`] dispatches independent task batches sequentially or
//!   across threads; [`store`] persists result bundles as JSON.
//!
//! Conventions
//! -----------
//! - Objectives are negative log-likelihoods (or negative
//!   log-posteriors); every task minimizes.
//! - Vectors are full-space at the API surface; solvers and samplers
//!   walk the free subspace internally.
//! - Fallible operations return [`FitResult`](errors::FitResult) and
//!   propagate [`FitError`](errors::FitError).
//!
//! Downstream usage
//! ----------------
//! - The typical pipeline: build a [`Problem`](problem::Problem), call
//!   [`optimize::minimize`], then [`profile::parameter_profile`] and/or
//!   [`sampling::sample`] on the returned
//!   [`EstimationResult`](result::EstimationResult), and persist with
//!   [`store::write_result`].
//!
//! Testing notes
//! -------------
//! - Every module carries unit tests against closed-form targets; the
//!   `tests/` directory exercises the full pipeline end to end.

pub mod engine;
pub mod errors;
pub mod objective;
pub mod optimize;
pub mod problem;
pub mod profile;
pub mod result;
pub mod sampling;
pub mod select;
pub mod startpoint;
pub mod store;
pub mod types;

pub use errors::{FitError, FitResult};
pub use problem::Problem;
pub use result::EstimationResult;
