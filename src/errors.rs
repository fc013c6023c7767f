use argmin::core::{ArgminError, Error};

/// Crate-wide result alias for estimation operations.
pub type FitResult<T> = Result<T, FitError>;

#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    // ---- Objective ----
    /// The objective does not provide the requested derivative quantity.
    SensitivityUnavailable {
        what: &'static str,
    },

    /// Parameter vector length does not match the objective dimension.
    ParameterLengthMismatch {
        expected: usize,
        actual: usize,
    },

    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Hessian matrix dimensions do not match parameter dimensions.
    HessianDimMismatch {
        expected: usize,
        found: (usize, usize),
    },

    /// An aggregated objective needs at least one component.
    EmptyAggregate,

    /// Prior specification is inconsistent.
    InvalidPrior {
        index: usize,
        reason: &'static str,
    },

    // ---- Problem ----
    /// Lower/upper bound vectors must have the objective dimension.
    BoundsLengthMismatch {
        expected: usize,
        actual: usize,
    },

    /// Lower bound exceeds upper bound at a coordinate.
    InvalidBounds {
        index: usize,
        lower: f64,
        upper: f64,
    },

    /// Parameter index outside the full dimension.
    IndexOutOfRange {
        index: usize,
        dim: usize,
    },

    /// Fixed parameter values need to be finite.
    NonFiniteFixedValue {
        index: usize,
        value: f64,
    },

    // ---- Startpoints ----
    /// Startpoint sampling requires finite bounds.
    NonFiniteBounds {
        index: usize,
    },

    /// Resampling could not produce enough finite start points.
    StartpointsExhausted {
        requested: usize,
        tried: usize,
    },

    // ---- Options ----
    /// Gradient tolerance needs to be positive and finite.
    InvalidTolGrad {
        tol: f64,
        reason: &'static str,
    },

    /// Cost change tolerance needs to be positive and finite.
    InvalidTolCost {
        tol: f64,
        reason: &'static str,
    },

    /// Maximum iterations needs to be positive.
    InvalidMaxIter {
        max_iter: u64,
        reason: &'static str,
    },

    /// L-BFGS memory needs to be at least 1.
    InvalidLbfgsMem {
        mem: usize,
        reason: &'static str,
    },

    /// Catch-all for invalid option combinations.
    InvalidOptions {
        reason: String,
    },

    // ---- Optimizer outcome ----
    /// The solver terminated without a parameter estimate.
    MissingSolution,

    /// Estimated parameters must be finite.
    InvalidSolution {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    /// The objective failed inside the solver loop.
    ObjectiveFailure {
        text: String,
    },

    // ---- Profiles ----
    /// Profiling requires a non-empty optimization result.
    EmptyOptimizeResult,

    /// Profile list index outside the stored lists.
    ProfileListMissing {
        list_index: usize,
        n_lists: usize,
    },

    /// No point on the ratio path reaches the requested threshold.
    RatioThresholdNotReached {
        threshold: f64,
    },

    // ---- Sampling ----
    /// The chain start point must have a finite posterior value.
    NonFiniteStart {
        value: f64,
    },

    /// Chain diagnostics require a non-empty sampling result.
    EmptySampleResult,

    /// Proposal covariance could not be factorized.
    CovarianceFactorization {
        reason: &'static str,
    },

    // ---- Linear algebra ----
    /// Least-squares solve failed (rank-deficient or non-finite input).
    LeastSquaresFailed {
        context: &'static str,
    },

    /// A required variance is zero or non-finite.
    DegenerateVariance {
        index: usize,
        value: f64,
    },

    // ---- Argmin ----
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter {
        text: String,
    },
    /// Wrapper for argmin::NotImplemented
    NotImplemented {
        text: String,
    },
    /// Wrapper for argmin::NotInitialized
    NotInitialized {
        text: String,
    },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated {
        text: String,
    },
    /// Wrapper for argmin::CheckPointNotFound
    CheckPointNotFound {
        text: String,
    },
    /// Wrapper for argmin::PotentialBug
    PotentialBug {
        text: String,
    },
    /// Wrapper for argmin::ImpossibleError
    ImpossibleError {
        text: String,
    },
    /// Wrapper for other argmin::Error types
    BackendError {
        text: String,
    },

    // ---- Store ----
    /// Filesystem failure while persisting or loading results.
    Io {
        text: String,
    },

    /// Serialization or deserialization failure.
    Serialization {
        text: String,
    },

    /// Refusing to overwrite an existing result file.
    FileExists {
        path: String,
    },

    // ---- Fallback ----
    UnknownError,
}

impl std::error::Error for FitError {}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Objective ----
            FitError::SensitivityUnavailable { what } => {
                write!(f, "Objective does not provide {what}")
            }
            FitError::ParameterLengthMismatch { expected, actual } => {
                write!(f, "Parameter length mismatch: expected {expected}, actual {actual}")
            }
            FitError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            FitError::HessianDimMismatch { expected, found } => {
                write!(
                    f,
                    "Hessian dimension mismatch: expected ({expected}, {expected}), found {found:?}"
                )
            }
            FitError::EmptyAggregate => {
                write!(f, "Aggregated objective needs at least one component")
            }
            FitError::InvalidPrior { index, reason } => {
                write!(f, "Invalid prior for parameter {index}: {reason}")
            }

            // ---- Problem ----
            FitError::BoundsLengthMismatch { expected, actual } => {
                write!(f, "Bounds length mismatch: expected {expected}, actual {actual}")
            }
            FitError::InvalidBounds { index, lower, upper } => {
                write!(f, "Invalid bounds at index {index}: lower {lower} exceeds upper {upper}")
            }
            FitError::IndexOutOfRange { index, dim } => {
                write!(f, "Parameter index {index} outside dimension {dim}")
            }
            FitError::NonFiniteFixedValue { index, value } => {
                write!(f, "Fixed value at index {index} must be finite, got {value}")
            }

            // ---- Startpoints ----
            FitError::NonFiniteBounds { index } => {
                write!(f, "Startpoint sampling requires finite bounds, index {index} is not")
            }
            FitError::StartpointsExhausted { requested, tried } => {
                write!(
                    f,
                    "Could not find {requested} finite start points after {tried} draws"
                )
            }

            // ---- Options ----
            FitError::InvalidTolGrad { tol, reason } => {
                write!(f, "Invalid gradient tolerance {tol}: {reason}")
            }
            FitError::InvalidTolCost { tol, reason } => {
                write!(f, "Invalid cost function change tolerance {tol}: {reason}")
            }
            FitError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            FitError::InvalidLbfgsMem { mem, reason } => {
                write!(f, "Invalid L-BFGS memory {mem}: {reason}")
            }
            FitError::InvalidOptions { reason } => {
                write!(f, "Invalid options: {reason}")
            }

            // ---- Optimizer outcome ----
            FitError::MissingSolution => {
                write!(f, "Solver terminated without a parameter estimate")
            }
            FitError::InvalidSolution { index, value, reason } => {
                write!(f, "Invalid estimated parameter at index {index}: {value}: {reason}")
            }
            FitError::ObjectiveFailure { text } => {
                write!(f, "Objective evaluation failed: {text}")
            }

            // ---- Profiles ----
            FitError::EmptyOptimizeResult => {
                write!(f, "Profiling requires a non-empty optimization result")
            }
            FitError::ProfileListMissing { list_index, n_lists } => {
                write!(f, "Profile list {list_index} does not exist ({n_lists} lists stored)")
            }
            FitError::RatioThresholdNotReached { threshold } => {
                write!(f, "No point on the ratio path reaches threshold {threshold}")
            }

            // ---- Sampling ----
            FitError::NonFiniteStart { value } => {
                write!(f, "Chain start point has non-finite posterior value: {value}")
            }
            FitError::EmptySampleResult => {
                write!(f, "Chain diagnostics require a non-empty sampling result")
            }
            FitError::CovarianceFactorization { reason } => {
                write!(f, "Proposal covariance factorization failed: {reason}")
            }

            // ---- Linear algebra ----
            FitError::LeastSquaresFailed { context } => {
                write!(f, "Least-squares solve failed: {context}")
            }
            FitError::DegenerateVariance { index, value } => {
                write!(f, "Degenerate variance for parameter {index}: {value}")
            }

            // ---- Argmin ----
            FitError::InvalidParameter { text } => {
                write!(f, "Invalid parameter: {text}")
            }
            FitError::NotImplemented { text } => {
                write!(f, "Not implemented: {text}")
            }
            FitError::NotInitialized { text } => {
                write!(f, "Not initialized: {text}")
            }
            FitError::ConditionViolated { text } => {
                write!(f, "Condition violated: {text}")
            }
            FitError::CheckPointNotFound { text } => {
                write!(f, "Checkpoint not found: {text}")
            }
            FitError::PotentialBug { text } => {
                write!(f, "Potential bug: {text}")
            }
            FitError::ImpossibleError { text } => {
                write!(f, "Impossible error: {text}")
            }
            FitError::BackendError { text } => {
                write!(f, "Backend error: {text}")
            }

            // ---- Store ----
            FitError::Io { text } => {
                write!(f, "I/O error: {text}")
            }
            FitError::Serialization { text } => {
                write!(f, "Serialization error: {text}")
            }
            FitError::FileExists { path } => {
                write!(f, "File already exists (pass overwrite to replace): {path}")
            }

            // ---- Fallback ----
            FitError::UnknownError => {
                write!(f, "Unknown error")
            }
        }
    }
}

impl From<Error> for FitError {
    fn from(original_err: Error) -> Self {
        // Errors raised by our own adapter travel through argmin as boxed
        // values; recover them before falling back on argmin's variants.
        match original_err.downcast::<FitError>() {
            Ok(fit_err) => fit_err,
            Err(other) => match other.downcast::<ArgminError>() {
                Ok(argmin_err) => match argmin_err {
                    ArgminError::InvalidParameter { text } => FitError::InvalidParameter { text },
                    ArgminError::NotImplemented { text } => FitError::NotImplemented { text },
                    ArgminError::NotInitialized { text } => FitError::NotInitialized { text },
                    ArgminError::ConditionViolated { text } => FitError::ConditionViolated { text },
                    ArgminError::CheckpointNotFound { text } => {
                        FitError::CheckPointNotFound { text }
                    }
                    ArgminError::PotentialBug { text } => FitError::PotentialBug { text },
                    ArgminError::ImpossibleError { text } => FitError::ImpossibleError { text },
                    _ => FitError::UnknownError,
                },
                Err(err) => FitError::BackendError { text: err.to_string() },
            },
        }
    }
}

impl From<std::io::Error> for FitError {
    fn from(err: std::io::Error) -> Self {
        FitError::Io { text: err.to_string() }
    }
}

impl From<serde_json::Error> for FitError {
    fn from(err: serde_json::Error) -> Self {
        FitError::Serialization { text: err.to_string() }
    }
}
