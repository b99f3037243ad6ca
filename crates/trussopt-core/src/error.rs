//! Error types for problem setup and optimization.
//!
//! Only setup problems are fatal. Degenerate evaluations met while the
//! optimizer is iterating are recovered locally and show up as a
//! termination reason instead of an error.

use thiserror::Error;

/// Errors raised while defining or evaluating a constrained problem.
#[derive(Debug, Clone, Error)]
pub enum ProblemError {
    /// A fixed model parameter is outside its admissible range.
    #[error("Invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter
        name: String,
        /// Value that was rejected
        value: f64,
        /// Description of the violated requirement
        reason: String,
    },

    /// A design-variable bound pair is malformed.
    #[error("Invalid bounds for variable {index}: [{lower}, {upper}]")]
    InvalidBounds {
        /// Index of the design variable
        index: usize,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// Vector dimensions do not agree.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// The model produced NaN or infinite outputs.
    #[error("Degenerate evaluation: {reason}")]
    DegenerateEvaluation {
        /// Description of the failed evaluation
        reason: String,
    },
}

impl ProblemError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter<S1, S2>(name: S1, value: f64, reason: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::InvalidParameter {
            name: name.into(),
            value,
            reason: reason.into(),
        }
    }

    /// Create an InvalidBounds error.
    pub fn invalid_bounds(index: usize, lower: f64, upper: f64) -> Self {
        Self::InvalidBounds {
            index,
            lower,
            upper,
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a DegenerateEvaluation error with a custom reason.
    pub fn degenerate_evaluation<S: Into<String>>(reason: S) -> Self {
        Self::DegenerateEvaluation {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur when setting up or starting an optimization run.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Invalid optimizer configuration.
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// The starting point could not be evaluated.
    ///
    /// Trial points produced during iteration are rejected silently; only
    /// the initial point has no accepted iterate to fall back on.
    #[error("Starting point is degenerate: {reason}")]
    DegenerateStart {
        /// Description of the failed evaluation
        reason: String,
    },

    /// Propagated problem error.
    #[error("Problem definition failed: {0}")]
    Problem(#[from] ProblemError),
}

impl OptimizerError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create a DegenerateStart error.
    pub fn degenerate_start<S: Into<String>>(reason: S) -> Self {
        Self::DegenerateStart {
            reason: reason.into(),
        }
    }
}

/// Result type alias for operations that can produce ProblemError.
pub type Result<T> = std::result::Result<T, ProblemError>;

/// Result type alias for optimizer operations.
pub type OptimizerResult<T> = std::result::Result<T, OptimizerError>;
