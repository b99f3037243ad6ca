//! Core traits and types for constrained design optimization.
//!
//! This crate provides the building blocks shared by the constrained
//! optimizers and the engineering models they size. A model is exposed as a
//! [`ConstrainedProblem`](problem::ConstrainedProblem): a pure map from a
//! design vector to an objective value and inequality constraints
//! normalized to `g(x) <= 0`. Optimizers consume problems through these
//! seams only.
//!
//! # Modules
//!
//! - [`bounds`]: Box bounds, projection and fixed variables
//! - [`callback`]: Iteration callbacks and history recording
//! - [`error`]: Error types for setup and evaluation
//! - [`gradient`]: Gradient estimation (finite differences)
//! - [`line_search`]: Merit functions and backtracking line search
//! - [`optimizer`]: Optimizer trait, stopping criteria and results
//! - [`problem`]: Constrained problem trait and evaluations
//! - [`types`]: Type aliases and numerical constants

pub mod bounds;
pub mod callback;
pub mod error;
pub mod gradient;
pub mod line_search;
pub mod optimizer;
pub mod problem;
pub mod types;

// Re-export commonly used items at the crate root
pub use error::{OptimizerError, OptimizerResult, ProblemError, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use trussopt_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bounds::Bounds;
    pub use crate::callback::{
        HistoryRecorder, IterationCallback, IterationInfo, IterationRecord, NoOpCallback,
    };
    pub use crate::error::{OptimizerError, OptimizerResult, ProblemError, Result};
    pub use crate::gradient::{DifferenceScheme, FiniteDifference, GradientEstimator, Linearization};
    pub use crate::line_search::{
        BacktrackingLineSearch, L1Merit, LineSearchParams, LineSearchResult,
    };
    pub use crate::optimizer::{
        ConstrainedOptimizer, OptimizationResult, StoppingCriterion, TerminationReason,
    };
    pub use crate::problem::{ConstrainedProblem, CountingProblem, Evaluation};
    pub use crate::types::{constants, DMatrix, DVector};
}
