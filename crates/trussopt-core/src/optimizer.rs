//! Core optimizer traits and types for constrained optimization.
//!
//! This module provides the abstractions shared by every constrained
//! optimizer in the workspace:
//!
//! - **ConstrainedOptimizer**: the interface `minimize f(x) s.t. g(x) <= 0,
//!   lower <= x <= upper`
//! - **StoppingCriterion**: tolerances and budgets that end a run
//! - **TerminationReason**: why a run ended
//! - **OptimizationResult**: final point, responses and diagnostics
//!
//! # Termination
//!
//! A run moves from initialization through iteration into exactly one
//! terminal reason and never leaves it. Only `Converged` certifies a
//! KKT-stationary point; every other reason hands back the best iterate seen,
//! which may be infeasible. Callers must check [`OptimizationResult::feasible`]
//! before trusting the design.
//!
//! # Example
//!
//! ```rust,ignore
//! let criterion = StoppingCriterion::new()
//!     .with_max_iterations(200)
//!     .with_constraint_tolerance(1e-8);
//!
//! let result = optimizer.optimize(&problem, &bounds, &x0)?;
//! if result.feasible {
//!     println!("f* = {}", result.evaluation.objective);
//! }
//! ```

use crate::{
    bounds::Bounds,
    callback::{IterationCallback, NoOpCallback},
    error::{OptimizerError, OptimizerResult},
    problem::{ConstrainedProblem, Evaluation},
    types::{constants, DVector},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::time::Duration;

/// Reasons for optimization algorithm termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TerminationReason {
    /// Step length and constraint violation both below tolerance
    Converged,
    /// Maximum iteration count exhausted without convergence
    IterationLimit,
    /// Line search or feasibility restoration failed repeatedly
    Stalled,
    /// Wall-clock limit exceeded between iterations
    TimeLimit,
    /// Iteration callback requested early termination
    CallbackRequest,
}

impl TerminationReason {
    /// Returns true if the run reached a stationary point.
    pub fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Converged => "converged",
            Self::IterationLimit => "iteration limit",
            Self::Stalled => "stalled",
            Self::TimeLimit => "time limit",
            Self::CallbackRequest => "stopped by callback",
        };
        f.write_str(label)
    }
}

/// Stopping criteria for constrained optimization.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoppingCriterion {
    /// Maximum number of major iterations
    pub max_iterations: usize,

    /// Maximum wall-clock time, checked between iterations
    pub max_time: Option<Duration>,

    /// Tolerance on the step: `|p_j| <= tol * (1 + |x_j|)` for every j
    pub step_tolerance: f64,

    /// Largest constraint value still considered feasible
    pub constraint_tolerance: f64,

    /// Consecutive failed line searches (or restorations) before stalling
    pub max_line_search_failures: usize,
}

impl Default for StoppingCriterion {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_time: None,
            step_tolerance: constants::STEP_TOLERANCE,
            constraint_tolerance: constants::CONSTRAINT_TOLERANCE,
            max_line_search_failures: 3,
        }
    }
}

impl StoppingCriterion {
    /// Creates a new stopping criterion with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Sets the maximum optimization time.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Sets the step tolerance.
    pub fn with_step_tolerance(mut self, tol: f64) -> Self {
        self.step_tolerance = tol;
        self
    }

    /// Sets the constraint violation tolerance.
    pub fn with_constraint_tolerance(mut self, tol: f64) -> Self {
        self.constraint_tolerance = tol;
        self
    }

    /// Sets the number of consecutive line search failures tolerated.
    pub fn with_max_line_search_failures(mut self, failures: usize) -> Self {
        self.max_line_search_failures = failures;
        self
    }

    /// Validates the criterion.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.max_iterations == 0 {
            return Err(OptimizerError::invalid_configuration(
                "must allow at least one iteration",
                "max_iterations",
                "0",
            ));
        }

        if !(self.step_tolerance > 0.0 && self.step_tolerance.is_finite()) {
            return Err(OptimizerError::invalid_configuration(
                "must be positive and finite",
                "step_tolerance",
                self.step_tolerance.to_string(),
            ));
        }

        if !(self.constraint_tolerance >= 0.0 && self.constraint_tolerance.is_finite()) {
            return Err(OptimizerError::invalid_configuration(
                "must be non-negative and finite",
                "constraint_tolerance",
                self.constraint_tolerance.to_string(),
            ));
        }

        if self.max_line_search_failures == 0 {
            return Err(OptimizerError::invalid_configuration(
                "must tolerate at least one failure",
                "max_line_search_failures",
                "0",
            ));
        }

        Ok(())
    }

    /// Returns true if `step` is small relative to `point`.
    pub fn step_is_small(&self, step: &DVector, point: &DVector) -> bool {
        step.iter()
            .zip(point.iter())
            .all(|(&p, &x)| p.abs() <= self.step_tolerance * (1.0 + x.abs()))
    }
}

/// Result of a constrained optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// The returned design point, inside the bounds
    pub point: DVector,

    /// Objective and constraint values at `point`
    pub evaluation: Evaluation,

    /// Lagrange multiplier estimates for the constraints
    pub multipliers: DVector,

    /// Largest constraint violation at `point`
    pub max_violation: f64,

    /// True if `max_violation` is within the constraint tolerance
    pub feasible: bool,

    /// Number of major iterations performed
    pub iterations: usize,

    /// Number of problem evaluations, including finite differences
    pub function_evaluations: usize,

    /// Total optimization time
    pub duration: Duration,

    /// Reason for termination
    pub termination_reason: TerminationReason,

    /// Whether the optimization converged to a stationary point
    pub converged: bool,
}

impl OptimizationResult {
    /// Creates a new optimization result.
    ///
    /// Feasibility is judged against `constraint_tolerance`.
    pub fn new(
        point: DVector,
        evaluation: Evaluation,
        iterations: usize,
        duration: Duration,
        termination_reason: TerminationReason,
        constraint_tolerance: f64,
    ) -> Self {
        let max_violation = if evaluation.is_finite() {
            evaluation.max_violation()
        } else {
            f64::INFINITY
        };
        let multipliers = DVector::zeros(evaluation.constraints.len());

        Self {
            point,
            feasible: max_violation <= constraint_tolerance,
            evaluation,
            multipliers,
            max_violation,
            iterations,
            function_evaluations: 0,
            duration,
            termination_reason,
            converged: termination_reason.is_converged(),
        }
    }

    /// Sets the multiplier estimates.
    pub fn with_multipliers(mut self, multipliers: DVector) -> Self {
        self.multipliers = multipliers;
        self
    }

    /// Sets the function evaluation count.
    pub fn with_function_evaluations(mut self, count: usize) -> Self {
        self.function_evaluations = count;
        self
    }
}

/// Interface for bound- and inequality-constrained optimizers.
pub trait ConstrainedOptimizer: Debug {
    /// Returns a human-readable name identifying the algorithm.
    fn name(&self) -> &str;

    /// Minimizes `problem` inside `bounds` starting from `initial_point`,
    /// reporting each completed iteration to `callback`.
    ///
    /// # Errors
    ///
    /// Returns errors only for setup problems: dimension mismatches,
    /// invalid configuration, or a starting point whose evaluation is not
    /// finite. Failures during iteration end the run with a
    /// [`TerminationReason`] instead.
    fn optimize_with_callback<P, C>(
        &mut self,
        problem: &P,
        bounds: &Bounds,
        initial_point: &DVector,
        callback: &mut C,
    ) -> OptimizerResult<OptimizationResult>
    where
        P: ConstrainedProblem + ?Sized,
        C: IterationCallback + ?Sized;

    /// Minimizes `problem` without an iteration callback.
    fn optimize<P>(
        &mut self,
        problem: &P,
        bounds: &Bounds,
        initial_point: &DVector,
    ) -> OptimizerResult<OptimizationResult>
    where
        P: ConstrainedProblem + ?Sized,
    {
        self.optimize_with_callback(problem, bounds, initial_point, &mut NoOpCallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopping_criterion_builder() {
        let criterion = StoppingCriterion::new()
            .with_max_iterations(200)
            .with_max_time(Duration::from_secs(1))
            .with_step_tolerance(1e-8)
            .with_constraint_tolerance(1e-9)
            .with_max_line_search_failures(5);

        assert_eq!(criterion.max_iterations, 200);
        assert_eq!(criterion.max_time, Some(Duration::from_secs(1)));
        assert_eq!(criterion.step_tolerance, 1e-8);
        assert_eq!(criterion.constraint_tolerance, 1e-9);
        assert_eq!(criterion.max_line_search_failures, 5);
        assert!(criterion.validate().is_ok());
    }

    #[test]
    fn test_stopping_criterion_validation() {
        assert!(StoppingCriterion::new().with_max_iterations(0).validate().is_err());
        assert!(StoppingCriterion::new().with_step_tolerance(0.0).validate().is_err());
        assert!(StoppingCriterion::new()
            .with_constraint_tolerance(-1.0)
            .validate()
            .is_err());
        assert!(StoppingCriterion::new()
            .with_max_line_search_failures(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_step_is_small() {
        let criterion = StoppingCriterion::new().with_step_tolerance(1e-6);
        let point = DVector::from_vec(vec![30.0, 0.0]);

        let step = DVector::from_vec(vec![3.0e-5, 5.0e-7]);
        assert!(criterion.step_is_small(&step, &point));

        let step = DVector::from_vec(vec![3.2e-5, 0.0]);
        assert!(!criterion.step_is_small(&step, &point));
    }

    #[test]
    fn test_result_feasibility() {
        let eval = Evaluation::new(1.0, DVector::from_vec(vec![-1.0, 5e-7]));
        let result = OptimizationResult::new(
            DVector::zeros(2),
            eval,
            4,
            Duration::ZERO,
            TerminationReason::Converged,
            1e-6,
        );
        assert!(result.feasible);
        assert!(result.converged);
        assert_eq!(result.max_violation, 5e-7);

        let eval = Evaluation::new(1.0, DVector::from_vec(vec![2.0]));
        let result = OptimizationResult::new(
            DVector::zeros(2),
            eval,
            100,
            Duration::ZERO,
            TerminationReason::IterationLimit,
            1e-6,
        )
        .with_function_evaluations(300);
        assert!(!result.feasible);
        assert!(!result.converged);
        assert_eq!(result.function_evaluations, 300);
    }

    #[test]
    fn test_termination_reason_display() {
        assert_eq!(TerminationReason::Converged.to_string(), "converged");
        assert_eq!(TerminationReason::IterationLimit.to_string(), "iteration limit");
        assert_eq!(TerminationReason::Stalled.to_string(), "stalled");
        assert!(TerminationReason::Converged.is_converged());
        assert!(!TerminationReason::TimeLimit.is_converged());
    }
}
