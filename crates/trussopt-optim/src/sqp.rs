//! Sequential quadratic programming with finite-difference gradients.
//!
//! Solves `minimize f(x) s.t. g(x) <= 0, lower <= x <= upper` by repeating:
//!
//! 1. Linearize objective and constraints at the current iterate.
//! 2. Solve the QP model built from the linearization and a damped BFGS
//!    approximation of the Lagrangian Hessian. If the linearized
//!    constraints are inconsistent, take a feasibility restoration step
//!    instead.
//! 3. Update the L1 merit penalty against the new multipliers and backtrack
//!    along the QP step, projecting every trial point into the bounds. A
//!    rejected full step gets one second-order correction first.
//! 4. Update the Hessian approximation with the Lagrangian gradient change.
//!
//! The run converges when a full step and the constraint violation are both
//! within tolerance, ends at the iteration cap or wall-clock limit, and
//! stalls after too many consecutive iterations without an accepted step.
//!
//! # Example
//!
//! ```rust,ignore
//! use trussopt_optim::{Sqp, SqpConfig};
//! use trussopt_core::prelude::*;
//!
//! let mut sqp = Sqp::new(SqpConfig::new().with_max_iterations(50));
//! let result = sqp.optimize(&problem, &bounds, &x0)?;
//! assert!(result.feasible);
//! ```

use crate::{
    correction::SecondOrderCorrection,
    qp::SqpSubproblem,
    restoration::FeasibilityRestoration,
    state::OptimizationState,
};
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use trussopt_core::{
    bounds::Bounds,
    callback::{IterationCallback, IterationInfo},
    error::{OptimizerError, OptimizerResult, ProblemError},
    gradient::{FiniteDifference, GradientEstimator},
    line_search::{BacktrackingLineSearch, L1Merit, LineSearchParams},
    optimizer::{ConstrainedOptimizer, OptimizationResult, StoppingCriterion, TerminationReason},
    problem::{ConstrainedProblem, CountingProblem, Evaluation},
    types::DVector,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the SQP optimizer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SqpConfig {
    /// Tolerances and budgets
    pub stopping_criterion: StoppingCriterion,
    /// Merit line search parameters
    pub line_search: LineSearchParams,
    /// Finite-difference settings for the default gradient estimator
    pub finite_difference: FiniteDifference,
    /// Initial L1 penalty weight ν₀
    pub initial_penalty: f64,
    /// Safety factor: ν ≥ factor · ‖λ‖∞ after every update
    pub penalty_factor: f64,
}

impl Default for SqpConfig {
    fn default() -> Self {
        Self {
            stopping_criterion: StoppingCriterion::default(),
            line_search: LineSearchParams::default(),
            finite_difference: FiniteDifference::default(),
            initial_penalty: 1.0,
            penalty_factor: 2.0,
        }
    }
}

impl SqpConfig {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stopping criterion.
    pub fn with_stopping_criterion(mut self, criterion: StoppingCriterion) -> Self {
        self.stopping_criterion = criterion;
        self
    }

    /// Sets the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.stopping_criterion.max_iterations = max_iterations;
        self
    }

    /// Sets the line search parameters.
    pub fn with_line_search(mut self, params: LineSearchParams) -> Self {
        self.line_search = params;
        self
    }

    /// Sets the finite-difference settings.
    pub fn with_finite_difference(mut self, finite_difference: FiniteDifference) -> Self {
        self.finite_difference = finite_difference;
        self
    }

    /// Sets the initial penalty weight.
    pub fn with_initial_penalty(mut self, penalty: f64) -> Self {
        self.initial_penalty = penalty;
        self
    }

    /// Sets the penalty safety factor.
    pub fn with_penalty_factor(mut self, factor: f64) -> Self {
        self.penalty_factor = factor;
        self
    }

    /// Validates every part of the configuration.
    pub fn validate(&self) -> OptimizerResult<()> {
        self.stopping_criterion.validate()?;
        self.line_search.validate()?;
        self.finite_difference.validate()?;

        if !(self.initial_penalty > 0.0 && self.initial_penalty.is_finite()) {
            return Err(OptimizerError::invalid_configuration(
                "Initial penalty must be positive and finite",
                "initial_penalty",
                self.initial_penalty.to_string(),
            ));
        }

        if !(self.penalty_factor >= 1.0 && self.penalty_factor.is_finite()) {
            return Err(OptimizerError::invalid_configuration(
                "Penalty factor must be at least 1",
                "penalty_factor",
                self.penalty_factor.to_string(),
            ));
        }

        Ok(())
    }
}

/// Result of one SQP iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
enum StepOutcome {
    /// QP step negligible at a feasible point
    Stationary,
    /// New iterate accepted
    Accepted { step_size: f64, converged: bool },
    /// No acceptable step
    Failed,
}

/// SQP optimizer.
#[derive(Debug, Clone)]
pub struct Sqp<G = FiniteDifference> {
    config: SqpConfig,
    estimator: G,
    restoration: FeasibilityRestoration,
    correction: SecondOrderCorrection,
}

impl Sqp<FiniteDifference> {
    /// Creates an optimizer using the configured finite differences.
    pub fn new(config: SqpConfig) -> Self {
        let estimator = config.finite_difference.clone();
        Self::with_estimator(config, estimator)
    }

    /// Creates an optimizer with default configuration.
    pub fn with_default_config() -> Self {
        Self::new(SqpConfig::default())
    }
}

impl<G: GradientEstimator> Sqp<G> {
    /// Creates an optimizer with a custom gradient estimator.
    pub fn with_estimator(config: SqpConfig, estimator: G) -> Self {
        let restoration = FeasibilityRestoration::new(config.line_search.clone());
        Self {
            config,
            estimator,
            restoration,
            correction: SecondOrderCorrection::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SqpConfig {
        &self.config
    }

    /// Performs one major iteration from the state's current iterate.
    fn iterate<P>(&self, problem: &P, bounds: &Bounds, state: &mut OptimizationState) -> StepOutcome
    where
        P: ConstrainedProblem + ?Sized,
    {
        let criterion = &self.config.stopping_criterion;

        let linearization = match state.linearization.take() {
            Some(linearization) => linearization,
            None => match self
                .estimator
                .linearize(problem, &state.point, bounds, &state.evaluation)
            {
                Ok(linearization) => linearization,
                Err(err) => {
                    warn!(%err, "gradient estimation failed");
                    return StepOutcome::Failed;
                }
            },
        };

        let subproblem =
            SqpSubproblem::new(&linearization, state.hessian.matrix(), bounds, &state.point);
        let Some(qp_step) = subproblem.solve() else {
            warn!(
                iteration = state.iteration,
                max_violation = state.max_violation(),
                "QP subproblem infeasible, attempting feasibility restoration"
            );
            let (step, _) = self
                .restoration
                .restore(problem, bounds, &state.point, &linearization);
            return match step {
                Some(step) => {
                    state.accept(step.point, step.evaluation, None);
                    StepOutcome::Accepted {
                        step_size: step.step_size,
                        converged: false,
                    }
                }
                None => {
                    state.linearization = Some(linearization);
                    StepOutcome::Failed
                }
            };
        };

        if criterion.step_is_small(&qp_step.step, &state.point)
            && state.max_violation() <= criterion.constraint_tolerance
        {
            state.multipliers = qp_step.multipliers;
            state.linearization = Some(linearization);
            return StepOutcome::Stationary;
        }

        let largest_multiplier = qp_step
            .multipliers
            .iter()
            .fold(0.0_f64, |acc, l| acc.max(l.abs()));
        state.update_penalty(self.config.penalty_factor * largest_multiplier);

        let merit = L1Merit::new(state.penalty);
        let search = BacktrackingLineSearch::new().search_with_correction(
            problem,
            bounds,
            &state.point,
            &qp_step.step,
            merit.value(&state.evaluation),
            merit.directional_derivative(&linearization, &qp_step.step),
            &self.config.line_search,
            |evaluation| merit.value(evaluation),
            |trial: &Evaluation| {
                self.correction.direction(&linearization, &qp_step, bounds, trial)
            },
        );
        let step_size = search.step_size;
        let full_step = step_size >= self.config.line_search.initial_step_size;
        if search.corrected {
            debug!(iteration = state.iteration, "second-order correction accepted");
        }
        let (Some(new_point), Some(new_evaluation)) = (search.new_point, search.new_evaluation)
        else {
            warn!(
                iteration = state.iteration,
                penalty = state.penalty,
                "line search failed to decrease the merit function"
            );
            state.linearization = Some(linearization);
            return StepOutcome::Failed;
        };

        let new_linearization =
            match self
                .estimator
                .linearize(problem, &new_point, bounds, &new_evaluation)
            {
                Ok(linearization) => Some(linearization),
                Err(err) => {
                    warn!(%err, "gradient estimation failed at accepted point");
                    None
                }
            };

        let s = &new_point - &state.point;
        if let Some(next) = &new_linearization {
            let y = next.lagrangian_gradient(&qp_step.multipliers)
                - linearization.lagrangian_gradient(&qp_step.multipliers);
            let update = state.hessian.update(&s, &y);
            trace!(?update, "hessian update");
        }

        // A short backtracked step says nothing about stationarity
        let converged = full_step
            && criterion.step_is_small(&s, &new_point)
            && new_evaluation.max_violation() <= criterion.constraint_tolerance;
        state.multipliers = qp_step.multipliers;
        state.accept(new_point, new_evaluation, new_linearization);

        StepOutcome::Accepted {
            step_size,
            converged,
        }
    }
}

impl<G: GradientEstimator> ConstrainedOptimizer for Sqp<G> {
    fn name(&self) -> &str {
        "SQP"
    }

    fn optimize_with_callback<P, C>(
        &mut self,
        problem: &P,
        bounds: &Bounds,
        initial_point: &DVector,
        callback: &mut C,
    ) -> OptimizerResult<OptimizationResult>
    where
        P: ConstrainedProblem + ?Sized,
        C: IterationCallback + ?Sized,
    {
        self.config.validate()?;

        let n = problem.dimension();
        if bounds.dimension() != n {
            return Err(ProblemError::dimension_mismatch(n, bounds.dimension()).into());
        }
        bounds.check_dimension(initial_point)?;
        if initial_point.iter().any(|v| !v.is_finite()) {
            return Err(OptimizerError::degenerate_start(
                "starting point has non-finite coordinates",
            ));
        }

        let start_time = Instant::now();
        let criterion = self.config.stopping_criterion.clone();
        let counting = CountingProblem::new(problem);

        let x0 = bounds.project(initial_point);
        let evaluation = counting.evaluate(&x0);
        if !evaluation.is_finite() {
            return Err(OptimizerError::degenerate_start(format!(
                "non-finite evaluation at {:?}",
                x0.as_slice()
            )));
        }
        if evaluation.constraints.len() != problem.num_constraints() {
            return Err(ProblemError::dimension_mismatch(
                problem.num_constraints(),
                evaluation.constraints.len(),
            )
            .into());
        }

        info!(
            optimizer = self.name(),
            gradients = self.estimator.name(),
            variables = n,
            constraints = problem.num_constraints(),
            objective = evaluation.objective,
            max_violation = evaluation.max_violation(),
            "starting optimization"
        );

        let mut state = OptimizationState::new(
            x0,
            evaluation,
            self.config.initial_penalty,
            criterion.constraint_tolerance,
        );
        state.begin();

        while !state.is_terminated() {
            if state.iteration >= criterion.max_iterations {
                state.terminate(TerminationReason::IterationLimit);
                continue;
            }
            if state.iteration > 0
                && criterion
                    .max_time
                    .is_some_and(|limit| start_time.elapsed() >= limit)
            {
                state.terminate(TerminationReason::TimeLimit);
                continue;
            }

            let step_size = match self.iterate(&counting, bounds, &mut state) {
                StepOutcome::Stationary => {
                    state.terminate(TerminationReason::Converged);
                    continue;
                }
                StepOutcome::Accepted {
                    step_size,
                    converged,
                } => {
                    state.iteration += 1;
                    if converged {
                        state.terminate(TerminationReason::Converged);
                    }
                    step_size
                }
                StepOutcome::Failed => {
                    state.iteration += 1;
                    if state.record_failure() >= criterion.max_line_search_failures {
                        state.terminate(TerminationReason::Stalled);
                    }
                    0.0
                }
            };

            debug!(
                iteration = state.iteration,
                objective = state.evaluation.objective,
                max_violation = state.max_violation(),
                step_size,
                penalty = state.penalty,
                "SQP iteration"
            );

            let info = IterationInfo {
                iteration: state.iteration,
                point: &state.point,
                evaluation: &state.evaluation,
                step_size,
                penalty: state.penalty,
                elapsed: start_time.elapsed(),
            };
            if !callback.on_iteration_end(&info) {
                state.terminate(TerminationReason::CallbackRequest);
            }
        }

        let reason = state
            .termination_reason()
            .unwrap_or(TerminationReason::IterationLimit);
        let iterations = state.iteration;
        let (iterate, multipliers) = state.into_reported();

        let result = OptimizationResult::new(
            iterate.point,
            iterate.evaluation,
            iterations,
            start_time.elapsed(),
            reason,
            criterion.constraint_tolerance,
        )
        .with_multipliers(multipliers)
        .with_function_evaluations(counting.evaluations());

        info!(
            reason = %reason,
            iterations,
            objective = result.evaluation.objective,
            max_violation = result.max_violation,
            feasible = result.feasible,
            evaluations = result.function_evaluations,
            "optimization finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// min 1000 x² - x s.t. x - 10 <= 0, minimum at x = 5e-4
    #[derive(Debug)]
    struct SteepBowl;

    impl ConstrainedProblem for SteepBowl {
        fn dimension(&self) -> usize {
            1
        }

        fn num_constraints(&self) -> usize {
            1
        }

        fn evaluate(&self, x: &DVector) -> Evaluation {
            Evaluation::new(
                1000.0 * x[0] * x[0] - x[0],
                DVector::from_element(1, x[0] - 10.0),
            )
        }
    }

    #[test]
    fn test_backtracked_step_is_not_convergence() {
        // The accepted step is shorter than the loose step tolerance
        let criterion = StoppingCriterion::default().with_step_tolerance(1e-2);
        let sqp = Sqp::new(SqpConfig::new().with_stopping_criterion(criterion));
        let bounds = Bounds::from_pairs(&[(-10.0, 10.0)]).unwrap();
        let x0 = DVector::from_element(1, 0.0);
        let mut state = OptimizationState::new(x0.clone(), SteepBowl.evaluate(&x0), 1.0, 1e-6);

        match sqp.iterate(&SteepBowl, &bounds, &mut state) {
            StepOutcome::Accepted {
                step_size,
                converged,
            } => {
                assert!(step_size < 1e-2);
                assert!(!converged);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(state.point[0] < 1e-2);
        assert!(state.point[0] > 5e-4);
    }

    #[test]
    fn test_steep_bowl_converges_after_curvature_is_learned() {
        let mut sqp = Sqp::with_default_config();
        let bounds = Bounds::from_pairs(&[(-10.0, 10.0)]).unwrap();
        let result = sqp
            .optimize(&SteepBowl, &bounds, &DVector::from_element(1, 0.0))
            .unwrap();

        assert_eq!(result.termination_reason, TerminationReason::Converged);
        assert!(result.iterations > 1);
        assert_relative_eq!(result.point[0], 5e-4, epsilon = 1e-6);
    }

    #[test]
    fn test_config_defaults() {
        let config = SqpConfig::default();
        assert_eq!(config.stopping_criterion.max_iterations, 100);
        assert_eq!(config.stopping_criterion.max_line_search_failures, 3);
        assert_eq!(config.line_search.rho, 0.5);
        assert_eq!(config.finite_difference.relative_step, 1e-7);
        assert_eq!(config.initial_penalty, 1.0);
        assert_eq!(config.penalty_factor, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SqpConfig::new()
            .with_max_iterations(20)
            .with_finite_difference(FiniteDifference::central())
            .with_initial_penalty(10.0)
            .with_penalty_factor(1.5);
        assert_eq!(config.stopping_criterion.max_iterations, 20);
        assert_eq!(config.initial_penalty, 10.0);

        let sqp = Sqp::new(config);
        assert_eq!(sqp.name(), "SQP");
        assert_eq!(sqp.estimator.name(), "central difference");
    }

    #[test]
    fn test_config_validation() {
        assert!(SqpConfig::new().with_initial_penalty(0.0).validate().is_err());
        assert!(SqpConfig::new().with_penalty_factor(0.5).validate().is_err());
        assert!(SqpConfig::new().with_max_iterations(0).validate().is_err());
        assert!(SqpConfig::new()
            .with_finite_difference(FiniteDifference::forward().with_relative_step(2.0))
            .validate()
            .is_err());
        assert!(SqpConfig::new()
            .with_line_search(LineSearchParams {
                c1: 1.5,
                ..LineSearchParams::default()
            })
            .validate()
            .is_err());
    }
}
