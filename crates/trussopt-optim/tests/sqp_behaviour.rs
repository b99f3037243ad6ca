//! Integration tests for the SQP optimizer on small analytic problems.

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use std::time::Duration;
use trussopt_core::{
    bounds::Bounds,
    callback::{HistoryRecorder, IterationInfo},
    error::{OptimizerError, ProblemError},
    gradient::FiniteDifference,
    optimizer::{ConstrainedOptimizer, StoppingCriterion, TerminationReason},
    problem::{ConstrainedProblem, Evaluation},
    types::DVector,
};
use trussopt_optim::{Sqp, SqpConfig};

/// min x0 + x1 s.t. 1 - x0 x1 <= 0; optimum (1, 1)
#[derive(Debug)]
struct Hyperbola;

impl ConstrainedProblem for Hyperbola {
    fn dimension(&self) -> usize {
        2
    }

    fn num_constraints(&self) -> usize {
        1
    }

    fn evaluate(&self, x: &DVector) -> Evaluation {
        Evaluation::new(x[0] + x[1], DVector::from_vec(vec![1.0 - x[0] * x[1]]))
    }
}

/// min x s.t. 2 - x <= 0; infeasible inside x <= 1
#[derive(Debug)]
struct OutOfReach;

impl ConstrainedProblem for OutOfReach {
    fn dimension(&self) -> usize {
        1
    }

    fn num_constraints(&self) -> usize {
        1
    }

    fn evaluate(&self, x: &DVector) -> Evaluation {
        Evaluation::new(x[0], DVector::from_vec(vec![2.0 - x[0]]))
    }
}

/// min (x - 3)², undefined for x > 2
#[derive(Debug)]
struct Cliff;

impl ConstrainedProblem for Cliff {
    fn dimension(&self) -> usize {
        1
    }

    fn num_constraints(&self) -> usize {
        0
    }

    fn evaluate(&self, x: &DVector) -> Evaluation {
        let objective = if x[0] <= 2.0 {
            (x[0] - 3.0).powi(2)
        } else {
            f64::NAN
        };
        Evaluation::new(objective, DVector::zeros(0))
    }
}

fn hyperbola_bounds() -> Bounds {
    Bounds::from_pairs(&[(0.1, 10.0), (0.1, 10.0)]).unwrap()
}

#[test]
fn test_converges_to_kkt_point() {
    let mut sqp = Sqp::with_default_config();
    let x0 = DVector::from_vec(vec![5.0, 0.5]);
    let result = sqp.optimize(&Hyperbola, &hyperbola_bounds(), &x0).unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Converged);
    assert!(result.converged);
    assert!(result.feasible);
    assert_relative_eq!(result.point[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(result.point[1], 1.0, epsilon = 1e-4);
    assert_relative_eq!(result.evaluation.objective, 2.0, epsilon = 1e-6);
    // ∇f + λ ∇g = 0 at (1, 1) gives λ = 1
    assert_relative_eq!(result.multipliers[0], 1.0, epsilon = 1e-3);
    assert!(result.function_evaluations > result.iterations);
}

#[test]
fn test_central_differences_converge() {
    let config = SqpConfig::new().with_finite_difference(FiniteDifference::central());
    let mut sqp = Sqp::new(config);
    let x0 = DVector::from_vec(vec![5.0, 0.5]);
    let result = sqp.optimize(&Hyperbola, &hyperbola_bounds(), &x0).unwrap();

    assert!(result.converged);
    assert_relative_eq!(result.point[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(result.point[1], 1.0, epsilon = 1e-4);
}

#[test]
fn test_start_outside_bounds_is_projected() {
    let mut sqp = Sqp::with_default_config();
    let x0 = DVector::from_vec(vec![20.0, -5.0]);
    let result = sqp.optimize(&Hyperbola, &hyperbola_bounds(), &x0).unwrap();

    assert!(result.converged);
    assert!(hyperbola_bounds().contains(&result.point));
    assert_relative_eq!(result.evaluation.objective, 2.0, epsilon = 1e-6);
}

#[test]
fn test_fixed_variable_stays_at_bound() {
    let bounds = Bounds::from_pairs(&[(0.1, 10.0), (2.0, 2.0)]).unwrap();
    let mut sqp = Sqp::with_default_config();
    let x0 = DVector::from_vec(vec![5.0, 7.0]);
    let result = sqp.optimize(&Hyperbola, &bounds, &x0).unwrap();

    assert!(result.converged);
    assert_eq!(result.point[1], 2.0);
    assert_relative_eq!(result.point[0], 0.5, epsilon = 1e-6);
}

#[test]
fn test_unreachable_constraint_stalls() {
    let bounds = Bounds::from_pairs(&[(0.0, 1.0)]).unwrap();
    let mut sqp = Sqp::with_default_config();
    let result = sqp
        .optimize(&OutOfReach, &bounds, &DVector::from_vec(vec![0.5]))
        .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Stalled);
    assert!(!result.feasible);
    assert!(!result.converged);
    // Least infeasible point reached by restoration
    assert_eq!(result.point[0], 1.0);
    assert_relative_eq!(result.max_violation, 1.0);
}

#[test]
fn test_non_finite_region_is_never_accepted() {
    let bounds = Bounds::from_pairs(&[(0.0, 10.0)]).unwrap();
    let mut sqp = Sqp::with_default_config();
    let result = sqp
        .optimize(&Cliff, &bounds, &DVector::from_vec(vec![0.0]))
        .unwrap();

    assert!(result.point[0] <= 2.0);
    assert!(result.evaluation.is_finite());
    assert!(result.evaluation.objective < 9.0);
    assert!(result.feasible);
}

#[test]
fn test_degenerate_start_is_an_error() {
    let bounds = Bounds::from_pairs(&[(0.0, 10.0)]).unwrap();
    let mut sqp = Sqp::with_default_config();
    let err = sqp
        .optimize(&Cliff, &bounds, &DVector::from_vec(vec![5.0]))
        .unwrap_err();
    assert!(matches!(err, OptimizerError::DegenerateStart { .. }));
}

#[test]
fn test_dimension_mismatch_is_an_error() {
    let mut sqp = Sqp::with_default_config();
    let err = sqp
        .optimize(&Hyperbola, &hyperbola_bounds(), &DVector::from_vec(vec![1.0]))
        .unwrap_err();
    assert!(matches!(
        err,
        OptimizerError::Problem(ProblemError::DimensionMismatch { .. })
    ));

    let bounds = Bounds::from_pairs(&[(0.0, 1.0)]).unwrap();
    let err = sqp
        .optimize(&Hyperbola, &bounds, &DVector::from_vec(vec![1.0]))
        .unwrap_err();
    assert!(matches!(err, OptimizerError::Problem(_)));
}

#[test]
fn test_invalid_configuration_is_an_error() {
    let mut sqp = Sqp::new(SqpConfig::new().with_penalty_factor(0.0));
    let err = sqp
        .optimize(&Hyperbola, &hyperbola_bounds(), &DVector::from_vec(vec![5.0, 0.5]))
        .unwrap_err();
    assert!(matches!(err, OptimizerError::InvalidConfiguration { .. }));
}

#[test]
fn test_iteration_limit_returns_best_iterate() {
    let mut sqp = Sqp::new(SqpConfig::new().with_max_iterations(2));
    let x0 = DVector::from_vec(vec![5.0, 0.5]);
    let result = sqp.optimize(&Hyperbola, &hyperbola_bounds(), &x0).unwrap();

    assert_eq!(result.termination_reason, TerminationReason::IterationLimit);
    assert_eq!(result.iterations, 2);
    assert!(result.feasible);
    assert!(result.evaluation.objective < 5.5);
}

#[test]
fn test_time_limit_checked_between_iterations() {
    let criterion = StoppingCriterion::new().with_max_time(Duration::from_nanos(1));
    let mut sqp = Sqp::new(SqpConfig::new().with_stopping_criterion(criterion));
    let x0 = DVector::from_vec(vec![5.0, 0.5]);
    let result = sqp.optimize(&Hyperbola, &hyperbola_bounds(), &x0).unwrap();

    assert_eq!(result.termination_reason, TerminationReason::TimeLimit);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_callback_can_stop_the_run() {
    let mut sqp = Sqp::with_default_config();
    let x0 = DVector::from_vec(vec![5.0, 0.5]);
    let mut stop_at_two = |info: &IterationInfo<'_>| info.iteration < 2;
    let result = sqp
        .optimize_with_callback(&Hyperbola, &hyperbola_bounds(), &x0, &mut stop_at_two)
        .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::CallbackRequest);
    assert_eq!(result.iterations, 2);
}

#[test]
fn test_history_stays_inside_bounds() {
    let bounds = hyperbola_bounds();
    let mut sqp = Sqp::with_default_config();
    let mut history = HistoryRecorder::new();
    let x0 = DVector::from_vec(vec![5.0, 0.5]);
    let result = sqp
        .optimize_with_callback(&Hyperbola, &bounds, &x0, &mut history)
        .unwrap();

    assert_eq!(history.records.len(), result.iterations);
    for (i, record) in history.records.iter().enumerate() {
        assert_eq!(record.iteration, i + 1);
        assert!(bounds.contains(&record.point));
        assert!(record.objective.is_finite());
    }
}
