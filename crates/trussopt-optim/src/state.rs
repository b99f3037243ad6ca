//! Mutable state of one SQP run.
//!
//! A state is created when a run starts, updated in place by the driver
//! after every iteration and consumed when the run ends. Its phase only
//! moves forward: `Initialized → Iterating → Terminated(reason)`.

use crate::bfgs::DampedBfgs;
use trussopt_core::{
    gradient::Linearization,
    optimizer::TerminationReason,
    problem::Evaluation,
    types::DVector,
};

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Start point evaluated, no iteration performed yet
    Initialized,
    /// Main loop running
    Iterating,
    /// Run finished; terminal
    Terminated(TerminationReason),
}

/// An accepted iterate.
#[derive(Debug, Clone, PartialEq)]
pub struct Iterate {
    /// Design point
    pub point: DVector,
    /// Objective and constraint values at `point`
    pub evaluation: Evaluation,
}

impl Iterate {
    /// Returns true if `self` should replace `other` as the best iterate:
    /// feasible beats infeasible, then lower objective among feasible
    /// points, lower maximum violation among infeasible ones.
    pub fn improves_on(&self, other: &Self, tolerance: f64) -> bool {
        let mine = self.evaluation.max_violation();
        let theirs = other.evaluation.max_violation();
        match (mine <= tolerance, theirs <= tolerance) {
            (true, true) => self.evaluation.objective < other.evaluation.objective,
            (true, false) => true,
            (false, true) => false,
            (false, false) => mine < theirs,
        }
    }
}

/// State owned by the SQP driver during a run.
#[derive(Debug, Clone)]
pub struct OptimizationState {
    /// Current iterate
    pub point: DVector,
    /// Evaluation at the current iterate
    pub evaluation: Evaluation,
    /// Cached linearization at the current iterate
    pub linearization: Option<Linearization>,
    /// Latest multiplier estimates
    pub multipliers: DVector,
    /// Merit penalty weight ν, never below the latest required value
    pub penalty: f64,
    /// Lagrangian Hessian approximation
    pub hessian: DampedBfgs,
    /// Completed iterations
    pub iteration: usize,
    /// Consecutive iterations without an accepted step
    pub consecutive_failures: usize,
    phase: Phase,
    best: Iterate,
    tolerance: f64,
}

impl OptimizationState {
    /// Creates the state at an evaluated start point.
    pub fn new(point: DVector, evaluation: Evaluation, penalty: f64, tolerance: f64) -> Self {
        let n = point.len();
        let m = evaluation.constraints.len();
        let best = Iterate {
            point: point.clone(),
            evaluation: evaluation.clone(),
        };
        Self {
            point,
            evaluation,
            linearization: None,
            multipliers: DVector::zeros(m),
            penalty,
            hessian: DampedBfgs::new(n),
            iteration: 0,
            consecutive_failures: 0,
            phase: Phase::Initialized,
            best,
            tolerance,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Enters the main loop.
    pub fn begin(&mut self) {
        if self.phase == Phase::Initialized {
            self.phase = Phase::Iterating;
        }
    }

    /// Ends the run. A terminated state keeps its first reason.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if !self.is_terminated() {
            self.phase = Phase::Terminated(reason);
        }
    }

    /// Returns true once the run has ended.
    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }

    /// Termination reason, if terminated.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self.phase {
            Phase::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Largest constraint violation at the current iterate.
    pub fn max_violation(&self) -> f64 {
        self.evaluation.max_violation()
    }

    /// Powell's penalty update: `ν ← max(required, ½ (ν + required))`.
    ///
    /// The penalty always dominates `required`, but a large value forced by
    /// early multipliers decays once they shrink.
    pub fn update_penalty(&mut self, required: f64) {
        if required.is_finite() && required >= 0.0 {
            self.penalty = required.max(0.5 * (self.penalty + required));
        }
    }

    /// Moves to an accepted iterate and clears the failure streak.
    pub fn accept(
        &mut self,
        point: DVector,
        evaluation: Evaluation,
        linearization: Option<Linearization>,
    ) {
        let candidate = Iterate { point, evaluation };
        if candidate.improves_on(&self.best, self.tolerance) {
            self.best = candidate.clone();
        }
        self.point = candidate.point;
        self.evaluation = candidate.evaluation;
        self.linearization = linearization;
        self.consecutive_failures = 0;
    }

    /// Records an iteration without progress and resets the Hessian.
    ///
    /// Returns the length of the failure streak.
    pub fn record_failure(&mut self) -> usize {
        self.consecutive_failures += 1;
        self.hessian.reset();
        self.consecutive_failures
    }

    /// Best iterate seen so far.
    pub fn best(&self) -> &Iterate {
        &self.best
    }

    /// Iterate to report: the current one after convergence, the best one
    /// otherwise.
    pub fn into_reported(self) -> (Iterate, DVector) {
        let iterate = match self.phase {
            Phase::Terminated(TerminationReason::Converged) => Iterate {
                point: self.point,
                evaluation: self.evaluation,
            },
            _ => self.best,
        };
        (iterate, self.multipliers)
    }
}
