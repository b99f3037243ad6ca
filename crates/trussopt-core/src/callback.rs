//! Callback support for optimization algorithms.
//!
//! Callbacks run between iterations, never inside an evaluation. They can
//! observe the accepted iterate and ask the optimizer to stop, which is how
//! a caller layers its own cancellation or timeout policy on top of a run.

use crate::{problem::Evaluation, types::DVector};
use std::time::Duration;

/// Information passed to callbacks after each iteration.
#[derive(Debug, Clone)]
pub struct IterationInfo<'a> {
    /// Number of completed iterations
    pub iteration: usize,
    /// Current iterate
    pub point: &'a DVector,
    /// Objective and constraints at the current iterate
    pub evaluation: &'a Evaluation,
    /// Step length accepted by the line search (0 when no step was taken)
    pub step_size: f64,
    /// Current penalty weight of the merit function
    pub penalty: f64,
    /// Elapsed time since optimization start
    pub elapsed: Duration,
}

/// Trait for optimization callbacks.
pub trait IterationCallback {
    /// Called at the end of each iteration.
    ///
    /// Returns `true` to continue optimization, `false` to stop early.
    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> bool;
}

/// A no-op callback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl IterationCallback for NoOpCallback {
    fn on_iteration_end(&mut self, _info: &IterationInfo<'_>) -> bool {
        true
    }
}

impl<F> IterationCallback for F
where
    F: FnMut(&IterationInfo<'_>) -> bool,
{
    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> bool {
        self(info)
    }
}

/// Snapshot of one iteration kept by [`HistoryRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// Iteration number
    pub iteration: usize,
    /// Iterate after the step
    pub point: DVector,
    /// Objective value
    pub objective: f64,
    /// Largest constraint violation
    pub max_violation: f64,
    /// Accepted step length
    pub step_size: f64,
}

/// Callback that records the iteration history.
#[derive(Debug, Clone, Default)]
pub struct HistoryRecorder {
    /// Records in iteration order
    pub records: Vec<IterationRecord>,
}

impl HistoryRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IterationCallback for HistoryRecorder {
    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> bool {
        self.records.push(IterationRecord {
            iteration: info.iteration,
            point: info.point.clone(),
            objective: info.evaluation.objective,
            max_violation: info.evaluation.max_violation(),
            step_size: info.step_size,
        });
        true
    }
}
