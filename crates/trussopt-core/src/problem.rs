//! Constrained problem interface.
//!
//! A problem maps a design vector to an objective value and a vector of
//! inequality constraints normalized to `g(x) <= 0`. Evaluations must be
//! pure: the same point always yields the same values, with no state
//! carried between calls. Non-finite outputs are not errors at this level;
//! callers inspect [`Evaluation::is_finite`] and decide how to recover.

use crate::types::DVector;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Objective and constraint values at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Objective value f(x)
    pub objective: f64,
    /// Constraint values g(x), feasible when every entry is `<= 0`
    pub constraints: DVector,
}

impl Evaluation {
    /// Creates a new evaluation record.
    pub fn new(objective: f64, constraints: DVector) -> Self {
        Self {
            objective,
            constraints,
        }
    }

    /// Returns true if the objective and every constraint are finite.
    pub fn is_finite(&self) -> bool {
        self.objective.is_finite() && self.constraints.iter().all(|g| g.is_finite())
    }

    /// Largest constraint violation, zero when feasible.
    pub fn max_violation(&self) -> f64 {
        self.constraints.iter().fold(0.0, |acc, &g| acc.max(g))
    }

    /// Sum of constraint violations (the L1 infeasibility measure).
    pub fn total_violation(&self) -> f64 {
        self.constraints.iter().map(|&g| g.max(0.0)).sum()
    }

    /// Returns true if no constraint is violated by more than `tolerance`.
    pub fn is_feasible(&self, tolerance: f64) -> bool {
        self.is_finite() && self.max_violation() <= tolerance
    }
}

/// Trait for problems of the form `min f(x) s.t. g(x) <= 0`.
///
/// Implementations must be `Sync` so that finite-difference perturbations
/// can be evaluated concurrently.
pub trait ConstrainedProblem: Debug + Sync {
    /// Number of design variables.
    fn dimension(&self) -> usize;

    /// Number of inequality constraints.
    fn num_constraints(&self) -> usize;

    /// Evaluates the objective and constraints at `x`.
    fn evaluate(&self, x: &DVector) -> Evaluation;

    /// Human-readable constraint label used in logs and reports.
    fn constraint_name(&self, index: usize) -> String {
        format!("g[{index}]")
    }
}

impl<P: ConstrainedProblem + ?Sized> ConstrainedProblem for &P {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn num_constraints(&self) -> usize {
        (**self).num_constraints()
    }

    fn evaluate(&self, x: &DVector) -> Evaluation {
        (**self).evaluate(x)
    }

    fn constraint_name(&self, index: usize) -> String {
        (**self).constraint_name(index)
    }
}

/// Wrapper to count problem evaluations.
#[derive(Debug)]
pub struct CountingProblem<'a, P>
where
    P: ConstrainedProblem + ?Sized,
{
    inner: &'a P,
    evaluations: AtomicUsize,
}

impl<'a, P> CountingProblem<'a, P>
where
    P: ConstrainedProblem + ?Sized,
{
    /// Creates a new counting wrapper around a problem.
    pub fn new(inner: &'a P) -> Self {
        Self {
            inner,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Returns the number of evaluations so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Resets the counter to zero.
    pub fn reset_count(&self) {
        self.evaluations.store(0, Ordering::Relaxed);
    }
}

impl<P> ConstrainedProblem for CountingProblem<'_, P>
where
    P: ConstrainedProblem + ?Sized,
{
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn num_constraints(&self) -> usize {
        self.inner.num_constraints()
    }

    fn evaluate(&self, x: &DVector) -> Evaluation {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner.evaluate(x)
    }

    fn constraint_name(&self, index: usize) -> String {
        self.inner.constraint_name(index)
    }
}
