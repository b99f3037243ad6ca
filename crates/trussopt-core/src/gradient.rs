//! Gradient estimation for constrained problems.
//!
//! Optimizers never differentiate a problem themselves. They ask a
//! [`GradientEstimator`] for a [`Linearization`]: the objective gradient and
//! the constraint Jacobian at the current point. [`FiniteDifference`] is the
//! stock implementation; analytic derivatives can be substituted by
//! implementing the same trait.
//!
//! # Finite-difference rules
//!
//! - Step for variable j: `h_j = relative_step * max(|x_j|, 1)`.
//! - Forward differences step backward when `x_j + h_j` would leave the box.
//! - A perturbed point with non-finite outputs is retried on the opposite
//!   side; only when both sides fail is the linearization reported as
//!   degenerate.
//! - Fixed variables (`lower == upper`) are never perturbed and receive a
//!   zero derivative.

use crate::{
    bounds::Bounds,
    error::{OptimizerError, OptimizerResult, ProblemError, Result},
    problem::{ConstrainedProblem, Evaluation},
    types::{constants, DMatrix, DVector},
};
use std::fmt::Debug;
use tracing::warn;

/// First-order model of a problem at a point.
#[derive(Debug, Clone)]
pub struct Linearization {
    /// Values at the linearization point
    pub evaluation: Evaluation,
    /// Objective gradient ∇f(x)
    pub gradient: DVector,
    /// Constraint Jacobian; row i is ∇g_i(x)
    pub jacobian: DMatrix,
}

impl Linearization {
    /// Gradient of the Lagrangian `∇f + Jᵀλ`.
    pub fn lagrangian_gradient(&self, multipliers: &DVector) -> DVector {
        &self.gradient + self.jacobian.tr_mul(multipliers)
    }
}

/// Strategy for building a [`Linearization`].
pub trait GradientEstimator: Debug {
    /// Returns the name of the estimator for logging.
    fn name(&self) -> &str;

    /// Linearizes `problem` at `x`, reusing the already computed `base`
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateEvaluation` if no finite derivative estimate can
    /// be formed for some variable.
    fn linearize<P>(
        &self,
        problem: &P,
        x: &DVector,
        bounds: &Bounds,
        base: &Evaluation,
    ) -> Result<Linearization>
    where
        P: ConstrainedProblem + ?Sized;

    /// Evaluates `problem` at `x` and linearizes it.
    fn evaluate<P>(&self, problem: &P, x: &DVector, bounds: &Bounds) -> Result<Linearization>
    where
        P: ConstrainedProblem + ?Sized,
    {
        let base = problem.evaluate(x);
        if !base.is_finite() {
            return Err(ProblemError::degenerate_evaluation(format!(
                "non-finite evaluation at {:?}",
                x.as_slice()
            )));
        }
        self.linearize(problem, x, bounds, &base)
    }
}

/// Finite-difference formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DifferenceScheme {
    /// One extra evaluation per free variable, first-order accurate
    Forward,
    /// Two extra evaluations per free variable, second-order accurate
    Central,
}

/// Finite-difference gradient estimator.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FiniteDifference {
    /// Difference formula
    pub scheme: DifferenceScheme,
    /// Perturbation relative to `max(|x_j|, 1)`
    pub relative_step: f64,
    /// Evaluate perturbed points concurrently (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for FiniteDifference {
    fn default() -> Self {
        Self {
            scheme: DifferenceScheme::Forward,
            relative_step: constants::FINITE_DIFFERENCE_STEP,
            parallel: false,
        }
    }
}

impl FiniteDifference {
    /// Forward differences with the default step.
    pub fn forward() -> Self {
        Self::default()
    }

    /// Central differences with a step suited to second-order formulas.
    pub fn central() -> Self {
        Self {
            scheme: DifferenceScheme::Central,
            relative_step: 1e-5,
            ..Self::default()
        }
    }

    /// Sets the relative perturbation.
    pub fn with_relative_step(mut self, step: f64) -> Self {
        self.relative_step = step;
        self
    }

    /// Enables concurrent evaluation of perturbed points.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates the estimator settings.
    pub fn validate(&self) -> OptimizerResult<()> {
        if !(self.relative_step > 0.0 && self.relative_step < 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "relative step must be in (0, 1)",
                "relative_step",
                self.relative_step.to_string(),
            ));
        }
        Ok(())
    }

    /// Perturbation magnitude for a variable currently at `value`.
    fn step_size(&self, value: f64) -> f64 {
        self.relative_step * value.abs().max(1.0)
    }

    /// Returns `x` with component `index` shifted by `h`, and the step that
    /// was actually representable.
    fn perturb(x: &DVector, index: usize, h: f64) -> (DVector, f64) {
        let mut point = x.clone();
        point[index] = x[index] + h;
        let actual = point[index] - x[index];
        (point, actual)
    }

    fn forward_columns<P>(
        &self,
        problem: &P,
        x: &DVector,
        bounds: &Bounds,
        base: &Evaluation,
        free: &[usize],
    ) -> Result<Vec<(usize, f64, DVector)>>
    where
        P: ConstrainedProblem + ?Sized,
    {
        let planned: Vec<(usize, DVector, f64)> = free
            .iter()
            .map(|&j| {
                let h = self.step_size(x[j]);
                let h = if x[j] + h > bounds.upper()[j] { -h } else { h };
                let (point, h) = Self::perturb(x, j, h);
                (j, point, h)
            })
            .collect();
        let points: Vec<DVector> = planned.iter().map(|(_, p, _)| p.clone()).collect();
        let evaluations = evaluate_points(problem, &points, self.parallel);

        let mut columns = Vec::with_capacity(free.len());
        for ((j, _, h), eval) in planned.into_iter().zip(evaluations) {
            let (h, eval) = if eval.is_finite() {
                (h, eval)
            } else {
                let (point, flipped) = Self::perturb(x, j, -h);
                let retry = problem.evaluate(&point);
                if !retry.is_finite() {
                    return Err(ProblemError::degenerate_evaluation(format!(
                        "no finite forward difference for variable {j}"
                    )));
                }
                warn!(variable = j, "non-finite perturbation, differencing on the opposite side");
                (flipped, retry)
            };
            let mut column = DVector::zeros(base.constraints.len() + 1);
            column[0] = (eval.objective - base.objective) / h;
            for i in 0..base.constraints.len() {
                column[i + 1] = (eval.constraints[i] - base.constraints[i]) / h;
            }
            columns.push((j, h, column));
        }
        Ok(columns)
    }

    fn central_columns<P>(
        &self,
        problem: &P,
        x: &DVector,
        base: &Evaluation,
        free: &[usize],
    ) -> Result<Vec<(usize, f64, DVector)>>
    where
        P: ConstrainedProblem + ?Sized,
    {
        let mut points = Vec::with_capacity(2 * free.len());
        let mut steps = Vec::with_capacity(free.len());
        for &j in free {
            let h = self.step_size(x[j]);
            let (plus, h_plus) = Self::perturb(x, j, h);
            let (minus, h_minus) = Self::perturb(x, j, -h);
            points.push(plus);
            points.push(minus);
            steps.push((j, h_plus, h_minus));
        }
        let evaluations = evaluate_points(problem, &points, self.parallel);

        let m = base.constraints.len();
        let stack = |eval: &Evaluation| {
            let mut values = DVector::zeros(m + 1);
            values[0] = eval.objective;
            values.rows_mut(1, m).copy_from(&eval.constraints);
            values
        };
        let base_values = stack(base);

        let mut columns = Vec::with_capacity(free.len());
        for (&(j, h_plus, h_minus), pair) in steps.iter().zip(evaluations.chunks(2)) {
            let (plus, minus) = (&pair[0], &pair[1]);
            let column = match (plus.is_finite(), minus.is_finite()) {
                (true, true) => (stack(plus) - stack(minus)) / (h_plus - h_minus),
                (true, false) => (stack(plus) - &base_values) / h_plus,
                (false, true) => (stack(minus) - &base_values) / h_minus,
                (false, false) => {
                    return Err(ProblemError::degenerate_evaluation(format!(
                        "no finite central difference for variable {j}"
                    )));
                }
            };
            if !(plus.is_finite() && minus.is_finite()) {
                warn!(variable = j, "non-finite perturbation, falling back to a one-sided difference");
            }
            columns.push((j, h_plus, column));
        }
        Ok(columns)
    }
}

impl GradientEstimator for FiniteDifference {
    fn name(&self) -> &str {
        match self.scheme {
            DifferenceScheme::Forward => "forward difference",
            DifferenceScheme::Central => "central difference",
        }
    }

    fn linearize<P>(
        &self,
        problem: &P,
        x: &DVector,
        bounds: &Bounds,
        base: &Evaluation,
    ) -> Result<Linearization>
    where
        P: ConstrainedProblem + ?Sized,
    {
        bounds.check_dimension(x)?;
        let n = x.len();
        let m = base.constraints.len();
        let free = bounds.free_indices();

        let columns = match self.scheme {
            DifferenceScheme::Forward => self.forward_columns(problem, x, bounds, base, &free)?,
            DifferenceScheme::Central => self.central_columns(problem, x, base, &free)?,
        };

        let mut gradient = DVector::zeros(n);
        let mut jacobian = DMatrix::zeros(m, n);
        for (j, _, column) in columns {
            gradient[j] = column[0];
            jacobian.column_mut(j).copy_from(&column.rows(1, m));
        }

        Ok(Linearization {
            evaluation: base.clone(),
            gradient,
            jacobian,
        })
    }
}

#[cfg(feature = "parallel")]
fn evaluate_points<P>(problem: &P, points: &[DVector], parallel: bool) -> Vec<Evaluation>
where
    P: ConstrainedProblem + ?Sized,
{
    use rayon::prelude::*;

    if parallel {
        points.par_iter().map(|p| problem.evaluate(p)).collect()
    } else {
        points.iter().map(|p| problem.evaluate(p)).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn evaluate_points<P>(problem: &P, points: &[DVector], _parallel: bool) -> Vec<Evaluation>
where
    P: ConstrainedProblem + ?Sized,
{
    points.iter().map(|p| problem.evaluate(p)).collect()
}
