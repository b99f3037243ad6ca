//! Second-order correction of a rejected full SQP step.
//!
//! The QP step `p` satisfies the linearized constraints, but on a curved
//! constraint `g(x + p)` can still be positive by `O(‖p‖²)`. The L1 merit
//! then rejects the full step and backtracking creeps along the boundary.
//! With `A` the problem constraints in the QP working set, the correction
//!
//! ```text
//! c = -J_Aᵀ (J_A J_Aᵀ + μ I)⁻¹ g_A(x + p)
//! ```
//!
//! is the least-norm move, with the Jacobian reused from `x`, that zeroes
//! those constraints again. Variables the working set holds at a bound
//! are left alone.

use crate::qp::SubproblemStep;
use trussopt_core::{
    bounds::Bounds,
    gradient::Linearization,
    problem::Evaluation,
    types::{constants, DMatrix, DVector},
};
use tracing::trace;

/// Least-norm second-order correction.
#[derive(Debug, Clone)]
pub struct SecondOrderCorrection {
    /// Relative Tikhonov shift μ on `J_A J_Aᵀ`
    pub regularization: f64,
}

impl Default for SecondOrderCorrection {
    fn default() -> Self {
        Self {
            regularization: constants::REGULARIZATION,
        }
    }
}

impl SecondOrderCorrection {
    /// Creates a correction with the default regularization.
    pub fn new() -> Self {
        Self::default()
    }

    /// Correction for the full-step trial `trial`, or `None` when the
    /// working set has no problem constraint or nothing can move.
    pub fn direction(
        &self,
        linearization: &Linearization,
        step: &SubproblemStep,
        bounds: &Bounds,
        trial: &Evaluation,
    ) -> Option<DVector> {
        let rows = &step.active_constraints;
        let columns: Vec<usize> = bounds
            .free_indices()
            .into_iter()
            .filter(|j| !step.active_bounds.contains(j))
            .collect();
        if rows.is_empty() || columns.is_empty() {
            return None;
        }

        let ja = DMatrix::from_fn(rows.len(), columns.len(), |r, c| {
            linearization.jacobian[(rows[r], columns[c])]
        });
        let ga = DVector::from_fn(rows.len(), |r, _| trial.constraints[rows[r]]);

        let mut normal = &ja * ja.transpose();
        let shift = self.regularization * (1.0 + normal.trace().abs());
        for i in 0..normal.nrows() {
            normal[(i, i)] += shift;
        }

        let z = normal.lu().solve(&ga)?;
        let reduced = -(ja.transpose() * z);
        if !reduced.iter().all(|v| v.is_finite()) {
            return None;
        }

        let mut correction = DVector::zeros(linearization.gradient.len());
        for (c, &j) in columns.iter().enumerate() {
            correction[j] = reduced[c];
        }
        trace!(norm = correction.norm(), "second-order correction");
        Some(correction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// g = 1 - x0 x1 linearized at (1, 1)
    fn linearization() -> Linearization {
        Linearization {
            evaluation: Evaluation::new(2.0, DVector::from_vec(vec![0.0])),
            gradient: DVector::from_vec(vec![1.0, 1.0]),
            jacobian: DMatrix::from_row_slice(1, 2, &[-1.0, -1.0]),
        }
    }

    fn step(active_constraints: Vec<usize>, active_bounds: Vec<usize>) -> SubproblemStep {
        SubproblemStep {
            step: DVector::from_vec(vec![1.0, -1.0]),
            multipliers: DVector::from_vec(vec![1.0]),
            objective: 0.0,
            active_constraints,
            active_bounds,
        }
    }

    #[test]
    fn test_correction_returns_to_the_curve() {
        let bounds = Bounds::from_pairs(&[(0.0, 10.0), (0.0, 10.0)]).unwrap();
        // Full tangent step lands at (2, 0) where g = 1
        let trial = Evaluation::new(2.0, DVector::from_vec(vec![1.0]));

        let correction = SecondOrderCorrection::new()
            .direction(&linearization(), &step(vec![0], vec![]), &bounds, &trial)
            .unwrap();
        assert_relative_eq!(correction, DVector::from_vec(vec![0.5, 0.5]), epsilon = 1e-8);

        let corrected = DVector::from_vec(vec![2.0, 0.0]) + correction;
        assert!(1.0 - corrected[0] * corrected[1] < 0.0);
    }

    #[test]
    fn test_pinned_variables_do_not_move() {
        let bounds = Bounds::from_pairs(&[(0.0, 10.0), (0.0, 10.0)]).unwrap();
        let trial = Evaluation::new(2.0, DVector::from_vec(vec![1.0]));

        let correction = SecondOrderCorrection::new()
            .direction(&linearization(), &step(vec![0], vec![1]), &bounds, &trial)
            .unwrap();
        assert_relative_eq!(correction[0], 1.0, epsilon = 1e-8);
        assert_eq!(correction[1], 0.0);

        let fixed = Bounds::from_pairs(&[(0.0, 10.0), (1.0, 1.0)]).unwrap();
        let correction = SecondOrderCorrection::new()
            .direction(&linearization(), &step(vec![0], vec![]), &fixed, &trial)
            .unwrap();
        assert_eq!(correction[1], 0.0);
    }

    #[test]
    fn test_no_correction_without_active_constraints() {
        let bounds = Bounds::from_pairs(&[(0.0, 10.0), (0.0, 10.0)]).unwrap();
        let trial = Evaluation::new(2.0, DVector::from_vec(vec![1.0]));
        let correction = SecondOrderCorrection::new().direction(
            &linearization(),
            &step(vec![], vec![]),
            &bounds,
            &trial,
        );
        assert!(correction.is_none());
    }
}
