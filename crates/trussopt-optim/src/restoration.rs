//! Feasibility restoration for inconsistent QP subproblems.
//!
//! When the linearized constraints admit no step inside the bounds, the
//! driver falls back to reducing infeasibility alone. With `V` the violated
//! constraints, the least-norm Gauss-Newton step
//!
//! ```text
//! p = -J_Vᵀ (J_V J_Vᵀ + μ I)⁻¹ g_V
//! ```
//!
//! zeroes the linearized violations, and a projected backtracking search
//! accepts the first trial point whose total violation is strictly lower.

use trussopt_core::{
    bounds::Bounds,
    gradient::Linearization,
    line_search::LineSearchParams,
    problem::{ConstrainedProblem, Evaluation},
    types::{constants, DMatrix, DVector},
};
use tracing::{debug, warn};

/// Accepted restoration step.
#[derive(Debug, Clone)]
pub struct RestorationStep {
    /// New iterate, inside the bounds
    pub point: DVector,
    /// Evaluation at the new iterate
    pub evaluation: Evaluation,
    /// Step length along the Gauss-Newton direction
    pub step_size: f64,
}

/// Gauss-Newton feasibility restoration.
#[derive(Debug, Clone)]
pub struct FeasibilityRestoration {
    /// Backtracking schedule (only `initial_step_size`, `rho` and
    /// `min_step_size` are used)
    pub params: LineSearchParams,
    /// Relative Tikhonov shift μ on `J_V J_Vᵀ`
    pub regularization: f64,
}

impl Default for FeasibilityRestoration {
    fn default() -> Self {
        Self {
            params: LineSearchParams::default(),
            regularization: constants::REGULARIZATION,
        }
    }
}

impl FeasibilityRestoration {
    /// Creates a restoration phase with the given backtracking schedule.
    pub fn new(params: LineSearchParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Gauss-Newton direction reducing the linearized violations, or `None`
    /// when nothing is violated or the system is singular.
    pub fn direction(&self, linearization: &Linearization) -> Option<DVector> {
        let violated: Vec<usize> = linearization
            .evaluation
            .constraints
            .iter()
            .enumerate()
            .filter(|&(_, &g)| g > 0.0)
            .map(|(i, _)| i)
            .collect();
        if violated.is_empty() {
            return None;
        }

        let n = linearization.gradient.len();
        let jv = DMatrix::from_fn(violated.len(), n, |r, j| {
            linearization.jacobian[(violated[r], j)]
        });
        let gv = DVector::from_fn(violated.len(), |r, _| {
            linearization.evaluation.constraints[violated[r]]
        });

        let mut normal = &jv * jv.transpose();
        let shift = self.regularization * (1.0 + normal.trace().abs());
        for i in 0..normal.nrows() {
            normal[(i, i)] += shift;
        }

        let z = normal.lu().solve(&gv)?;
        let direction = -(jv.transpose() * z);
        let moves = direction.iter().any(|&v| v != 0.0);
        (direction.iter().all(|v| v.is_finite()) && moves).then_some(direction)
    }

    /// Attempts to move from `point` to a strictly less infeasible point.
    ///
    /// Returns the accepted step and the number of evaluations spent; the
    /// step is `None` when no trial point improved.
    pub fn restore<P>(
        &self,
        problem: &P,
        bounds: &Bounds,
        point: &DVector,
        linearization: &Linearization,
    ) -> (Option<RestorationStep>, usize)
    where
        P: ConstrainedProblem + ?Sized,
    {
        let Some(direction) = self.direction(linearization) else {
            warn!("no restoration direction available");
            return (None, 0);
        };

        let current = linearization.evaluation.total_violation();
        let mut alpha = self.params.initial_step_size;
        let mut evaluations = 0;

        while alpha >= self.params.min_step_size {
            let mut trial = point + &direction * alpha;
            bounds.project_in_place(&mut trial);
            let evaluation = problem.evaluate(&trial);
            evaluations += 1;

            if evaluation.is_finite() && evaluation.total_violation() < current {
                debug!(
                    alpha,
                    before = current,
                    after = evaluation.total_violation(),
                    "restoration step accepted"
                );
                return (
                    Some(RestorationStep {
                        point: trial,
                        evaluation,
                        step_size: alpha,
                    }),
                    evaluations,
                );
            }
            alpha *= self.params.rho;
        }

        warn!(violation = current, "restoration failed to reduce infeasibility");
        (None, evaluations)
    }
}
