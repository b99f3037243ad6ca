//! Dense inequality-constrained quadratic programs.
//!
//! Solves
//!
//! ```text
//! minimize   ½ pᵀ H p + gᵀ p
//! subject to A p <= b
//! ```
//!
//! with `H` symmetric positive definite, by exact active-set enumeration:
//! every working set of at most `n` rows is solved through its KKT system
//!
//! ```text
//! [ H  A_Wᵀ ] [ p ]   [ -g  ]
//! [ A_W  0  ] [ λ ] = [ b_W ]
//! ```
//!
//! and a candidate is kept when it satisfies every row of `A p <= b` and has
//! non-negative multipliers. Among the kept candidates the one with the
//! smallest model value wins, the first enumerated on ties. Enumeration is
//! exponential in the row count, which is fine for the handful of design
//! variables and constraints this crate targets and never cycles the way an
//! iterative active-set method can on degenerate problems.

use trussopt_core::{
    bounds::Bounds,
    gradient::Linearization,
    types::{DMatrix, DVector},
};

/// Default feasibility and dual tolerance.
pub const QP_TOLERANCE: f64 = 1e-9;

/// Optimal point of a [`DenseQp`].
#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    /// Minimizer `p`
    pub step: DVector,
    /// One multiplier per row of `A`, zero for inactive rows
    pub multipliers: DVector,
    /// Model value `½ pᵀ H p + gᵀ p`
    pub objective: f64,
    /// Rows in the optimal working set
    pub active_set: Vec<usize>,
}

/// Dense convex QP with linear inequality constraints.
#[derive(Debug, Clone)]
pub struct DenseQp {
    hessian: DMatrix,
    gradient: DVector,
    constraints: DMatrix,
    rhs: DVector,
    tolerance: f64,
}

impl DenseQp {
    /// Creates an unconstrained QP.
    pub fn new(hessian: DMatrix, gradient: DVector) -> Self {
        let n = gradient.len();
        Self {
            hessian,
            gradient,
            constraints: DMatrix::zeros(0, n),
            rhs: DVector::zeros(0),
            tolerance: QP_TOLERANCE,
        }
    }

    /// Sets the inequality rows `A p <= b`.
    pub fn with_constraints(mut self, constraints: DMatrix, rhs: DVector) -> Self {
        self.constraints = constraints;
        self.rhs = rhs;
        self
    }

    /// Sets the feasibility and dual tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Number of variables.
    pub fn dimension(&self) -> usize {
        self.gradient.len()
    }

    /// Number of inequality rows.
    pub fn num_constraints(&self) -> usize {
        self.rhs.len()
    }

    /// Model value at `p`.
    pub fn objective(&self, p: &DVector) -> f64 {
        0.5 * p.dot(&(&self.hessian * p)) + self.gradient.dot(p)
    }

    /// Returns true if `p` satisfies every row within tolerance.
    pub fn is_feasible(&self, p: &DVector) -> bool {
        let ap = &self.constraints * p;
        ap.iter()
            .zip(self.rhs.iter())
            .all(|(&lhs, &b)| lhs <= b + self.tolerance * (1.0 + b.abs()))
    }

    /// Solves the QP; `None` means the constraints are inconsistent.
    pub fn solve(&self) -> Option<QpSolution> {
        let n = self.dimension();
        let m = self.num_constraints();

        if n == 0 {
            let step = DVector::zeros(0);
            return self.is_feasible(&step).then(|| QpSolution {
                step,
                multipliers: DVector::zeros(m),
                objective: 0.0,
                active_set: Vec::new(),
            });
        }

        let mut best: Option<QpSolution> = None;
        for size in 0..=n.min(m) {
            for working in Combinations::new(m, size) {
                let Some((step, lambda)) = self.solve_working_set(&working) else {
                    continue;
                };
                if lambda.iter().any(|&l| l < -self.tolerance) || !self.is_feasible(&step) {
                    continue;
                }

                let objective = self.objective(&step);
                let improves = best.as_ref().map_or(true, |b| {
                    objective < b.objective - 1e-14 * (1.0 + b.objective.abs())
                });
                if improves {
                    let mut multipliers = DVector::zeros(m);
                    for (q, &row) in working.iter().enumerate() {
                        multipliers[row] = lambda[q].max(0.0);
                    }
                    best = Some(QpSolution {
                        step,
                        multipliers,
                        objective,
                        active_set: working,
                    });
                }
            }
        }
        best
    }

    /// Solves the equality-constrained QP on `working`, returning the step
    /// and the working-set multipliers.
    fn solve_working_set(&self, working: &[usize]) -> Option<(DVector, DVector)> {
        let n = self.dimension();
        let k = working.len();

        let mut kkt = DMatrix::zeros(n + k, n + k);
        kkt.view_mut((0, 0), (n, n)).copy_from(&self.hessian);
        let mut rhs = DVector::zeros(n + k);
        rhs.rows_mut(0, n).copy_from(&(-&self.gradient));

        for (q, &row) in working.iter().enumerate() {
            for j in 0..n {
                let a = self.constraints[(row, j)];
                kkt[(n + q, j)] = a;
                kkt[(j, n + q)] = a;
            }
            rhs[n + q] = self.rhs[row];
        }

        let solution = kkt.clone().lu().solve(&rhs)?;
        if !solution.iter().all(|v| v.is_finite()) {
            return None;
        }
        // Rank-deficient working sets can slip through LU with garbage
        let residual = (&kkt * &solution - &rhs).amax();
        if residual > 1e-8 * (1.0 + rhs.amax()) {
            return None;
        }

        Some((solution.rows(0, n).into_owned(), solution.rows(n, k).into_owned()))
    }
}

/// Lexicographic k-subsets of `0..n`.
#[derive(Debug, Clone)]
struct Combinations {
    indices: Vec<usize>,
    n: usize,
    started: bool,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            indices: (0..k).collect(),
            n,
            started: false,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }

        let k = self.indices.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                return None;
            }
            i -= 1;
            if self.indices[i] < self.n - k + i {
                break;
            }
        }
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// Step computed by an [`SqpSubproblem`], in the full design space.
#[derive(Debug, Clone)]
pub struct SubproblemStep {
    /// Search direction; zero on fixed variables
    pub step: DVector,
    /// Multipliers of the linearized problem constraints
    pub multipliers: DVector,
    /// Model value of the step
    pub objective: f64,
    /// Problem constraints in the optimal working set
    pub active_constraints: Vec<usize>,
    /// Variables held at a bound by the optimal working set
    pub active_bounds: Vec<usize>,
}

/// QP model of a constrained problem around the current iterate.
///
/// Rows are the linearized constraints `g + J p <= 0`, then for each free
/// variable `p_j <= upper_j - x_j` and `-p_j <= x_j - lower_j`. Fixed
/// variables are removed from the model.
#[derive(Debug, Clone)]
pub struct SqpSubproblem {
    qp: DenseQp,
    free: Vec<usize>,
    dimension: usize,
    num_constraints: usize,
}

impl SqpSubproblem {
    /// Builds the model from a linearization and a Hessian approximation.
    pub fn new(
        linearization: &Linearization,
        hessian: &DMatrix,
        bounds: &Bounds,
        point: &DVector,
    ) -> Self {
        let free = bounds.free_indices();
        let nf = free.len();
        let m = linearization.evaluation.constraints.len();
        let rows = m + 2 * nf;

        let reduced_hessian = DMatrix::from_fn(nf, nf, |a, b| hessian[(free[a], free[b])]);
        let reduced_gradient = DVector::from_fn(nf, |a, _| linearization.gradient[free[a]]);

        let mut constraints = DMatrix::zeros(rows, nf);
        let mut rhs = DVector::zeros(rows);
        for i in 0..m {
            for (a, &j) in free.iter().enumerate() {
                constraints[(i, a)] = linearization.jacobian[(i, j)];
            }
            rhs[i] = -linearization.evaluation.constraints[i];
        }
        for (a, &j) in free.iter().enumerate() {
            let upper_row = m + 2 * a;
            constraints[(upper_row, a)] = 1.0;
            rhs[upper_row] = bounds.upper()[j] - point[j];
            constraints[(upper_row + 1, a)] = -1.0;
            rhs[upper_row + 1] = point[j] - bounds.lower()[j];
        }

        Self {
            qp: DenseQp::new(reduced_hessian, reduced_gradient).with_constraints(constraints, rhs),
            free,
            dimension: point.len(),
            num_constraints: m,
        }
    }

    /// The reduced QP.
    pub fn qp(&self) -> &DenseQp {
        &self.qp
    }

    /// Solves the model; `None` when the linearized constraints cannot be
    /// met inside the bounds.
    pub fn solve(&self) -> Option<SubproblemStep> {
        let solution = self.qp.solve()?;

        let mut step = DVector::zeros(self.dimension);
        for (a, &j) in self.free.iter().enumerate() {
            step[j] = solution.step[a];
        }

        let m = self.num_constraints;
        let (active_constraints, bound_rows): (Vec<usize>, Vec<usize>) =
            solution.active_set.iter().copied().partition(|&row| row < m);
        let active_bounds = bound_rows
            .into_iter()
            .map(|row| self.free[(row - m) / 2])
            .collect();

        Some(SubproblemStep {
            step,
            multipliers: solution.multipliers.rows(0, m).into_owned(),
            objective: solution.objective,
            active_constraints,
            active_bounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trussopt_core::problem::Evaluation;

    #[test]
    fn test_combinations() {
        assert_eq!(Combinations::new(5, 2).count(), 10);
        assert_eq!(Combinations::new(3, 0).collect::<Vec<_>>(), vec![Vec::<usize>::new()]);
        assert_eq!(Combinations::new(2, 3).count(), 0);
        assert_eq!(
            Combinations::new(3, 2).collect::<Vec<_>>(),
            vec![vec![0, 1], vec![0, 2], vec![1, 2]]
        );
    }

    #[test]
    fn test_unconstrained_minimum() {
        let qp = DenseQp::new(DMatrix::identity(2, 2), DVector::from_vec(vec![-1.0, -2.0]));
        let solution = qp.solve().unwrap();
        assert_relative_eq!(solution.step, DVector::from_vec(vec![1.0, 2.0]), epsilon = 1e-12);
        assert!(solution.active_set.is_empty());
        assert_relative_eq!(solution.objective, -2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_active_constraint_multiplier() {
        // min ½|p|² - p0 - p1  s.t.  p0 + p1 <= 1
        let qp = DenseQp::new(DMatrix::identity(2, 2), DVector::from_vec(vec![-1.0, -1.0]))
            .with_constraints(
                DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
                DVector::from_vec(vec![1.0]),
            );
        let solution = qp.solve().unwrap();
        assert_relative_eq!(solution.step, DVector::from_vec(vec![0.5, 0.5]), epsilon = 1e-12);
        assert_relative_eq!(solution.multipliers[0], 0.5, epsilon = 1e-12);
        assert_eq!(solution.active_set, vec![0]);
    }

    #[test]
    fn test_inactive_constraint_has_zero_multiplier() {
        let qp = DenseQp::new(DMatrix::identity(1, 1), DVector::from_vec(vec![-1.0]))
            .with_constraints(DMatrix::from_row_slice(1, 1, &[1.0]), DVector::from_vec(vec![5.0]));
        let solution = qp.solve().unwrap();
        assert_relative_eq!(solution.step[0], 1.0, epsilon = 1e-12);
        assert_eq!(solution.multipliers[0], 0.0);
    }

    #[test]
    fn test_inconsistent_constraints() {
        // p <= -1 and p >= 1
        let qp = DenseQp::new(DMatrix::identity(1, 1), DVector::zeros(1)).with_constraints(
            DMatrix::from_row_slice(2, 1, &[1.0, -1.0]),
            DVector::from_vec(vec![-1.0, -1.0]),
        );
        assert!(qp.solve().is_none());
    }

    #[test]
    fn test_duplicate_rows() {
        let qp = DenseQp::new(DMatrix::identity(2, 2), DVector::from_vec(vec![-2.0, 0.0]))
            .with_constraints(
                DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 0.0]),
                DVector::from_vec(vec![0.5, 0.5]),
            );
        let solution = qp.solve().unwrap();
        assert_relative_eq!(solution.step[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(solution.multipliers.sum(), 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_problem() {
        let qp = DenseQp::new(DMatrix::zeros(0, 0), DVector::zeros(0)).with_constraints(
            DMatrix::zeros(1, 0),
            DVector::from_vec(vec![0.5]),
        );
        assert!(qp.solve().is_some());

        let qp = DenseQp::new(DMatrix::zeros(0, 0), DVector::zeros(0)).with_constraints(
            DMatrix::zeros(1, 0),
            DVector::from_vec(vec![-0.5]),
        );
        assert!(qp.solve().is_none());
    }

    fn linearization() -> Linearization {
        // f = p0 + p1 around x = (1, 1); g = 1 - x0 x1 linearized
        Linearization {
            evaluation: Evaluation::new(2.0, DVector::from_vec(vec![0.0])),
            gradient: DVector::from_vec(vec![1.0, 1.0]),
            jacobian: DMatrix::from_row_slice(1, 2, &[-1.0, -1.0]),
        }
    }

    #[test]
    fn test_subproblem_respects_bounds() {
        let bounds = Bounds::from_pairs(&[(0.0, 1.5), (0.0, 1.5)]).unwrap();
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let lin = Linearization {
            evaluation: Evaluation::new(0.0, DVector::from_vec(vec![-10.0])),
            gradient: DVector::from_vec(vec![-5.0, -5.0]),
            jacobian: DMatrix::zeros(1, 2),
        };
        let step = SqpSubproblem::new(&lin, &DMatrix::identity(2, 2), &bounds, &x)
            .solve()
            .unwrap();
        assert_relative_eq!(step.step, DVector::from_vec(vec![0.5, 0.5]), epsilon = 1e-12);
        assert_eq!(step.multipliers.len(), 1);
        assert!(step.active_constraints.is_empty());
        assert_eq!(step.active_bounds, vec![0, 1]);
    }

    #[test]
    fn test_subproblem_skips_fixed_variables() {
        let bounds = Bounds::from_pairs(&[(0.0, 10.0), (1.0, 1.0)]).unwrap();
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let sub = SqpSubproblem::new(&linearization(), &DMatrix::identity(2, 2), &bounds, &x);
        assert_eq!(sub.qp().dimension(), 1);
        assert_eq!(sub.qp().num_constraints(), 1 + 2);

        let step = sub.solve().unwrap();
        assert_eq!(step.step[1], 0.0);
        // Linearized constraint -p0 <= 0 is active against the descent
        assert_relative_eq!(step.step[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(step.multipliers[0], 1.0, epsilon = 1e-12);
        assert_eq!(step.active_constraints, vec![0]);
        assert!(step.active_bounds.is_empty());
    }

    #[test]
    fn test_subproblem_infeasible_linearization() {
        let bounds = Bounds::from_pairs(&[(0.0, 1.0)]).unwrap();
        let x = DVector::from_vec(vec![0.5]);
        let lin = Linearization {
            evaluation: Evaluation::new(0.5, DVector::from_vec(vec![1.5])),
            gradient: DVector::from_vec(vec![1.0]),
            jacobian: DMatrix::from_row_slice(1, 1, &[-1.0]),
        };
        assert!(SqpSubproblem::new(&lin, &DMatrix::identity(1, 1), &bounds, &x)
            .solve()
            .is_none());
    }
}
