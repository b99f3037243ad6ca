//! The truss as a constrained optimization problem.
//!
//! Design vector `x = (H, d)`, objective `cost(x)` and the three
//! [`TrussConstraint`]s in their declared order.

use crate::{
    constraints::TrussConstraint,
    model::{TrussModel, TrussResponse},
    params::TrussParameters,
};
use trussopt_core::{
    error::Result,
    problem::{ConstrainedProblem, Evaluation},
    types::DVector,
};

/// Index of the apex height `H` in the design vector.
pub const HEIGHT: usize = 0;

/// Index of the tube diameter `d` in the design vector.
pub const DIAMETER: usize = 1;

/// Cost minimization of the two-bar truss.
#[derive(Debug, Clone)]
pub struct TrussProblem {
    model: TrussModel,
}

impl TrussProblem {
    /// Creates the problem after validating `params`.
    pub fn new(params: TrussParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            model: TrussModel::new(params),
        })
    }

    /// The underlying physics model.
    pub fn model(&self) -> &TrussModel {
        &self.model
    }

    /// Full responses at a design vector.
    pub fn response(&self, x: &DVector) -> TrussResponse {
        self.model.evaluate(x[HEIGHT], x[DIAMETER])
    }

    /// Constraint values for precomputed responses.
    pub fn constraint_values(&self, response: &TrussResponse) -> DVector {
        let params = self.model.parameters();
        DVector::from_iterator(
            TrussConstraint::ALL.len(),
            TrussConstraint::ALL.iter().map(|c| c.value(response, params)),
        )
    }
}

impl ConstrainedProblem for TrussProblem {
    fn dimension(&self) -> usize {
        2
    }

    fn num_constraints(&self) -> usize {
        TrussConstraint::ALL.len()
    }

    fn evaluate(&self, x: &DVector) -> Evaluation {
        let response = self.response(x);
        Evaluation::new(response.cost, self.constraint_values(&response))
    }

    fn constraint_name(&self, index: usize) -> String {
        TrussConstraint::from_index(index)
            .map_or_else(|| format!("g[{index}]"), |c| c.name().to_string())
    }
}
