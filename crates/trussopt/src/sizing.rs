//! One-call sizing of the two-bar truss.

use std::fmt;
use tracing::info;
use trussopt_core::{
    callback::IterationCallback,
    error::OptimizerResult,
    optimizer::{ConstrainedOptimizer, TerminationReason},
};
use trussopt_optim::{Sqp, SqpConfig};
use trussopt_truss::{TrussConfig, TrussConstraint, TrussParameters, DIAMETER, HEIGHT};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of a sizing run.
///
/// Always check [`feasible`](Self::feasible): runs that did not converge
/// return their best iterate, which may violate a constraint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrussDesign {
    /// Apex height `H*`
    pub height: f64,
    /// Tube diameter `d*`
    pub diameter: f64,
    /// Material cost at the design
    pub cost: f64,
    /// Member stress at the design
    pub stress: f64,
    /// Buckling stress at the design
    pub buckling: f64,
    /// Apex deflection at the design
    pub deflection: f64,
    /// Largest constraint violation (zero when every limit holds)
    pub max_violation: f64,
    /// True if every constraint holds within tolerance
    pub feasible: bool,
    /// Major iterations performed
    pub iterations: usize,
    /// Model evaluations, finite differences included
    pub function_evaluations: usize,
    /// Why the optimizer stopped
    pub termination_reason: TerminationReason,
    /// Parameters the design was sized for
    pub parameters: TrussParameters,
}

/// Value of one constraint at a design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintMargin {
    /// Which constraint
    pub constraint: TrussConstraint,
    /// Normalized value `g`; negative means slack
    pub value: f64,
}

impl ConstraintMargin {
    /// Returns true if `g <= tolerance`.
    pub fn is_satisfied(&self, tolerance: f64) -> bool {
        self.value <= tolerance
    }
}

impl TrussDesign {
    /// Normalized value of every constraint, in declaration order.
    pub fn constraint_margins(&self) -> Vec<ConstraintMargin> {
        let response = trussopt_truss::TrussResponse {
            cost: self.cost,
            stress: self.stress,
            buckling: self.buckling,
            deflection: self.deflection,
        };
        TrussConstraint::ALL
            .iter()
            .map(|&constraint| ConstraintMargin {
                constraint,
                value: constraint.value(&response, &self.parameters),
            })
            .collect()
    }
}

impl fmt::Display for TrussDesign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Truss design ({} after {} iterations, {} evaluations)",
            self.termination_reason, self.iterations, self.function_evaluations
        )?;
        writeln!(f, "  height     H = {:.6}", self.height)?;
        writeln!(f, "  diameter   d = {:.6}", self.diameter)?;
        writeln!(f, "  cost         = {:.6}", self.cost)?;
        writeln!(f, "  stress       = {:.6}", self.stress)?;
        writeln!(f, "  buckling     = {:.6}", self.buckling)?;
        writeln!(f, "  deflection   = {:.6}", self.deflection)?;
        for margin in self.constraint_margins() {
            writeln!(f, "  {:<28} g = {:+.3e}", margin.constraint.to_string(), margin.value)?;
        }
        write!(f, "  feasible: {}", if self.feasible { "yes" } else { "no" })
    }
}

/// Sizes the truss with the default solver settings.
///
/// # Errors
///
/// Fails only on setup problems: invalid parameters or bounds, or a
/// starting point where the model is undefined.
pub fn size_truss(config: &TrussConfig) -> OptimizerResult<TrussDesign> {
    size_truss_with(config, &SqpConfig::default())
}

/// Sizes the truss with explicit solver settings.
pub fn size_truss_with(config: &TrussConfig, solver: &SqpConfig) -> OptimizerResult<TrussDesign> {
    size_truss_with_callback(config, solver, &mut trussopt_core::callback::NoOpCallback)
}

/// Sizes the truss, reporting each iteration to `callback`.
pub fn size_truss_with_callback<C>(
    config: &TrussConfig,
    solver: &SqpConfig,
    callback: &mut C,
) -> OptimizerResult<TrussDesign>
where
    C: IterationCallback + ?Sized,
{
    let problem = config.problem()?;
    let bounds = config.bounds()?;

    let mut sqp = Sqp::new(solver.clone());
    let result = sqp.optimize_with_callback(&problem, &bounds, &config.initial_point(), callback)?;
    let response = problem.response(&result.point);

    let design = TrussDesign {
        height: result.point[HEIGHT],
        diameter: result.point[DIAMETER],
        cost: response.cost,
        stress: response.stress,
        buckling: response.buckling,
        deflection: response.deflection,
        max_violation: result.max_violation,
        feasible: result.feasible,
        iterations: result.iterations,
        function_evaluations: result.function_evaluations,
        termination_reason: result.termination_reason,
        parameters: config.parameters,
    };

    info!(
        height = design.height,
        diameter = design.diameter,
        cost = design.cost,
        feasible = design.feasible,
        "truss sized"
    );
    Ok(design)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_margins_match_responses() {
        let design = size_truss(&TrussConfig::default()).unwrap();
        let margins = design.constraint_margins();

        assert_eq!(margins.len(), 3);
        assert_eq!(margins[0].constraint, TrussConstraint::Stress);
        assert_relative_eq!(margins[0].value, design.stress - 100.0);
        assert_relative_eq!(margins[1].value, design.stress - design.buckling);
        assert!(margins.iter().all(|m| m.is_satisfied(1e-6)));
    }

    #[test]
    fn test_display_report() {
        let design = size_truss(&TrussConfig::default()).unwrap();
        let report = design.to_string();

        assert!(report.starts_with("Truss design (converged"));
        assert!(report.contains("stress <= buckling"));
        assert!(report.ends_with("feasible: yes"));
    }
}
