//! Merit-function line search with bound projection.
//!
//! Constrained methods cannot judge a step by the objective alone: a step
//! may lower the cost while violating a constraint. The search here works
//! on a scalar merit function, by default the exact L1 penalty
//!
//! ```text
//! φ(x) = f(x) + ν Σ max(0, g_i(x))
//! ```
//!
//! and backtracks geometrically along the search direction until the
//! Armijo condition
//!
//! ```text
//! φ(P(x + α p)) ≤ φ(x) + c₁ α D
//! ```
//!
//! holds, where `P` is the projection onto the bounds and `D` the
//! directional derivative of the merit along `p`. Trial points with
//! non-finite outputs have merit `+∞` and are always rejected.
//!
//! Near a curved active constraint the full step can overshoot the
//! constraint by a second-order amount and be rejected even though the
//! direction is good (the Maratos effect).
//! [`BacktrackingLineSearch::search_with_correction`] accepts a correction
//! computed from the rejected full-step trial and tests `P(x + α₀ p + c)`
//! once before it starts backtracking.

use crate::{
    bounds::Bounds,
    error::{OptimizerError, OptimizerResult},
    gradient::Linearization,
    problem::{ConstrainedProblem, Evaluation},
    types::{constants, DVector},
};
use tracing::{trace, warn};

/// Exact L1 penalty merit function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct L1Merit {
    /// Penalty weight ν on the total violation
    pub penalty: f64,
}

impl L1Merit {
    /// Creates a merit function with penalty `penalty`.
    pub fn new(penalty: f64) -> Self {
        Self { penalty }
    }

    /// Merit value, `+∞` for non-finite evaluations.
    pub fn value(&self, eval: &Evaluation) -> f64 {
        if eval.is_finite() {
            eval.objective + self.penalty * eval.total_violation()
        } else {
            f64::INFINITY
        }
    }

    /// Directional derivative of the merit along a step that satisfies the
    /// linearized constraints: `∇fᵀp - ν Σ max(0, g_i)`.
    pub fn directional_derivative(&self, lin: &Linearization, step: &DVector) -> f64 {
        lin.gradient.dot(step) - self.penalty * lin.evaluation.total_violation()
    }
}

/// Parameters for backtracking line search.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSearchParams {
    /// Initial step size α₀
    pub initial_step_size: f64,

    /// Step size below which the search is declared failed
    pub min_step_size: f64,

    /// Armijo parameter c₁ ∈ (0,1) for sufficient decrease
    pub c1: f64,

    /// Backtracking reduction factor ρ ∈ (0,1): α_{i+1} = ρ α_i
    pub rho: f64,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self {
            initial_step_size: 1.0,
            min_step_size: constants::MIN_STEP_SIZE,
            c1: 1e-4,
            rho: 0.5,
        }
    }
}

impl LineSearchParams {
    /// Validates line search parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if:
    /// - `initial_step_size` is not in (0, 1]
    /// - `min_step_size` is not positive or exceeds `initial_step_size`
    /// - `c1` or `rho` is not in (0, 1)
    pub fn validate(&self) -> OptimizerResult<()> {
        if !(self.initial_step_size > 0.0 && self.initial_step_size <= 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "Initial step size must be in (0, 1]",
                "initial_step_size",
                self.initial_step_size.to_string(),
            ));
        }

        if !(self.min_step_size > 0.0 && self.min_step_size <= self.initial_step_size) {
            return Err(OptimizerError::invalid_configuration(
                "Minimum step size must be positive and not exceed the initial step size",
                "min_step_size",
                self.min_step_size.to_string(),
            ));
        }

        if !(self.c1 > 0.0 && self.c1 < 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "Armijo constant c1 must be in (0, 1)",
                "c1",
                self.c1.to_string(),
            ));
        }

        if !(self.rho > 0.0 && self.rho < 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "Backtracking factor rho must be in (0, 1)",
                "rho",
                self.rho.to_string(),
            ));
        }

        Ok(())
    }
}

/// Outcome of a line search.
#[derive(Debug, Clone)]
pub struct LineSearchResult {
    /// Accepted step size, or the last one tried on failure
    pub step_size: f64,

    /// Accepted point, already projected into the bounds (None on failure)
    pub new_point: Option<DVector>,

    /// Evaluation at the accepted point (None on failure)
    pub new_evaluation: Option<Evaluation>,

    /// Merit value at the accepted point
    pub new_merit: f64,

    /// Number of problem evaluations performed
    pub function_evals: usize,

    /// Number of trial points rejected for non-finite outputs
    pub non_finite_trials: usize,

    /// True if a step satisfying sufficient decrease was found
    pub success: bool,

    /// True if the accepted point came from a corrected full step
    pub corrected: bool,
}

/// Backtracking line search on an arbitrary merit function.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktrackingLineSearch;

impl BacktrackingLineSearch {
    /// Creates a new backtracking line search.
    pub fn new() -> Self {
        Self
    }

    /// Searches along `direction` from `point`.
    ///
    /// `merit` maps an evaluation to its merit value and `directional_deriv`
    /// is its derivative along `direction` at `point`. When the derivative is
    /// not negative (no descent guarantee) any strict decrease is accepted.
    #[allow(clippy::too_many_arguments)]
    pub fn search<P, F>(
        &self,
        problem: &P,
        bounds: &Bounds,
        point: &DVector,
        direction: &DVector,
        current_merit: f64,
        directional_deriv: f64,
        params: &LineSearchParams,
        merit: F,
    ) -> LineSearchResult
    where
        P: ConstrainedProblem + ?Sized,
        F: Fn(&Evaluation) -> f64,
    {
        self.search_with_correction(
            problem,
            bounds,
            point,
            direction,
            current_merit,
            directional_deriv,
            params,
            merit,
            |_: &Evaluation| None,
        )
    }

    /// Like [`search`](Self::search), with a second-order correction.
    ///
    /// When the first trial `P(x + α₀ p)` is finite but rejected, `correct`
    /// receives its evaluation and may return a correction `c`. The point
    /// `P(x + α₀ p + c)` is then tested against the same sufficient-decrease
    /// condition at `α₀`. If it fails too, backtracking continues along `p`.
    #[allow(clippy::too_many_arguments)]
    pub fn search_with_correction<P, F, C>(
        &self,
        problem: &P,
        bounds: &Bounds,
        point: &DVector,
        direction: &DVector,
        current_merit: f64,
        directional_deriv: f64,
        params: &LineSearchParams,
        merit: F,
        correct: C,
    ) -> LineSearchResult
    where
        P: ConstrainedProblem + ?Sized,
        F: Fn(&Evaluation) -> f64,
        C: FnOnce(&Evaluation) -> Option<DVector>,
    {
        let slope = directional_deriv.min(0.0);
        let acceptable = |trial_merit: f64, alpha: f64| {
            let sufficient = trial_merit <= current_merit + params.c1 * alpha * slope;
            let decreasing = slope < 0.0 || trial_merit < current_merit;
            trial_merit.is_finite() && sufficient && decreasing
        };

        let mut alpha = params.initial_step_size;
        let mut function_evals = 0;
        let mut non_finite_trials = 0;
        let mut correct = Some(correct);

        while alpha >= params.min_step_size {
            let mut trial = point + direction * alpha;
            bounds.project_in_place(&mut trial);

            let eval = problem.evaluate(&trial);
            function_evals += 1;

            if eval.is_finite() {
                let trial_merit = merit(&eval);
                trace!(alpha, trial_merit, current_merit, "line search trial");

                if acceptable(trial_merit, alpha) {
                    return LineSearchResult {
                        step_size: alpha,
                        new_point: Some(trial),
                        new_evaluation: Some(eval),
                        new_merit: trial_merit,
                        function_evals,
                        non_finite_trials,
                        success: true,
                        corrected: false,
                    };
                }

                if let Some(correction) = correct.take().and_then(|c| c(&eval)) {
                    let mut corrected = trial + correction;
                    bounds.project_in_place(&mut corrected);

                    let corrected_eval = problem.evaluate(&corrected);
                    function_evals += 1;
                    let corrected_merit = merit(&corrected_eval);
                    trace!(alpha, corrected_merit, current_merit, "corrected trial");

                    if corrected_eval.is_finite() && acceptable(corrected_merit, alpha) {
                        return LineSearchResult {
                            step_size: alpha,
                            new_point: Some(corrected),
                            new_evaluation: Some(corrected_eval),
                            new_merit: corrected_merit,
                            function_evals,
                            non_finite_trials,
                            success: true,
                            corrected: true,
                        };
                    }
                }
            } else {
                non_finite_trials += 1;
                warn!(alpha, "rejecting trial point with non-finite outputs");
            }

            // Only the first trial is ever corrected
            correct = None;
            alpha *= params.rho;
        }

        LineSearchResult {
            step_size: alpha,
            new_point: None,
            new_evaluation: None,
            new_merit: current_merit,
            function_evals,
            non_finite_trials,
            success: false,
            corrected: false,
        }
    }
}
