//! Constrained optimizers for small dense design problems.
//!
//! The main entry point is [`Sqp`], a sequential quadratic programming
//! method for problems of the form
//!
//! ```text
//! minimize f(x)  subject to  g(x) <= 0,  lower <= x <= upper
//! ```
//!
//! built from the pieces in this crate:
//!
//! - [`DenseQp`] / [`SqpSubproblem`]: the QP model and its exact solver
//! - [`DampedBfgs`]: positive-definite Lagrangian Hessian approximation
//! - [`SecondOrderCorrection`]: rescues full steps rejected on curved constraints
//! - [`FeasibilityRestoration`]: fallback when the QP model is inconsistent
//! - [`OptimizationState`]: per-run state with best-iterate tracking
//!
//! # Example
//!
//! ```rust,ignore
//! use trussopt_core::prelude::*;
//! use trussopt_optim::{Sqp, SqpConfig};
//!
//! let mut sqp = Sqp::new(SqpConfig::default());
//! let result = sqp.optimize(&problem, &bounds, &initial_point)?;
//! println!("{} after {} iterations", result.termination_reason, result.iterations);
//! ```

pub mod bfgs;
pub mod correction;
pub mod qp;
pub mod restoration;
pub mod sqp;
pub mod state;

pub use bfgs::{BfgsUpdate, DampedBfgs};
pub use correction::SecondOrderCorrection;
pub use qp::{DenseQp, QpSolution, SqpSubproblem, SubproblemStep};
pub use restoration::{FeasibilityRestoration, RestorationStep};
pub use sqp::{Sqp, SqpConfig};
pub use state::{Iterate, OptimizationState, Phase};

/// Prelude for the optimizer crate.
pub mod prelude {
    pub use crate::{Sqp, SqpConfig};
    pub use trussopt_core::prelude::*;
}
