//! # trussopt
//!
//! Minimum-cost sizing of a symmetric two-bar truss under stress,
//! buckling and deflection limits.
//!
//! The workspace is split into three crates, re-exported here:
//!
//! - [`trussopt_core`]: problem, gradient, line search and optimizer abstractions
//! - [`trussopt_truss`]: the closed-form truss model and its constraints
//! - [`trussopt_optim`]: the SQP optimizer
//!
//! # Quick start
//!
//! ```rust,no_run
//! use trussopt::prelude::*;
//!
//! let design = size_truss(&TrussConfig::default())?;
//! assert!(design.feasible);
//! println!("{design}");
//! # Ok::<(), OptimizerError>(())
//! ```
//!
//! Holding a variable fixed is done through its bounds:
//!
//! ```rust,no_run
//! use trussopt::prelude::*;
//!
//! let config = TrussConfig::default().with_fixed_height(20.0);
//! let design = size_truss(&config)?;
//! assert_eq!(design.height, 20.0);
//! # Ok::<(), OptimizerError>(())
//! ```

pub mod sizing;

pub use trussopt_core;
pub use trussopt_optim;
pub use trussopt_truss;

pub use sizing::{
    size_truss, size_truss_with, size_truss_with_callback, ConstraintMargin, TrussDesign,
};

/// Everything needed to size a truss.
pub mod prelude {
    pub use crate::sizing::{
        size_truss, size_truss_with, size_truss_with_callback, ConstraintMargin, TrussDesign,
    };
    pub use trussopt_core::prelude::*;
    pub use trussopt_optim::{Sqp, SqpConfig};
    pub use trussopt_truss::{
        TrussConfig, TrussConstraint, TrussModel, TrussParameters, TrussProblem, TrussResponse,
    };
}
