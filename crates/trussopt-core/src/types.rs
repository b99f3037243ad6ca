//! Type aliases and numerical constants.

use nalgebra::{Dyn, OMatrix, OVector};

/// Type alias for a dynamically-sized vector.
pub type DVector = OVector<f64, Dyn>;

/// Type alias for a dynamically-sized matrix.
pub type DMatrix = OMatrix<f64, Dyn, Dyn>;

/// Numerical constants shared by the solvers.
pub mod constants {
    /// Default absolute tolerance on constraint violation.
    pub const CONSTRAINT_TOLERANCE: f64 = 1e-6;

    /// Default tolerance on the relative step length.
    pub const STEP_TOLERANCE: f64 = 1e-6;

    /// Default relative perturbation for finite differences.
    ///
    /// Close to the square root of machine epsilon, the usual balance
    /// between truncation and rounding error for forward differences.
    pub const FINITE_DIFFERENCE_STEP: f64 = 1e-7;

    /// Smallest line search step before the search is declared failed.
    pub const MIN_STEP_SIZE: f64 = 1e-10;

    /// Tikhonov shift used when a near-singular system must be solved.
    pub const REGULARIZATION: f64 = 1e-10;
}
