//! Powell-damped BFGS approximation of the Lagrangian Hessian.
//!
//! Constrained problems have no guarantee that `sᵀy > 0` along a step, so
//! the plain BFGS update could lose positive definiteness. Powell's damping
//! replaces `y` by
//!
//! ```text
//! r = θ y + (1 - θ) B s,   θ = 1                          if sᵀy >= 0.2 sᵀBs
//!                          θ = 0.8 sᵀBs / (sᵀBs - sᵀy)     otherwise
//! ```
//!
//! which keeps `sᵀr >= 0.2 sᵀBs > 0`, and then applies
//! `B ← B + r rᵀ / sᵀr - B s sᵀ B / sᵀBs`.

use trussopt_core::types::{DMatrix, DVector};

/// Below this curvature fraction the update is damped.
const DAMPING_THRESHOLD: f64 = 0.2;

/// Steps with `sᵀBs` under this value are too short to carry curvature.
const MIN_CURVATURE: f64 = 1e-16;

/// What an update did to the approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BfgsUpdate {
    /// Plain BFGS update
    Applied,
    /// Damped update with the given θ
    Damped(f64),
    /// Step too short; matrix unchanged
    Skipped,
}

/// Damped BFGS Hessian approximation.
#[derive(Debug, Clone, PartialEq)]
pub struct DampedBfgs {
    matrix: DMatrix,
}

impl DampedBfgs {
    /// Identity approximation for `dimension` variables.
    pub fn new(dimension: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dimension, dimension),
        }
    }

    /// Current approximation.
    pub fn matrix(&self) -> &DMatrix {
        &self.matrix
    }

    /// Resets to the identity.
    pub fn reset(&mut self) {
        let n = self.matrix.nrows();
        self.matrix = DMatrix::identity(n, n);
    }

    /// Updates with step `s` and Lagrangian gradient change `y`.
    pub fn update(&mut self, s: &DVector, y: &DVector) -> BfgsUpdate {
        let bs = &self.matrix * s;
        let sbs = s.dot(&bs);
        if !(sbs > MIN_CURVATURE) {
            return BfgsUpdate::Skipped;
        }

        let sy = s.dot(y);
        let theta = if sy >= DAMPING_THRESHOLD * sbs {
            1.0
        } else {
            (1.0 - DAMPING_THRESHOLD) * sbs / (sbs - sy)
        };
        let r = y * theta + &bs * (1.0 - theta);
        let sr = s.dot(&r);
        if !(sr.is_finite() && sr > 0.0) {
            return BfgsUpdate::Skipped;
        }

        self.matrix += &r * r.transpose() / sr - &bs * bs.transpose() / sbs;
        // Keep the approximation exactly symmetric
        self.matrix = (&self.matrix + self.matrix.transpose()) * 0.5;

        if theta < 1.0 {
            BfgsUpdate::Damped(theta)
        } else {
            BfgsUpdate::Applied
        }
    }
}
