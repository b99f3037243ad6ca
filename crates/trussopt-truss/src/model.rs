//! Closed-form response of the two-bar truss.
//!
//! Two tubular members run from supports a distance `B` apart up to a
//! loaded apex at height `H`. With tube diameter `d` and wall thickness `t`:
//!
//! ```text
//! L          = sqrt((B/2)² + H²)
//! A          = π d t
//! I/A        = (d² + t²) / 8
//! stress     = P L / (2 A H)
//! deflection = P L³ / (2 E A H²)
//! buckling   = π² E (I/A) / L²
//! cost       = 2 ρ A L
//! ```
//!
//! The model is a pure function of the design and the parameters. It does
//! not guard against degenerate inputs: `H = 0` or `d = 0` yields infinite
//! or NaN outputs, which callers detect through
//! [`TrussResponse::is_finite`].

use crate::params::TrussParameters;
use std::f64::consts::PI;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Responses of the truss at one design.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrussResponse {
    /// Material cost of both members
    pub cost: f64,
    /// Axial member stress
    pub stress: f64,
    /// Euler buckling stress of a member
    pub buckling: f64,
    /// Vertical deflection of the apex
    pub deflection: f64,
}

impl TrussResponse {
    /// Returns true if every response is finite.
    pub fn is_finite(&self) -> bool {
        self.cost.is_finite()
            && self.stress.is_finite()
            && self.buckling.is_finite()
            && self.deflection.is_finite()
    }
}

/// Two-bar truss model with fixed parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrussModel {
    params: TrussParameters,
}

impl TrussModel {
    /// Creates a model over `params`.
    ///
    /// Parameters are not validated here; see [`TrussParameters::validate`].
    pub fn new(params: TrussParameters) -> Self {
        Self { params }
    }

    /// The fixed parameters.
    pub fn parameters(&self) -> &TrussParameters {
        &self.params
    }

    /// Member length for apex height `height`.
    pub fn member_length(&self, height: f64) -> f64 {
        (0.5 * self.params.span).hypot(height)
    }

    /// Cross-sectional area of a tube of diameter `diameter`.
    pub fn cross_section(&self, diameter: f64) -> f64 {
        PI * diameter * self.params.thickness
    }

    /// Evaluates every response at `(height, diameter)`.
    pub fn evaluate(&self, height: f64, diameter: f64) -> TrussResponse {
        let p = &self.params;
        let length = self.member_length(height);
        let area = self.cross_section(diameter);
        let gyration = (diameter * diameter + p.thickness * p.thickness) / 8.0;

        TrussResponse {
            cost: 2.0 * p.density * area * length,
            stress: p.load * length / (2.0 * area * height),
            buckling: PI * PI * p.modulus * gyration / (length * length),
            deflection: p.load * length.powi(3) / (2.0 * p.modulus * area * height * height),
        }
    }
}

impl Default for TrussModel {
    fn default() -> Self {
        Self::new(TrussParameters::default())
    }
}
