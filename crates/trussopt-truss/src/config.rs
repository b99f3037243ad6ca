//! Sizing configuration: parameters, design bounds and starting point.

use crate::{
    params::TrussParameters,
    problem::{TrussProblem, DIAMETER, HEIGHT},
};
use trussopt_core::{
    bounds::Bounds,
    error::{ProblemError, Result},
    types::DVector,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default starting design `(H, d)`.
pub const DEFAULT_START: (f64, f64) = (30.0, 3.0);

/// Input record of a sizing run.
///
/// A pair with `lower == upper` fixes that variable at the bound.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrussConfig {
    /// Fixed model parameters
    pub parameters: TrussParameters,
    /// `[lower, upper]` for the apex height `H`
    pub height_bounds: (f64, f64),
    /// `[lower, upper]` for the tube diameter `d`
    pub diameter_bounds: (f64, f64),
    /// Starting design `(H, d)`; [`DEFAULT_START`] when absent
    pub start: Option<(f64, f64)>,
}

impl Default for TrussConfig {
    fn default() -> Self {
        Self {
            parameters: TrussParameters::default(),
            height_bounds: (10.0, 30.0),
            diameter_bounds: (1.0, 3.0),
            start: None,
        }
    }
}

impl TrussConfig {
    /// Creates the nominal configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model parameters.
    pub fn with_parameters(mut self, parameters: TrussParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the bounds on `H`.
    pub fn with_height_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.height_bounds = (lower, upper);
        self
    }

    /// Sets the bounds on `d`.
    pub fn with_diameter_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.diameter_bounds = (lower, upper);
        self
    }

    /// Fixes `H` at `height`.
    pub fn with_fixed_height(self, height: f64) -> Self {
        self.with_height_bounds(height, height)
    }

    /// Fixes `d` at `diameter`.
    pub fn with_fixed_diameter(self, diameter: f64) -> Self {
        self.with_diameter_bounds(diameter, diameter)
    }

    /// Sets the starting design.
    pub fn with_start(mut self, height: f64, diameter: f64) -> Self {
        self.start = Some((height, diameter));
        self
    }

    /// Validates parameters, bounds and the starting point.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` for a non-positive or non-finite parameter,
    ///   bound or start coordinate
    /// - `InvalidBounds` when a lower bound exceeds its upper bound
    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;

        let pairs = [
            (HEIGHT, "H", self.height_bounds),
            (DIAMETER, "d", self.diameter_bounds),
        ];
        for (index, symbol, (lower, upper)) in pairs {
            for (side, value) in [("lower", lower), ("upper", upper)] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(ProblemError::invalid_parameter(
                        format!("{symbol}.{side}"),
                        value,
                        "bounds must be positive and finite",
                    ));
                }
            }
            if lower > upper {
                return Err(ProblemError::invalid_bounds(index, lower, upper));
            }
        }

        if let Some((height, diameter)) = self.start {
            for (symbol, value) in [("H0", height), ("d0", diameter)] {
                if !value.is_finite() {
                    return Err(ProblemError::invalid_parameter(
                        symbol,
                        value,
                        "starting point must be finite",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Box bounds on `(H, d)`.
    pub fn bounds(&self) -> Result<Bounds> {
        self.validate()?;
        Bounds::from_pairs(&[self.height_bounds, self.diameter_bounds])
    }

    /// Starting design as a vector, before any projection into the bounds.
    pub fn initial_point(&self) -> DVector {
        let (height, diameter) = self.start.unwrap_or(DEFAULT_START);
        DVector::from_vec(vec![height, diameter])
    }

    /// Builds the optimization problem.
    pub fn problem(&self) -> Result<TrussProblem> {
        self.validate()?;
        TrussProblem::new(self.parameters)
    }
}
