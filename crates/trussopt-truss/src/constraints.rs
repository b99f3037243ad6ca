//! Design constraints of the truss, normalized to `g <= 0`.

use crate::{model::TrussResponse, params::TrussParameters};
use std::fmt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One inequality constraint on the truss responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrussConstraint {
    /// `stress - stressMax <= 0`
    Stress,
    /// `stress - buckling <= 0`
    Buckling,
    /// `deflection - deflectionMax <= 0`
    Deflection,
}

impl TrussConstraint {
    /// All constraints in evaluation order.
    pub const ALL: [Self; 3] = [Self::Stress, Self::Buckling, Self::Deflection];

    /// Short identifier used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Stress => "stress",
            Self::Buckling => "buckling",
            Self::Deflection => "deflection",
        }
    }

    /// Position of the constraint in the constraint vector.
    pub fn index(self) -> usize {
        match self {
            Self::Stress => 0,
            Self::Buckling => 1,
            Self::Deflection => 2,
        }
    }

    /// Looks up the constraint stored at `index`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Normalized value `g`; the design satisfies the constraint when `g <= 0`.
    pub fn value(self, response: &TrussResponse, params: &TrussParameters) -> f64 {
        match self {
            Self::Stress => response.stress - params.max_stress,
            Self::Buckling => response.stress - response.buckling,
            Self::Deflection => response.deflection - params.max_deflection,
        }
    }
}

impl fmt::Display for TrussConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relation = match self {
            Self::Stress => "stress <= stressMax",
            Self::Buckling => "stress <= buckling",
            Self::Deflection => "deflection <= deflectionMax",
        };
        f.write_str(relation)
    }
}
