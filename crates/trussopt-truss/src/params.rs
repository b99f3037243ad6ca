//! Fixed parameters of the two-bar truss.
//!
//! Parameters are set once before a sizing run and never change during it.
//! Units follow the classic textbook example the defaults come from: inches,
//! kips and ksi, with density expressed per unit volume so that the cost is a
//! weight-proportional figure.

use trussopt_core::error::{ProblemError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Material, geometry and load parameters of the truss.
///
/// Serialized field names follow the engineering symbols
/// (`B`, `t`, `E`, `P`, `rho`, `stressMax`, `deflectionMax`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrussParameters {
    /// Span between the two supports, `B`
    #[cfg_attr(feature = "serde", serde(rename = "B"))]
    pub span: f64,

    /// Tube wall thickness, `t`
    #[cfg_attr(feature = "serde", serde(rename = "t"))]
    pub thickness: f64,

    /// Young's modulus, `E`
    #[cfg_attr(feature = "serde", serde(rename = "E"))]
    pub modulus: f64,

    /// Vertical load at the apex, `P`
    #[cfg_attr(feature = "serde", serde(rename = "P"))]
    pub load: f64,

    /// Material density (cost per unit volume), `rho`
    #[cfg_attr(feature = "serde", serde(rename = "rho"))]
    pub density: f64,

    /// Allowable member stress
    #[cfg_attr(feature = "serde", serde(rename = "stressMax"))]
    pub max_stress: f64,

    /// Allowable apex deflection
    #[cfg_attr(feature = "serde", serde(rename = "deflectionMax"))]
    pub max_deflection: f64,
}

impl Default for TrussParameters {
    fn default() -> Self {
        Self {
            span: 60.0,
            thickness: 0.15,
            modulus: 30000.0,
            load: 66.0,
            density: 0.3,
            max_stress: 100.0,
            max_deflection: 0.25,
        }
    }
}

impl TrussParameters {
    /// Creates the default parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the span `B`.
    pub fn with_span(mut self, span: f64) -> Self {
        self.span = span;
        self
    }

    /// Sets the wall thickness `t`.
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    /// Sets Young's modulus `E`.
    pub fn with_modulus(mut self, modulus: f64) -> Self {
        self.modulus = modulus;
        self
    }

    /// Sets the load `P`.
    pub fn with_load(mut self, load: f64) -> Self {
        self.load = load;
        self
    }

    /// Sets the density `rho`.
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Sets the allowable stress.
    pub fn with_max_stress(mut self, max_stress: f64) -> Self {
        self.max_stress = max_stress;
        self
    }

    /// Sets the allowable deflection.
    pub fn with_max_deflection(mut self, max_deflection: f64) -> Self {
        self.max_deflection = max_deflection;
        self
    }

    /// Parameters as `(symbol, value)` pairs.
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("B", self.span),
            ("t", self.thickness),
            ("E", self.modulus),
            ("P", self.load),
            ("rho", self.density),
            ("stressMax", self.max_stress),
            ("deflectionMax", self.max_deflection),
        ]
    }

    /// Checks that every parameter is a positive finite number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending symbol.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.entries() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ProblemError::invalid_parameter(
                    name,
                    value,
                    "must be positive and finite",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = TrussParameters::default();
        assert_eq!(params.span, 60.0);
        assert_eq!(params.max_deflection, 0.25);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validation_names_offender() {
        let err = TrussParameters::new().with_thickness(0.0).validate().unwrap_err();
        match err {
            ProblemError::InvalidParameter { name, value, .. } => {
                assert_eq!(name, "t");
                assert_eq!(value, 0.0);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(TrussParameters::new().with_load(-66.0).validate().is_err());
        assert!(TrussParameters::new().with_modulus(f64::NAN).validate().is_err());
        assert!(TrussParameters::new()
            .with_max_stress(f64::INFINITY)
            .validate()
            .is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_uses_symbols() {
        let json = r#"{"B": 50.0, "stressMax": 90.0}"#;
        let params: TrussParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.span, 50.0);
        assert_eq!(params.max_stress, 90.0);
        assert_eq!(params.thickness, 0.15);

        let back = serde_json::to_string(&params).unwrap();
        assert!(back.contains("\"deflectionMax\":0.25"));
    }
}
