//! Box bounds on the design variables.
//!
//! Every iterate produced by an optimizer is projected back into the box,
//! so the bounds are the one constraint that holds exactly at all times.
//! A variable whose lower and upper bounds coincide is fixed: optimizers
//! never move it and gradient estimators never perturb it.

use crate::{
    error::{ProblemError, Result},
    types::DVector,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lower and upper bounds for each design variable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    lower: DVector,
    upper: DVector,
}

impl Bounds {
    /// Creates bounds from lower and upper vectors.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vectors differ in length and
    /// `InvalidBounds` if a bound is not finite or `lower > upper`.
    pub fn new(lower: DVector, upper: DVector) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(ProblemError::dimension_mismatch(lower.len(), upper.len()));
        }

        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ProblemError::invalid_bounds(index, lo, hi));
            }
        }

        Ok(Self { lower, upper })
    }

    /// Creates bounds from `(lower, upper)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let lower = DVector::from_iterator(pairs.len(), pairs.iter().map(|&(lo, _)| lo));
        let upper = DVector::from_iterator(pairs.len(), pairs.iter().map(|&(_, hi)| hi));
        Self::new(lower, upper)
    }

    /// Number of bounded variables.
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Lower bounds.
    pub fn lower(&self) -> &DVector {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &DVector {
        &self.upper
    }

    /// Returns true if variable `index` cannot move.
    pub fn is_fixed(&self, index: usize) -> bool {
        self.lower[index] == self.upper[index]
    }

    /// Indices of the variables that are free to move, in ascending order.
    pub fn free_indices(&self) -> Vec<usize> {
        (0..self.dimension()).filter(|&i| !self.is_fixed(i)).collect()
    }

    /// Returns true if `point` lies inside the box.
    pub fn contains(&self, point: &DVector) -> bool {
        point.len() == self.dimension()
            && point
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&x, (&lo, &hi))| x >= lo && x <= hi)
    }

    /// Projects `point` onto the box in place.
    ///
    /// Fixed variables are set exactly to their bound.
    pub fn project_in_place(&self, point: &mut DVector) {
        for (i, x) in point.iter_mut().enumerate() {
            *x = x.clamp(self.lower[i], self.upper[i]);
        }
    }

    /// Returns the projection of `point` onto the box.
    pub fn project(&self, point: &DVector) -> DVector {
        let mut projected = point.clone();
        self.project_in_place(&mut projected);
        projected
    }

    /// Checks that `point` has the dimension of the box.
    pub fn check_dimension(&self, point: &DVector) -> Result<()> {
        if point.len() == self.dimension() {
            Ok(())
        } else {
            Err(ProblemError::dimension_mismatch(
                self.dimension(),
                point.len(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn truss_bounds() -> Bounds {
        Bounds::from_pairs(&[(10.0, 30.0), (1.0, 3.0)]).unwrap()
    }

    #[test]
    fn test_bounds_validation() {
        assert!(Bounds::from_pairs(&[(10.0, 30.0), (1.0, 3.0)]).is_ok());
        assert!(Bounds::from_pairs(&[(2.0, 2.0)]).is_ok());

        let err = Bounds::from_pairs(&[(10.0, 30.0), (3.0, 1.0)]).unwrap_err();
        assert!(matches!(err, ProblemError::InvalidBounds { index: 1, .. }));

        let err = Bounds::from_pairs(&[(f64::NAN, 1.0)]).unwrap_err();
        assert!(matches!(err, ProblemError::InvalidBounds { index: 0, .. }));

        let err = Bounds::new(DVector::zeros(2), DVector::zeros(3)).unwrap_err();
        assert!(matches!(err, ProblemError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_fixed_variables() {
        let bounds = Bounds::from_pairs(&[(10.0, 30.0), (2.0, 2.0)]).unwrap();
        assert!(!bounds.is_fixed(0));
        assert!(bounds.is_fixed(1));
        assert_eq!(bounds.free_indices(), vec![0]);
    }

    #[test]
    fn test_projection() {
        let bounds = truss_bounds();
        let point = DVector::from_vec(vec![35.0, 0.5]);
        let projected = bounds.project(&point);
        assert_eq!(projected, DVector::from_vec(vec![30.0, 1.0]));
        assert!(bounds.contains(&projected));
        assert!(!bounds.contains(&point));
    }

    proptest! {
        #[test]
        fn prop_projection_lands_in_box(h in -100.0..100.0f64, d in -10.0..10.0f64) {
            let bounds = truss_bounds();
            let projected = bounds.project(&DVector::from_vec(vec![h, d]));
            prop_assert!(bounds.contains(&projected));
        }

        #[test]
        fn prop_projection_is_idempotent(h in -100.0..100.0f64, d in -10.0..10.0f64) {
            let bounds = truss_bounds();
            let once = bounds.project(&DVector::from_vec(vec![h, d]));
            let twice = bounds.project(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
