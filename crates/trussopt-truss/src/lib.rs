//! Two-bar truss model and sizing problem.
//!
//! The truss is two tubular members meeting at a loaded apex. Its
//! responses (cost, member stress, Euler buckling stress and apex
//! deflection) follow from nine closed-form equations in the apex height
//! `H` and tube diameter `d`. This crate exposes:
//!
//! - [`TrussParameters`]: the fixed material, geometry and load parameters
//! - [`TrussModel`]: the pure map `(H, d) -> TrussResponse`
//! - [`TrussConstraint`]: stress, buckling and deflection limits as `g <= 0`
//! - [`TrussProblem`]: the model as a
//!   [`ConstrainedProblem`](trussopt_core::problem::ConstrainedProblem)
//! - [`TrussConfig`]: parameters, bounds and starting point of a run
//!
//! # Example
//!
//! ```rust
//! use trussopt_truss::{TrussModel, TrussParameters};
//!
//! let model = TrussModel::new(TrussParameters::default());
//! let response = model.evaluate(30.0, 3.0);
//! assert!(response.stress < 100.0);
//! ```

pub mod config;
pub mod constraints;
pub mod model;
pub mod params;
pub mod problem;

pub use config::{TrussConfig, DEFAULT_START};
pub use constraints::TrussConstraint;
pub use model::{TrussModel, TrussResponse};
pub use params::TrussParameters;
pub use problem::{TrussProblem, DIAMETER, HEIGHT};
