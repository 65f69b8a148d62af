//! # Reliability Engine
//!
//! Probabilistic checks that sit beside the deterministic solvers:
//!
//! - [`monte_carlo`] - failure probability and reliability index of `R - Q`
//! - [`sensitivity`] - which uncertain inputs drive an output
//! - [`tuning`] - bounded calibration of the footing model against field data
//! - [`field_validation`] - fit statistics of predictions vs observations
//! - [`sampling`] - seeded normal variates and distribution functions
//!
//! Every stochastic routine takes an explicit seed, so results (and their
//! envelope hashes) are reproducible.

pub mod field_validation;
pub mod monte_carlo;
pub mod sampling;
pub mod sensitivity;
pub mod tuning;

pub use field_validation::ValidationStats;
pub use monte_carlo::{simulate, ReliabilityInput, ReliabilityResult};
pub use sampling::{uncertainty_band, UncertaintyBand};
pub use sensitivity::{SensitivityResult, UncertainInput};
pub use tuning::{AutoTuner, FieldRecord, SafetyFloors, TuningParams};
