//! # pylon_core - Sign Structure Solver Pipeline
//!
//! `pylon_core` designs pole-mounted signs: wind loads, pole selection,
//! pier embedment, anchor bolts and fatigue. Every answer is wrapped in a
//! confidence-scored, content-hashed envelope. A reliability engine checks
//! and calibrates the solvers, and a store-backed resilience layer runs
//! calls to external services through an at-least-once task queue.
//!
//! ## Design Philosophy
//!
//! - **Pure solvers**: input in, `Solved { value, warnings }` out; no shared state
//! - **Degrade, don't fail**: only malformed input is an error, everything
//!   else is a warning that lowers confidence
//! - **Deterministic**: identical inputs give byte-identical envelopes
//! - **JSON-First**: all inputs, results and store records are serde types
//!
//! ## Quick Start
//!
//! ```rust
//! use pylon_core::calculations::wind_load::{calculate, WindLoadInput};
//! use pylon_core::envelope::{DuplicatePolicy, ResultEnvelope};
//! use pylon_core::loads::{Exposure, Panel, SiteLoads};
//! use pylon_core::settings::SolverSettings;
//!
//! let input = WindLoadInput::new(SiteLoads::new(115.0, Exposure::C), vec![Panel::new(10.0, 4.0)], 13.0);
//! let solved = calculate(&input, &SolverSettings::default()).unwrap();
//! let envelope = ResultEnvelope::from_solved(
//!     pylon_core::calculations::wind_load::SOLVER,
//!     solved,
//!     DuplicatePolicy::Penalize,
//! )
//! .unwrap();
//! assert_eq!(envelope.confidence(), 1.0);
//! ```
//!
//! ## Modules
//!
//! - [`calculations`] - Wind load, member selection, foundation, connection and fatigue solvers
//! - [`pipeline`] - Runs the solvers in order for one sign
//! - [`envelope`] - Result envelopes, confidence scoring and canonical hashing
//! - [`reliability`] - Monte Carlo reliability, sensitivity, auto-tuning, field validation
//! - [`resilience`] - Circuit breaker, idempotency cache, dead letters, task queue
//! - [`materials`] - Steel grades and the section catalog
//! - [`loads`] - Site wind parameters and sign panels
//! - [`settings`] - Engine settings file
//! - [`units`] - Type-safe unit wrappers
//! - [`warnings`] - Tagged solver warnings
//! - [`errors`] - Structured error types
//! - [`file_io`] - Atomic writes and file locking

pub mod calculations;
pub mod envelope;
pub mod errors;
pub mod file_io;
pub mod loads;
pub mod materials;
pub mod pipeline;
pub mod reliability;
pub mod resilience;
pub mod settings;
pub mod units;
pub mod warnings;

// Re-export commonly used types at crate root for convenience
pub use calculations::CalculationItem;
pub use envelope::{DuplicatePolicy, ResultEnvelope};
pub use errors::{CalcError, CalcResult};
pub use materials::steel::{builtin_catalog, SectionCatalog};
pub use pipeline::{Pipeline, PipelineReport, SignRequest};
pub use settings::{load_settings, save_settings, EngineSettings};
pub use warnings::{Solved, Warning, WarningKind};
