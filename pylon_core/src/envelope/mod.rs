//! # Result Envelopes
//!
//! Every solver answer leaves the core wrapped in a [`ResultEnvelope`]:
//!
//! ```text
//! ResultEnvelope
//! ├── result        (payload, floats rounded to 3 decimals)
//! ├── assumptions   (warning messages, in the order raised)
//! ├── confidence    (1.0 minus warning penalties, clamped to [0, 1])
//! ├── content_hash  (sha256 of the canonical result JSON)
//! └── trace         (solver name/version and the structured warnings)
//! ```
//!
//! Confidence depends only on warning kinds and the envelope carries no
//! wall-clock or random data, so identical inputs give byte-identical
//! envelopes. Success and degraded answers share this one shape.
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::envelope::{DuplicatePolicy, ResultEnvelope, SolverInfo};
//! use pylon_core::warnings::Warning;
//!
//! const DEMO: SolverInfo = SolverInfo::new("demo", "1.0.0");
//! let warnings = vec![Warning::generic("demo", "extrapolated table")];
//! let envelope = ResultEnvelope::build(DEMO, 42.0, &warnings, DuplicatePolicy::Penalize).unwrap();
//! assert_eq!(envelope.confidence(), 0.9);
//! assert_eq!(envelope.content_hash().len(), 64);
//! assert!(envelope.verify_hash().unwrap());
//! ```

pub mod canonical;

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::CalcResult;
use crate::warnings::{Solved, Warning, WarningKind};

pub use canonical::{canonical_json, content_hash, round_to, PRECISION};

/// Identity of the solver that produced a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl SolverInfo {
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self { name, version }
    }
}

/// How a warning raised identically by two stages is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every warning instance is penalized
    #[default]
    Penalize,
    /// Each distinct (kind, message) is penalized once
    Deduplicate,
}

/// Confidence score for a set of warnings.
///
/// Starts at 1.0, subtracts the fixed penalty of each warning's kind and
/// clamps to [0, 1]. Rounded to [`PRECISION`] decimals.
pub fn score_confidence(warnings: &[Warning], policy: DuplicatePolicy) -> f64 {
    let penalty: f64 = match policy {
        DuplicatePolicy::Penalize => warnings.iter().map(|w| w.kind.penalty()).sum(),
        DuplicatePolicy::Deduplicate => {
            let distinct: BTreeSet<(WarningKind, &str)> =
                warnings.iter().map(|w| (w.kind, w.message.as_str())).collect();
            distinct.iter().map(|(kind, _)| kind.penalty()).sum()
        }
    };
    round_to((1.0 - penalty).clamp(0.0, 1.0), PRECISION)
}

/// Provenance carried alongside a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub solver: String,
    pub solver_version: String,
    pub warnings: Vec<Warning>,
}

/// Immutable, confidence-scored, content-hashed wrapper for a solver result.
/// Fields are read through accessors; the only way to build one is
/// [`ResultEnvelope::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct ResultEnvelope<T> {
    #[serde(serialize_with = "canonical::serialize_rounded")]
    result: T,
    assumptions: Vec<String>,
    confidence: f64,
    content_hash: String,
    trace: Trace,
}

impl<T> ResultEnvelope<T> {
    pub fn result(&self) -> &T {
        &self.result
    }

    /// Unwrap the payload, dropping the envelope
    pub fn into_result(self) -> T {
        self.result
    }

    pub fn assumptions(&self) -> &[String] {
        &self.assumptions
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Structured warnings behind the confidence score
    pub fn warnings(&self) -> &[Warning] {
        &self.trace.warnings
    }
}

impl<T: Serialize> ResultEnvelope<T> {
    /// Wrap `result` with the given warnings.
    ///
    /// Pipeline stages pass every warning accumulated so far, not only their
    /// own, which keeps confidence non-increasing from stage to stage.
    pub fn build(
        solver: SolverInfo,
        result: T,
        warnings: &[Warning],
        policy: DuplicatePolicy,
    ) -> CalcResult<Self> {
        let content_hash = content_hash(&result)?;
        let confidence = score_confidence(warnings, policy);
        let assumptions = warnings
            .iter()
            .map(|w| format!("{}: {}", w.source, w.message))
            .collect();

        tracing::debug!(
            solver = solver.name,
            confidence,
            hash = %content_hash,
            "built result envelope"
        );

        Ok(Self {
            result,
            assumptions,
            confidence,
            content_hash,
            trace: Trace {
                solver: solver.name.to_string(),
                solver_version: solver.version.to_string(),
                warnings: warnings.to_vec(),
            },
        })
    }

    /// Wrap a solver's own output with no upstream warnings
    pub fn from_solved(
        solver: SolverInfo,
        solved: Solved<T>,
        policy: DuplicatePolicy,
    ) -> CalcResult<Self> {
        Self::build(solver, solved.value, &solved.warnings, policy)
    }

    /// True when any warning lowered confidence
    pub fn is_degraded(&self) -> bool {
        self.confidence < 1.0
    }

    /// Whether the stored hash still matches the payload, e.g. after
    /// reading an envelope back from disk
    pub fn verify_hash(&self) -> CalcResult<bool> {
        Ok(content_hash(&self.result)? == self.content_hash)
    }

    /// Canonical JSON of the whole envelope (for persisting)
    pub fn to_canonical_json(&self) -> CalcResult<String> {
        canonical_json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_SOLVER: SolverInfo = SolverInfo::new("test", "0.0.1");

    #[test]
    fn test_clean_result_has_full_confidence() {
        let env = ResultEnvelope::build(TEST_SOLVER, json!({"x": 1.0}), &[], DuplicatePolicy::Penalize)
            .unwrap();
        assert_eq!(env.confidence(), 1.0);
        assert!(env.assumptions().is_empty());
        assert!(!env.is_degraded());
        assert_eq!(env.trace().solver, "test");
    }

    #[test]
    fn test_each_kind_penalty() {
        let cases = [
            (Warning::generic("s", "m"), 0.9),
            (Warning::failed_check("s", "m"), 0.7),
            (Warning::no_feasible("s", "m"), 0.6),
            (Warning::abstain("s", "m"), 0.5),
            (Warning::engineering_review("s", "m"), 0.7),
        ];
        for (warning, expected) in cases {
            let score = score_confidence(&[warning], DuplicatePolicy::Penalize);
            assert!((score - expected).abs() < 1e-12, "{:?}", score);
        }
    }

    #[test]
    fn test_confidence_clamped_at_zero() {
        let warnings = vec![
            Warning::abstain("a", "1"),
            Warning::abstain("a", "2"),
            Warning::no_feasible("a", "3"),
        ];
        assert_eq!(score_confidence(&warnings, DuplicatePolicy::Penalize), 0.0);
    }

    #[test]
    fn test_duplicate_policy() {
        let warnings = vec![
            Warning::generic("load", "height exceeds 40 ft"),
            Warning::generic("foundation", "height exceeds 40 ft"),
        ];
        assert_eq!(score_confidence(&warnings, DuplicatePolicy::Penalize), 0.8);
        assert_eq!(score_confidence(&warnings, DuplicatePolicy::Deduplicate), 0.9);
    }

    #[test]
    fn test_hash_depends_on_result_only() {
        let a = ResultEnvelope::build(TEST_SOLVER, json!({"p": 24.95}), &[], DuplicatePolicy::Penalize)
            .unwrap();
        let b = ResultEnvelope::build(
            TEST_SOLVER,
            json!({"p": 24.95}),
            &[Warning::generic("t", "w")],
            DuplicatePolicy::Penalize,
        )
        .unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert!(b.confidence() < a.confidence());
    }

    #[test]
    fn test_serialized_result_is_rounded() {
        let env = ResultEnvelope::build(TEST_SOLVER, json!({"p": 24.95123}), &[], DuplicatePolicy::Penalize)
            .unwrap();
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"p\":24.951"));

        let back: ResultEnvelope<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content_hash(), env.content_hash());
        assert!(back.verify_hash().unwrap());
    }

    #[test]
    fn test_tampered_envelope_fails_hash_check() {
        let env = ResultEnvelope::build(TEST_SOLVER, json!({"depth_ft": 7.78}), &[], DuplicatePolicy::Penalize)
            .unwrap();
        assert!(env.verify_hash().unwrap());
        assert_eq!(*env.result(), json!({"depth_ft": 7.78}));

        let edited = serde_json::to_string(&env).unwrap().replace("7.78", "5.0");
        let back: ResultEnvelope<serde_json::Value> = serde_json::from_str(&edited).unwrap();
        assert!(!back.verify_hash().unwrap());
        assert_eq!(env.clone().into_result(), json!({"depth_ft": 7.78}));
    }

    #[test]
    fn test_envelope_is_deterministic() {
        let warnings = [Warning::generic("s", "m")];
        let a = ResultEnvelope::build(TEST_SOLVER, json!({"v": [1.0, 2.5]}), &warnings, DuplicatePolicy::Penalize)
            .unwrap();
        let b = ResultEnvelope::build(TEST_SOLVER, json!({"v": [1.0, 2.5]}), &warnings, DuplicatePolicy::Penalize)
            .unwrap();
        assert_eq!(a.to_canonical_json().unwrap(), b.to_canonical_json().unwrap());
    }
}
