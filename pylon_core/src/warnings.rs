//! # Warnings
//!
//! Every solver returns its value together with the warnings it raised.
//! A warning is a tagged reason (degraded precision, failed check, policy
//! fallback). Warnings are accumulated down the pipeline and never removed;
//! envelope confidence is scored from their kinds alone.

use serde::{Deserialize, Serialize};

/// Classification of a warning. Confidence penalties are keyed on this,
/// never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Unusual but valid input, extrapolated table, etc.
    Generic,
    /// A code check did not pass
    FailedCheck,
    /// Valid input with no feasible solution
    NoFeasible,
    /// A stage could not be solved at all
    Abstain,
    /// Result needs review by an engineer (non-convergence, depth limits)
    EngineeringReview,
}

impl WarningKind {
    pub const ALL: [WarningKind; 5] = [
        WarningKind::Generic,
        WarningKind::FailedCheck,
        WarningKind::NoFeasible,
        WarningKind::Abstain,
        WarningKind::EngineeringReview,
    ];

    /// Confidence deduction applied per warning of this kind
    pub fn penalty(self) -> f64 {
        match self {
            WarningKind::Generic => 0.1,
            WarningKind::FailedCheck => 0.3,
            WarningKind::NoFeasible => 0.4,
            WarningKind::Abstain => 0.5,
            WarningKind::EngineeringReview => 0.3,
        }
    }
}

/// A single tagged warning raised by a solver stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Solver that raised it (e.g. "foundation")
    pub source: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn generic(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::Generic, source, message)
    }

    pub fn failed_check(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::FailedCheck, source, message)
    }

    pub fn no_feasible(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::NoFeasible, source, message)
    }

    pub fn abstain(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::Abstain, source, message)
    }

    pub fn engineering_review(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::EngineeringReview, source, message)
    }
}

/// A solver value plus the warnings raised while producing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solved<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Solved<T> {
    pub fn new(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// A value with no warnings
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn has_kind(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Solved<U> {
        Solved {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_table() {
        assert_eq!(WarningKind::Generic.penalty(), 0.1);
        assert_eq!(WarningKind::FailedCheck.penalty(), 0.3);
        assert_eq!(WarningKind::NoFeasible.penalty(), 0.4);
        assert_eq!(WarningKind::Abstain.penalty(), 0.5);
        assert_eq!(WarningKind::EngineeringReview.penalty(), 0.3);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&WarningKind::EngineeringReview).unwrap();
        assert_eq!(json, "\"engineering_review\"");
    }

    #[test]
    fn test_solved_map_keeps_warnings() {
        let solved = Solved::new(2, vec![Warning::generic("test", "tall")]);
        let mapped = solved.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert!(mapped.has_kind(WarningKind::Generic));
        assert!(!mapped.has_kind(WarningKind::Abstain));
    }
}
