//! Errors produced by the resilience layer.

use thiserror::Error;

/// Result type for store, breaker, idempotency and queue operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResilienceError {
    /// An external call failed
    #[error("dependency '{dependency}' failed: {message}")]
    Dependency {
        dependency: String,
        message: String,
        retriable: bool,
    },

    #[error("circuit open for '{dependency}'")]
    CircuitOpen { dependency: String },

    #[error("attempt exceeded its {budget_ms}ms budget")]
    Timeout { budget_ms: u64 },

    #[error("shared store error: {reason}")]
    Store { reason: String },

    /// Compare-and-swap lost too many races
    #[error("gave up on contended key '{key}'")]
    Contention { key: String },

    /// The same idempotent action is already running elsewhere
    #[error("action for '{key}' is already in progress")]
    InProgress { key: String },

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ResilienceError {
    /// A failed call that may succeed on retry
    pub fn transient(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        ResilienceError::Dependency {
            dependency: dependency.into(),
            message: message.into(),
            retriable: true,
        }
    }

    /// A failed call that will fail again (rejected request, 4xx)
    pub fn permanent(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        ResilienceError::Dependency {
            dependency: dependency.into(),
            message: message.into(),
            retriable: false,
        }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        ResilienceError::Store {
            reason: reason.into(),
        }
    }

    /// Whether a task failing with this error should be retried
    pub fn is_retriable(&self) -> bool {
        match self {
            ResilienceError::Dependency { retriable, .. } => *retriable,
            ResilienceError::Timeout { .. }
            | ResilienceError::Store { .. }
            | ResilienceError::Contention { .. }
            | ResilienceError::InProgress { .. } => true,
            ResilienceError::CircuitOpen { .. }
            | ResilienceError::InvalidTransition { .. }
            | ResilienceError::Serialization(_) => false,
        }
    }
}

impl From<serde_json::Error> for ResilienceError {
    fn from(err: serde_json::Error) -> Self {
        ResilienceError::Serialization(err.to_string())
    }
}

impl From<crate::errors::CalcError> for ResilienceError {
    fn from(err: crate::errors::CalcError) -> Self {
        ResilienceError::Store {
            reason: err.to_string(),
        }
    }
}
