//! # Error Types
//!
//! Hard errors that cross the solver boundary. Only malformed input,
//! rejected tuning and file problems are errors here; "no feasible section"
//! and "did not converge" are ordinary outcomes carried as
//! [`Warning`](crate::warnings::Warning)s inside the result.
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::errors::{CalcError, CalcResult};
//!
//! fn validate_diameter(diameter_ft: f64) -> CalcResult<()> {
//!     if diameter_ft <= 0.0 {
//!         return Err(CalcError::invalid_input(
//!             "diameter_ft",
//!             diameter_ft.to_string(),
//!             "Footing diameter must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pylon_core solver operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for solver, catalog and settings operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// An input value is invalid (non-positive, non-finite, empty list...).
    /// Never retried.
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// Section designation not present in the catalog
    #[error("Section not found: {designation}")]
    SectionNotFound { designation: String },

    /// Catalog source could not be parsed
    #[error("Catalog error: {reason}")]
    CatalogError { reason: String },

    /// A tuned parameter set would breach a safety limit
    #[error("Safety violation: {parameter} = {value} breaches the safety limit {floor}")]
    SafetyViolation {
        parameter: String,
        value: f64,
        floor: f64,
    },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another process
    #[error("File locked: '{path}' is locked by another process")]
    FileLocked { path: String },

    /// JSON or CSV (de)serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a SectionNotFound error
    pub fn section_not_found(designation: impl Into<String>) -> Self {
        CalcError::SectionNotFound {
            designation: designation.into(),
        }
    }

    /// Create a CatalogError
    pub fn catalog(reason: impl Into<String>) -> Self {
        CalcError::CatalogError {
            reason: reason.into(),
        }
    }

    /// Create a SafetyViolation error
    pub fn safety_violation(parameter: impl Into<String>, value: f64, floor: f64) -> Self {
        CalcError::SafetyViolation {
            parameter: parameter.into(),
            value,
            floor,
        }
    }

    /// Create a FileError
    pub fn file_error(
        operation: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization(reason: impl Into<String>) -> Self {
        CalcError::SerializationError {
            reason: reason.into(),
        }
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::SectionNotFound { .. } => "SECTION_NOT_FOUND",
            CalcError::CatalogError { .. } => "CATALOG_ERROR",
            CalcError::SafetyViolation { .. } => "SAFETY_VIOLATION",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::FileLocked { .. } => "FILE_LOCKED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::VersionMismatch { .. } => "VERSION_MISMATCH",
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(err: serde_json::Error) -> Self {
        CalcError::serialization(err.to_string())
    }
}

/// Reject NaN/infinite and non-positive values for a named field.
pub(crate) fn require_positive(field: &str, value: f64) -> CalcResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CalcError::invalid_input(
            field,
            value.to_string(),
            "Must be a positive, finite number",
        ));
    }
    Ok(())
}

/// Reject NaN/infinite and negative values for a named field.
pub(crate) fn require_non_negative(field: &str, value: f64) -> CalcResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CalcError::invalid_input(
            field,
            value.to_string(),
            "Must be a non-negative, finite number",
        ));
    }
    Ok(())
}
