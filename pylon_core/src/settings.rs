//! # Engine Settings
//!
//! Tunable limits and policies for the solvers, envelope scoring and the
//! resilience layer. Settings files are human-readable JSON; every field
//! has a default, so a partial file is valid.
//!
//! ```text
//! EngineSettings
//! ├── schema_version
//! ├── solver: SolverSettings       (sanity limits, factors, iteration bounds)
//! ├── envelope: EnvelopeSettings   (duplicate-warning policy)
//! └── resilience: ResilienceSettings (breaker, retry, idempotency TTL, task budget)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::settings::EngineSettings;
//!
//! let settings: EngineSettings =
//!     serde_json::from_str(r#"{"solver": {"max_footing_depth_ft": 10.0}}"#).unwrap();
//! assert_eq!(settings.solver.max_footing_depth_ft, 10.0);
//! assert_eq!(settings.solver.max_pole_height_ft, 40.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::envelope::DuplicatePolicy;
use crate::errors::{require_positive, CalcError, CalcResult};
use crate::file_io::{read_optional, validate_version, write_atomic, FileLock};
use crate::resilience::backoff::RetryPolicy;
use crate::resilience::breaker::BreakerConfig;

/// Current schema version for settings files
pub const SETTINGS_SCHEMA_VERSION: &str = "0.1.0";

/// Root settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub schema_version: String,
    pub solver: SolverSettings,
    pub envelope: EnvelopeSettings,
    pub resilience: ResilienceSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION.to_string(),
            solver: SolverSettings::default(),
            envelope: EnvelopeSettings::default(),
            resilience: ResilienceSettings::default(),
        }
    }
}

/// Limits and factors shared by the structural solvers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Sign tops above this raise a warning (ft)
    pub max_pole_height_ft: f64,
    /// Footings deeper than this require engineering review (ft)
    pub max_footing_depth_ft: f64,
    /// Frost/disturbance embedment floor (ft)
    pub min_embedment_ft: f64,
    pub foundation_max_iterations: u32,
    /// Relative depth change that counts as converged
    pub foundation_tolerance: f64,
    /// LRFD wind load factor
    pub wind_load_factor: f64,
    /// Resistance factor for flexure
    pub phi_bending: f64,
    /// Effective length factor for a cantilevered pole
    pub effective_length_factor: f64,
    pub max_slenderness: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_pole_height_ft: 40.0,
            max_footing_depth_ft: 8.0,
            min_embedment_ft: 3.0,
            foundation_max_iterations: 5,
            foundation_tolerance: 0.001,
            wind_load_factor: 1.6,
            phi_bending: 0.9,
            effective_length_factor: 2.0,
            max_slenderness: 200.0,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> CalcResult<()> {
        require_positive("max_pole_height_ft", self.max_pole_height_ft)?;
        require_positive("max_footing_depth_ft", self.max_footing_depth_ft)?;
        require_positive("min_embedment_ft", self.min_embedment_ft)?;
        require_positive("foundation_tolerance", self.foundation_tolerance)?;
        require_positive("wind_load_factor", self.wind_load_factor)?;
        require_positive("effective_length_factor", self.effective_length_factor)?;
        require_positive("max_slenderness", self.max_slenderness)?;
        if self.foundation_max_iterations == 0 {
            return Err(CalcError::invalid_input(
                "foundation_max_iterations",
                "0",
                "At least one iteration is required",
            ));
        }
        if !(self.phi_bending > 0.0 && self.phi_bending <= 1.0) {
            return Err(CalcError::invalid_input(
                "phi_bending",
                self.phi_bending.to_string(),
                "Resistance factor must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSettings {
    pub duplicate_warnings: DuplicatePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub breaker: BreakerConfig,
    pub retry: RetryPolicy,
    pub idempotency_ttl_secs: u64,
    /// Wall-clock budget for one task attempt
    pub task_timeout_ms: u64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            retry: RetryPolicy::default(),
            idempotency_ttl_secs: 86_400,
            task_timeout_ms: 30_000,
        }
    }
}

/// Load settings from a JSON file and check its schema version.
///
/// # Returns
///
/// * `Err(CalcError::FileError)` - file missing or unreadable
/// * `Err(CalcError::SerializationError)` - invalid JSON
/// * `Err(CalcError::VersionMismatch)` - incompatible schema
pub fn load_settings(path: &Path) -> CalcResult<EngineSettings> {
    let contents = read_optional(path)?.ok_or_else(|| {
        CalcError::file_error("open", path.display().to_string(), "settings file not found")
    })?;

    let settings: EngineSettings = serde_json::from_str(&contents).map_err(|e| {
        CalcError::serialization(format!("Invalid JSON in {}: {}", path.display(), e))
    })?;

    validate_version(&settings.schema_version, SETTINGS_SCHEMA_VERSION)?;
    settings.solver.validate()?;
    Ok(settings)
}

/// Save settings atomically under an exclusive file lock
pub fn save_settings(settings: &EngineSettings, path: &Path) -> CalcResult<()> {
    let json = serde_json::to_string_pretty(settings)?;
    let _lock = FileLock::acquire(path)?;
    write_atomic(path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.schema_version, SETTINGS_SCHEMA_VERSION);
        assert_eq!(settings.solver.foundation_max_iterations, 5);
        assert_eq!(settings.resilience.breaker.failure_threshold, 3);
        assert_eq!(settings.resilience.idempotency_ttl_secs, 86_400);
        assert!(settings.solver.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pylon.json");

        let mut settings = EngineSettings::default();
        settings.solver.min_embedment_ft = 4.0;
        settings.envelope.duplicate_warnings = DuplicatePolicy::Deduplicate;
        save_settings(&settings, &path).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_rejects_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pylon.json");
        std::fs::write(&path, r#"{"schema_version": "0.9.0"}"#).unwrap();

        let err = load_settings(&path).unwrap_err();
        assert_eq!(err.error_code(), "VERSION_MISMATCH");
    }

    #[test]
    fn test_load_rejects_invalid_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pylon.json");
        std::fs::write(&path, r#"{"solver": {"phi_bending": 1.5}}"#).unwrap();

        assert_eq!(load_settings(&path).unwrap_err().error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_ERROR");
    }
}
