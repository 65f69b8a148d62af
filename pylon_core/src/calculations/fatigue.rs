//! # Fatigue
//!
//! Constant-amplitude fatigue life of a welded or bolted detail under daily
//! wind cycling (AISC 360 Appendix 3).
//!
//! ```text
//! N = 2×10⁶ · (FTH / SR)³     when SR > FTH
//! N = ∞                       otherwise
//! required = cycles_per_year · design_life_years
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::SolverInfo;
use crate::errors::{require_non_negative, require_positive, CalcResult};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("fatigue", "1.0.0");

/// Cycle count at which FTH is anchored
pub const THRESHOLD_CYCLES: f64 = 2.0e6;

/// AISC Table A-3.1 detail category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DetailCategory {
    A,
    B,
    #[serde(rename = "B'")]
    BPrime,
    C,
    #[serde(rename = "C'")]
    CPrime,
    D,
    #[default]
    E,
    #[serde(rename = "E'")]
    EPrime,
}

impl DetailCategory {
    pub const ALL: [DetailCategory; 8] = [
        DetailCategory::A,
        DetailCategory::B,
        DetailCategory::BPrime,
        DetailCategory::C,
        DetailCategory::CPrime,
        DetailCategory::D,
        DetailCategory::E,
        DetailCategory::EPrime,
    ];

    /// Threshold stress range FTH (ksi)
    pub fn threshold_ksi(&self) -> f64 {
        match self {
            DetailCategory::A => 24.0,
            DetailCategory::B => 16.0,
            DetailCategory::BPrime => 12.0,
            DetailCategory::C => 10.0,
            DetailCategory::CPrime => 12.0,
            DetailCategory::D => 7.0,
            DetailCategory::E => 4.5,
            DetailCategory::EPrime => 2.6,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DetailCategory::A => "A",
            DetailCategory::B => "B",
            DetailCategory::BPrime => "B'",
            DetailCategory::C => "C",
            DetailCategory::CPrime => "C'",
            DetailCategory::D => "D",
            DetailCategory::E => "E",
            DetailCategory::EPrime => "E'",
        }
    }
}

impl fmt::Display for DetailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueInput {
    /// Service stress range SR (ksi)
    pub stress_range_ksi: f64,
    #[serde(default)]
    pub category: DetailCategory,
    #[serde(default = "default_cycles_per_year")]
    pub cycles_per_year: f64,
    #[serde(default = "default_design_life")]
    pub design_life_years: f64,
}

fn default_cycles_per_year() -> f64 {
    365.0
}

fn default_design_life() -> f64 {
    25.0
}

impl FatigueInput {
    /// Daily cycling over a 25 year life
    pub fn new(stress_range_ksi: f64, category: DetailCategory) -> Self {
        Self {
            stress_range_ksi,
            category,
            cycles_per_year: default_cycles_per_year(),
            design_life_years: default_design_life(),
        }
    }

    pub fn validate(&self) -> CalcResult<()> {
        require_non_negative("stress_range_ksi", self.stress_range_ksi)?;
        require_positive("cycles_per_year", self.cycles_per_year)?;
        require_positive("design_life_years", self.design_life_years)?;
        Ok(())
    }

    pub fn required_cycles(&self) -> f64 {
        self.cycles_per_year * self.design_life_years
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueResult {
    pub category: DetailCategory,
    pub threshold_ksi: f64,
    pub stress_range_ksi: f64,
    /// None when the stress range is at or below the threshold (infinite life)
    pub cycles_to_failure: Option<f64>,
    pub required_cycles: f64,
    /// required / N; 0 for infinite life
    pub fatigue_ratio: f64,
    pub passes: bool,
}

impl FatigueResult {
    pub fn is_infinite_life(&self) -> bool {
        self.cycles_to_failure.is_none()
    }
}

/// Cycles to failure, or None below the threshold
pub fn cycles_to_failure(stress_range_ksi: f64, category: DetailCategory) -> Option<f64> {
    let fth = category.threshold_ksi();
    if stress_range_ksi <= fth {
        None
    } else {
        Some(THRESHOLD_CYCLES * (fth / stress_range_ksi).powi(3))
    }
}

pub fn check(input: &FatigueInput) -> CalcResult<Solved<FatigueResult>> {
    input.validate()?;

    let required = input.required_cycles();
    let n = cycles_to_failure(input.stress_range_ksi, input.category);
    let (ratio, passes) = match n {
        None => (0.0, true),
        Some(n) => (required / n, n >= required),
    };

    let mut warnings = Vec::new();
    if !passes {
        warnings.push(Warning::failed_check(
            SOLVER.name,
            format!(
                "Category {} detail at {:.2} ksi lasts {:.0} cycles, {:.0} required",
                input.category,
                input.stress_range_ksi,
                n.unwrap_or(0.0),
                required
            ),
        ));
    }

    tracing::debug!(category = %input.category, ratio, passes, "fatigue checked");

    Ok(Solved::new(
        FatigueResult {
            category: input.category,
            threshold_ksi: input.category.threshold_ksi(),
            stress_range_ksi: input.stress_range_ksi,
            cycles_to_failure: n,
            required_cycles: required,
            fatigue_ratio: ratio,
            passes,
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::WarningKind;

    #[test]
    fn test_below_threshold_is_infinite_life() {
        let solved = check(&FatigueInput::new(4.0, DetailCategory::E)).unwrap();
        assert!(solved.value.is_infinite_life());
        assert!(solved.value.passes);
        assert_eq!(solved.value.fatigue_ratio, 0.0);
        assert!(solved.warnings.is_empty());
    }

    #[test]
    fn test_inverse_cube_relation() {
        // Twice the threshold gives one eighth of 2e6
        let n = cycles_to_failure(9.0, DetailCategory::E).unwrap();
        assert!((n - 250_000.0).abs() < 1e-6);
        let n = cycles_to_failure(48.0, DetailCategory::A).unwrap();
        assert!((n - 250_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_required_cycles_default() {
        let input = FatigueInput::new(10.0, DetailCategory::E);
        assert_eq!(input.required_cycles(), 9125.0);
        let r = check(&input).unwrap().value;
        // N = 2e6 · (0.45)³ = 182,250
        assert!(r.passes);
        assert!((r.fatigue_ratio - 9125.0 / 182_250.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_life_fails() {
        let input = FatigueInput {
            stress_range_ksi: 40.0,
            category: DetailCategory::EPrime,
            cycles_per_year: 10_000.0,
            design_life_years: 50.0,
        };
        let solved = check(&input).unwrap();
        assert!(!solved.value.passes);
        assert!(solved.value.fatigue_ratio > 1.0);
        assert!(solved.has_kind(WarningKind::FailedCheck));
    }

    #[test]
    fn test_category_serde_codes() {
        let json = serde_json::to_string(&DetailCategory::EPrime).unwrap();
        assert_eq!(json, "\"E'\"");
        let back: DetailCategory = serde_json::from_str("\"B'\"").unwrap();
        assert_eq!(back, DetailCategory::BPrime);
    }

    #[test]
    fn test_negative_stress_rejected() {
        assert!(check(&FatigueInput::new(-1.0, DetailCategory::C)).is_err());
    }
}
