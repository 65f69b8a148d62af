//! # Connection Checks
//!
//! Base-plate anchor bolt group under combined tension and shear, and
//! fillet weld sizing for the pole-to-plate weld (AISC 360 J2, J3).
//!
//! ## Bolt group
//!
//! ```text
//! Ab      = π·d²/4
//! φRn,t   = 0.75 · Fnt · Ab         per bolt (kips)
//! φRn,v   = 0.75 · Fnv · Ab         per bolt (kips)
//! ratio   = (Tu / n·φRn,t)² + (Vu / n·φRn,v)²
//! n_req   = ceil(n · ratio)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::calculations::connection::{check_bolt_group, BoltGrade, BoltGroupInput};
//!
//! let input = BoltGroupInput::new(BoltGrade::A325, 0.75, 4, 20.0, 5.0);
//! let solved = check_bolt_group(&input).unwrap();
//! assert!(solved.value.passes);
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::envelope::SolverInfo;
use crate::errors::{require_non_negative, require_positive, CalcError, CalcResult};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("connection", "1.0.0");

/// Resistance factor for bolt rupture
pub const PHI_BOLT: f64 = 0.75;

/// Resistance factor for weld metal
pub const PHI_WELD: f64 = 0.75;

/// Smallest fillet weld size considered (in)
pub const MIN_FILLET_IN: f64 = 3.0 / 16.0;

/// Largest single-pass-practical fillet before a review is needed (in)
pub const MAX_FILLET_IN: f64 = 5.0 / 8.0;

/// High-strength bolt grade (threads included in the shear plane)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoltGrade {
    A325,
    A490,
}

impl BoltGrade {
    /// Nominal tensile stress Fnt (ksi), Table J3.2
    pub fn fnt_ksi(&self) -> f64 {
        match self {
            BoltGrade::A325 => 90.0,
            BoltGrade::A490 => 113.0,
        }
    }

    /// Nominal shear stress Fnv (ksi), threads included
    pub fn fnv_ksi(&self) -> f64 {
        match self {
            BoltGrade::A325 => 54.0,
            BoltGrade::A490 => 68.0,
        }
    }
}

/// Bolt group demand and layout.
///
/// ## JSON Example
///
/// ```json
/// {
///   "grade": "A325",
///   "diameter_in": 0.75,
///   "bolt_count": 4,
///   "tension_kip": 20.0,
///   "shear_kip": 5.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoltGroupInput {
    pub grade: BoltGrade,
    pub diameter_in: f64,
    pub bolt_count: u32,
    /// Factored tension on the group (kips)
    pub tension_kip: f64,
    /// Factored shear on the group (kips)
    pub shear_kip: f64,
}

impl BoltGroupInput {
    pub fn new(grade: BoltGrade, diameter_in: f64, bolt_count: u32, tension_kip: f64, shear_kip: f64) -> Self {
        Self {
            grade,
            diameter_in,
            bolt_count,
            tension_kip,
            shear_kip,
        }
    }

    pub fn validate(&self) -> CalcResult<()> {
        require_positive("diameter_in", self.diameter_in)?;
        require_non_negative("tension_kip", self.tension_kip)?;
        require_non_negative("shear_kip", self.shear_kip)?;
        if self.bolt_count == 0 {
            return Err(CalcError::invalid_input("bolt_count", "0", "At least one bolt is required"));
        }
        Ok(())
    }

    /// Nominal bolt area Ab (in²)
    pub fn bolt_area_in2(&self) -> f64 {
        PI * self.diameter_in.powi(2) / 4.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoltGroupResult {
    pub bolt_area_in2: f64,
    /// φRn,t per bolt (kips)
    pub tension_capacity_kip: f64,
    /// φRn,v per bolt (kips)
    pub shear_capacity_kip: f64,
    pub tension_per_bolt_kip: f64,
    pub shear_per_bolt_kip: f64,
    /// Quadratic tension-shear interaction
    pub interaction_ratio: f64,
    pub bolts_required: u32,
    pub passes: bool,
}

/// Check a bolt group. A failing check is a warning, not an error.
pub fn check_bolt_group(input: &BoltGroupInput) -> CalcResult<Solved<BoltGroupResult>> {
    input.validate()?;

    let ab = input.bolt_area_in2();
    let rt = PHI_BOLT * input.grade.fnt_ksi() * ab;
    let rv = PHI_BOLT * input.grade.fnv_ksi() * ab;
    let n = input.bolt_count as f64;
    let t = input.tension_kip / n;
    let v = input.shear_kip / n;

    let interaction = (t / rt).powi(2) + (v / rv).powi(2);
    let bolts_required = ((n * interaction).ceil() as u32).max(1);
    let passes = interaction <= 1.0;

    let mut warnings = Vec::new();
    if !passes {
        warnings.push(Warning::failed_check(
            SOLVER.name,
            format!(
                "Bolt interaction {:.2} exceeds 1.0; {} bolts of {:.3} in required, {} provided",
                interaction, bolts_required, input.diameter_in, input.bolt_count
            ),
        ));
    }

    Ok(Solved::new(
        BoltGroupResult {
            bolt_area_in2: ab,
            tension_capacity_kip: rt,
            shear_capacity_kip: rv,
            tension_per_bolt_kip: t,
            shear_per_bolt_kip: v,
            interaction_ratio: interaction,
            bolts_required,
            passes,
        },
        warnings,
    ))
}

/// Fillet weld demand: resultant force spread over the weld length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeldInput {
    /// Resultant factored force on the weld group (kips)
    pub force_kip: f64,
    /// Total effective weld length (in)
    pub length_in: f64,
    /// Electrode strength FEXX (ksi)
    #[serde(default = "default_fexx")]
    pub fexx_ksi: f64,
}

fn default_fexx() -> f64 {
    70.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeldResult {
    /// Demand per inch of weld (kip/in)
    pub demand_kip_per_in: f64,
    /// Required leg before rounding (in)
    pub required_leg_in: f64,
    /// Selected leg, rounded up to 1/16 in (in)
    pub leg_in: f64,
    pub passes: bool,
}

/// Size a fillet weld: φRn = 0.75 · 0.6·FEXX · 0.707·w per inch.
pub fn size_fillet_weld(input: &WeldInput) -> CalcResult<Solved<WeldResult>> {
    require_non_negative("force_kip", input.force_kip)?;
    require_positive("length_in", input.length_in)?;
    require_positive("fexx_ksi", input.fexx_ksi)?;

    let demand = input.force_kip / input.length_in;
    let strength_per_leg_in = PHI_WELD * 0.6 * input.fexx_ksi * 0.707;
    let required = demand / strength_per_leg_in;
    let leg = ((required * 16.0).ceil() / 16.0).max(MIN_FILLET_IN);
    let passes = leg <= MAX_FILLET_IN;

    let mut warnings = Vec::new();
    if !passes {
        warnings.push(Warning::failed_check(
            SOLVER.name,
            format!("Fillet weld leg {:.3} in exceeds {:.3} in; lengthen the weld", leg, MAX_FILLET_IN),
        ));
    }

    Ok(Solved::new(
        WeldResult {
            demand_kip_per_in: demand,
            required_leg_in: required,
            leg_in: leg,
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
    fn test_capacities_are_in_kips() {
        let input = BoltGroupInput::new(BoltGrade::A325, 1.0, 4, 0.0, 0.0);
        let r = check_bolt_group(&input).unwrap().value;
        // 0.75 * 90 * 0.7854
        assert!((r.tension_capacity_kip - 53.01).abs() < 0.01);
        // 0.75 * 54 * 0.7854
        assert!((r.shear_capacity_kip - 31.81).abs() < 0.01);
        assert_eq!(r.interaction_ratio, 0.0);
        assert_eq!(r.bolts_required, 1);
    }

    #[test]
    fn test_interaction_passes() {
        let input = BoltGroupInput::new(BoltGrade::A325, 0.75, 4, 20.0, 5.0);
        let solved = check_bolt_group(&input).unwrap();
        assert!(solved.value.passes);
        assert!(solved.value.interaction_ratio < 1.0);
        assert!(solved.value.bolts_required <= 4);
        assert!(solved.warnings.is_empty());
    }

    #[test]
    fn test_overloaded_group_fails_with_required_count() {
        let input = BoltGroupInput::new(BoltGrade::A325, 0.75, 4, 200.0, 40.0);
        let solved = check_bolt_group(&input).unwrap();
        let r = &solved.value;
        assert!(!r.passes);
        assert_eq!(r.bolts_required, (4.0 * r.interaction_ratio).ceil() as u32);
        assert!(r.bolts_required > 4);
        assert!(solved.has_kind(WarningKind::FailedCheck));
    }

    #[test]
    fn test_a490_is_stronger() {
        let a325 = check_bolt_group(&BoltGroupInput::new(BoltGrade::A325, 0.75, 4, 60.0, 10.0)).unwrap();
        let a490 = check_bolt_group(&BoltGroupInput::new(BoltGrade::A490, 0.75, 4, 60.0, 10.0)).unwrap();
        assert!(a490.value.interaction_ratio < a325.value.interaction_ratio);
    }

    #[test]
    fn test_invalid_bolt_inputs() {
        assert!(check_bolt_group(&BoltGroupInput::new(BoltGrade::A325, 0.75, 0, 1.0, 1.0)).is_err());
        assert!(check_bolt_group(&BoltGroupInput::new(BoltGrade::A325, 0.0, 4, 1.0, 1.0)).is_err());
        assert!(check_bolt_group(&BoltGroupInput::new(BoltGrade::A325, 0.75, 4, -1.0, 1.0)).is_err());
    }

    #[test]
    fn test_weld_rounds_up_to_sixteenth() {
        let input = WeldInput {
            force_kip: 60.0,
            length_in: 24.0,
            fexx_ksi: 70.0,
        };
        let r = size_fillet_weld(&input).unwrap().value;
        // 2.5 kip/in / 22.27 kip/in per in of leg = 0.112 in -> minimum 3/16
        assert!((r.required_leg_in - 0.1123).abs() < 1e-3);
        assert_eq!(r.leg_in, 3.0 / 16.0);
        assert!(r.passes);

        let heavy = size_fillet_weld(&WeldInput {
            force_kip: 150.0,
            length_in: 20.0,
            fexx_ksi: 70.0,
        })
        .unwrap()
        .value;
        // 7.5 / 22.27 = 0.337 -> 6/16
        assert_eq!(heavy.leg_in, 6.0 / 16.0);
    }

    #[test]
    fn test_oversized_weld_is_failed_check() {
        let solved = size_fillet_weld(&WeldInput {
            force_kip: 500.0,
            length_in: 20.0,
            fexx_ksi: 70.0,
        })
        .unwrap();
        assert!(!solved.value.passes);
        assert!(solved.has_kind(WarningKind::FailedCheck));
    }
}
