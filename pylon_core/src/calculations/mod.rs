//! # Structural Calculations
//!
//! Each solver follows the same pattern:
//!
//! - `*Input` / `*Request` - input parameters (JSON-serializable)
//! - `*Result` - solver output (JSON-serializable)
//! - a pure function returning `CalcResult<Solved<*Result>>`; only invalid
//!   input is an `Err`, degraded answers carry warnings
//! - a `SOLVER` constant naming the solver and its version for envelopes
//!
//! ## Available Calculations
//!
//! - [`wind_load`] - Wind pressure, force and moment on a sign (ASCE 7)
//! - [`member_selection`] - Catalog search for a pole section (AISC 360 F)
//! - [`foundation`] - Embedment depth of a pier (IBC 1807.3)
//! - [`connection`] - Anchor bolt group and fillet weld (AISC 360 J)
//! - [`fatigue`] - Detail fatigue life (AISC 360 App. 3)

pub mod connection;
pub mod fatigue;
pub mod foundation;
pub mod member_selection;
pub mod wind_load;

use serde::{Deserialize, Serialize};

use crate::envelope::{ResultEnvelope, SolverInfo};
use crate::errors::CalcResult;
use crate::materials::steel::SectionCatalog;
use crate::settings::EngineSettings;
use crate::warnings::Solved;

pub use connection::{BoltGroupInput, BoltGroupResult, WeldInput, WeldResult};
pub use fatigue::{DetailCategory, FatigueInput, FatigueResult};
pub use foundation::{Convergence, FoundationInput, FoundationResult};
pub use member_selection::{CandidateMember, MemberRequest, MemberSelection};
pub use wind_load::{LoadResult, WindLoadInput};

/// A single standalone solver invocation.
///
/// This is the payload of queued calculation tasks: one tagged value per
/// solver, so a worker never has to inspect the shape of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculationItem {
    WindLoad(WindLoadInput),
    MemberSelection(MemberRequest),
    Foundation(FoundationInput),
    BoltGroup(BoltGroupInput),
    Weld(WeldInput),
    Fatigue(FatigueInput),
}

impl CalculationItem {
    pub fn calc_type(&self) -> &'static str {
        match self {
            CalculationItem::WindLoad(_) => "WindLoad",
            CalculationItem::MemberSelection(_) => "MemberSelection",
            CalculationItem::Foundation(_) => "Foundation",
            CalculationItem::BoltGroup(_) => "BoltGroup",
            CalculationItem::Weld(_) => "Weld",
            CalculationItem::Fatigue(_) => "Fatigue",
        }
    }

    pub fn solver(&self) -> SolverInfo {
        match self {
            CalculationItem::WindLoad(_) => wind_load::SOLVER,
            CalculationItem::MemberSelection(_) => member_selection::SOLVER,
            CalculationItem::Foundation(_) => foundation::SOLVER,
            CalculationItem::BoltGroup(_) | CalculationItem::Weld(_) => connection::SOLVER,
            CalculationItem::Fatigue(_) => fatigue::SOLVER,
        }
    }

    /// Run the solver and wrap its output in an envelope
    pub fn evaluate(
        &self,
        catalog: &SectionCatalog,
        settings: &EngineSettings,
    ) -> CalcResult<ResultEnvelope<serde_json::Value>> {
        let solver_settings = &settings.solver;
        let solved = match self {
            CalculationItem::WindLoad(input) => to_value(wind_load::calculate(input, solver_settings)?)?,
            CalculationItem::MemberSelection(request) => {
                to_value(member_selection::select(request, catalog, solver_settings)?)?
            }
            CalculationItem::Foundation(input) => to_value(foundation::solve(input, solver_settings)?)?,
            CalculationItem::BoltGroup(input) => to_value(connection::check_bolt_group(input)?)?,
            CalculationItem::Weld(input) => to_value(connection::size_fillet_weld(input)?)?,
            CalculationItem::Fatigue(input) => to_value(fatigue::check(input)?)?,
        };
        ResultEnvelope::from_solved(self.solver(), solved, settings.envelope.duplicate_warnings)
    }
}

fn to_value<T: Serialize>(solved: Solved<T>) -> CalcResult<Solved<serde_json::Value>> {
    let value = serde_json::to_value(&solved.value)?;
    Ok(Solved::new(value, solved.warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{DuplicatePolicy, ResultEnvelope};
    use crate::materials::steel::builtin_catalog;

    #[test]
    fn test_item_json_is_tagged() {
        let item = CalculationItem::Fatigue(FatigueInput::new(6.0, DetailCategory::E));
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"Fatigue\""));

        let back: CalculationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
        assert_eq!(back.calc_type(), "Fatigue");
        assert_eq!(back.solver().name, "fatigue");
    }

    #[test]
    fn test_evaluate_matches_typed_envelope() {
        let input = FoundationInput {
            lateral_force_lb: 3000.0,
            load_height_ft: 15.0,
            diameter_ft: 3.0,
            soil_bearing_psf: 3000.0,
        };
        let settings = EngineSettings::default();
        let item = CalculationItem::Foundation(input.clone());
        let untyped = item.evaluate(&builtin_catalog(), &settings).unwrap();

        let typed = ResultEnvelope::from_solved(
            foundation::SOLVER,
            foundation::solve(&input, &settings.solver).unwrap(),
            DuplicatePolicy::Penalize,
        )
        .unwrap();
        assert_eq!(untyped.content_hash(), typed.content_hash());
        assert_eq!(untyped.confidence(), typed.confidence());
        assert_eq!(untyped.trace().solver_version, "1.3.0");
    }

    #[test]
    fn test_evaluate_propagates_invalid_input() {
        let item = CalculationItem::Fatigue(FatigueInput::new(-2.0, DetailCategory::A));
        let err = item
            .evaluate(&builtin_catalog(), &EngineSettings::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
