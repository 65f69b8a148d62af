//! # Member Selection
//!
//! Searches the section catalog for poles whose design flexural strength
//! covers the required moment (AISC 360 Chapter F, yielding limit state).
//!
//! ```text
//! φMn = φb · Fy · Sx          (kip-in)
//! stress_ratio = Mu / φMn     (feasible when ≤ 1.0)
//! ```
//!
//! Candidates are ranked by a total order with deterministic tie-breaks,
//! so the same request and catalog always produce the same list. An empty
//! list is a legitimate answer and comes back with a `NoFeasible` warning.
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::calculations::member_selection::{select, MemberRequest, SortBy};
//! use pylon_core::materials::{builtin_catalog, SectionFamily, SteelGrade};
//! use pylon_core::settings::SolverSettings;
//! use pylon_core::units::KipFt;
//!
//! let request = MemberRequest::new(KipFt(150.0))
//!     .family(SectionFamily::Hss)
//!     .grade(SteelGrade::A500B)
//!     .sort_by(SortBy::Weight);
//! let solved = select(&request, &builtin_catalog(), &SolverSettings::default()).unwrap();
//! assert_eq!(solved.value.candidates[0].section.designation, "HSS12X12X3/8");
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::envelope::SolverInfo;
use crate::errors::{require_non_negative, require_positive, CalcError, CalcResult};
use crate::materials::{SectionCatalog, SectionFamily, SectionProperties, SteelGrade};
use crate::settings::SolverSettings;
use crate::units::{KipFt, KipIn};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("member_selection", "1.1.0");

/// Primary ranking key. Remaining keys break ties, designation last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// (stress_ratio, weight, designation)
    #[default]
    StressRatio,
    /// (weight, stress_ratio, designation)
    Weight,
    /// (cost, stress_ratio, designation)
    Cost,
}

/// A member selection request.
///
/// ## JSON Example
///
/// ```json
/// {
///   "required_moment_kipft": 150.0,
///   "family": "HSS",
///   "grade": "A500B",
///   "sort_by": "weight",
///   "length_ft": 20.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRequest {
    /// Factored moment demand at the base
    pub required_moment_kipft: KipFt,
    #[serde(default)]
    pub family: Option<SectionFamily>,
    /// Grade override; when absent each row's listed Fy is used
    #[serde(default)]
    pub grade: Option<SteelGrade>,
    #[serde(default)]
    pub sort_by: SortBy,
    /// Cantilever length for slenderness and cost (ft)
    #[serde(default)]
    pub length_ft: Option<f64>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl MemberRequest {
    pub fn new(required_moment_kipft: KipFt) -> Self {
        Self {
            required_moment_kipft,
            family: None,
            grade: None,
            sort_by: SortBy::default(),
            length_ft: None,
            max_results: None,
        }
    }

    pub fn family(mut self, family: SectionFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn grade(mut self, grade: SteelGrade) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn length(mut self, length_ft: f64) -> Self {
        self.length_ft = Some(length_ft);
        self
    }

    pub fn validate(&self) -> CalcResult<()> {
        require_non_negative("required_moment_kipft", self.required_moment_kipft.value())?;
        if let Some(length) = self.length_ft {
            require_positive("length_ft", length)?;
        }
        if let (Some(grade), Some(family)) = (self.grade, self.family) {
            if !grade.applies_to(family) {
                return Err(CalcError::invalid_input(
                    "grade",
                    format!("{:?}", grade),
                    format!("Grade is not produced for {} sections", family),
                ));
            }
        }
        if self.max_results == Some(0) {
            return Err(CalcError::invalid_input("max_results", "0", "Must be at least 1"));
        }
        Ok(())
    }
}

/// One feasible section with the numbers computed for this request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMember {
    pub section: SectionProperties,
    /// Yield stress used (ksi)
    pub fy_ksi: f64,
    /// φMn
    pub capacity_kipft: KipFt,
    pub stress_ratio: f64,
    /// KL/r, when a length was given
    pub slenderness: Option<f64>,
    /// Steel weight (lb) when a length was given, else plf
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSelection {
    pub candidates: Vec<CandidateMember>,
    /// Designation of the lowest-ratio section that failed, if any
    pub closest_infeasible: Option<String>,
}

impl MemberSelection {
    /// Top-ranked candidate
    pub fn best(&self) -> Option<&CandidateMember> {
        self.candidates.first()
    }
}

/// Design flexural strength φMn (kip-in)
pub fn design_strength(section: &SectionProperties, fy_ksi: f64, phi: f64) -> KipIn {
    KipIn(phi * fy_ksi * section.effective_sx())
}

fn compare(sort_by: SortBy, a: &CandidateMember, b: &CandidateMember) -> Ordering {
    let by_name = || a.section.designation.cmp(&b.section.designation);
    match sort_by {
        SortBy::StressRatio => a
            .stress_ratio
            .total_cmp(&b.stress_ratio)
            .then(a.section.weight_plf.total_cmp(&b.section.weight_plf))
            .then_with(by_name),
        SortBy::Weight => a
            .section
            .weight_plf
            .total_cmp(&b.section.weight_plf)
            .then(a.stress_ratio.total_cmp(&b.stress_ratio))
            .then_with(by_name),
        SortBy::Cost => a
            .cost
            .total_cmp(&b.cost)
            .then(a.stress_ratio.total_cmp(&b.stress_ratio))
            .then_with(by_name),
    }
}

/// Select feasible sections for a request.
///
/// Errors only on invalid input. Every returned candidate has
/// `stress_ratio <= 1.0`.
pub fn select(
    request: &MemberRequest,
    catalog: &SectionCatalog,
    settings: &SolverSettings,
) -> CalcResult<Solved<MemberSelection>> {
    request.validate()?;

    let demand: KipIn = request.required_moment_kipft.into();
    let effective_length_in = request
        .length_ft
        .map(|l| l * 12.0 * settings.effective_length_factor);

    let mut feasible = Vec::new();
    let mut closest: Option<(f64, String)> = None;

    for section in catalog.iter() {
        if request.family.is_some_and(|f| f != section.family) {
            continue;
        }
        let fy = match request.grade {
            Some(grade) if !grade.applies_to(section.family) => continue,
            Some(grade) => grade.fy_ksi(),
            None => section.fy_ksi,
        };

        let capacity = design_strength(section, fy, settings.phi_bending);
        let ratio = demand.value() / capacity.value();
        let slenderness = effective_length_in.map(|kl| section.slenderness(kl));
        let too_slender = slenderness.is_some_and(|s| s > settings.max_slenderness);

        if ratio > 1.0 || too_slender {
            let is_closer = closest.as_ref().map_or(true, |(r, _)| ratio < *r);
            if is_closer {
                closest = Some((ratio, section.designation.clone()));
            }
            continue;
        }

        feasible.push(CandidateMember {
            section: section.clone(),
            fy_ksi: fy,
            capacity_kipft: capacity.into(),
            stress_ratio: ratio,
            slenderness,
            cost: section.weight_plf * request.length_ft.unwrap_or(1.0),
        });
    }

    feasible.sort_by(|a, b| compare(request.sort_by, a, b));
    if let Some(limit) = request.max_results {
        feasible.truncate(limit);
    }

    let mut warnings = Vec::new();
    if feasible.is_empty() {
        let family = request
            .family
            .map_or_else(|| "catalog".to_string(), |f| f.to_string());
        let message = match &closest {
            Some((ratio, name)) => format!(
                "No feasible {} section for {:.1} kip-ft; closest is {} at stress ratio {:.2}",
                family,
                request.required_moment_kipft.value(),
                name,
                ratio
            ),
            None => format!("No {} sections match the requested filters", family),
        };
        tracing::warn!(%message, "member selection found no feasible section");
        warnings.push(Warning::no_feasible(SOLVER.name, message));
    } else {
        tracing::debug!(candidates = feasible.len(), "member selection complete");
    }

    Ok(Solved::new(
        MemberSelection {
            candidates: feasible,
            closest_infeasible: closest.map(|(_, name)| name),
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::builtin_catalog;
    use crate::warnings::WarningKind;

    fn settings() -> SolverSettings {
        SolverSettings::default()
    }

    #[test]
    fn test_150_kipft_hss_a500b_by_weight() {
        let request = MemberRequest::new(KipFt(150.0))
            .family(SectionFamily::Hss)
            .grade(SteelGrade::A500B)
            .sort_by(SortBy::Weight);
        let solved = select(&request, &builtin_catalog(), &settings()).unwrap();
        let candidates = &solved.value.candidates;

        assert!(!candidates.is_empty());
        assert!(solved.warnings.is_empty());
        assert!(candidates[0].stress_ratio <= 1.0);
        assert_eq!(candidates[0].section.designation, "HSS12X12X3/8");
        // 1800 / (0.9 * 46 * 59.6)
        assert!((candidates[0].stress_ratio - 0.7295).abs() < 1e-3);

        for pair in candidates.windows(2) {
            assert!(pair[0].section.weight_plf <= pair[1].section.weight_plf);
        }
    }

    #[test]
    fn test_every_candidate_is_feasible() {
        for moment in [0.0, 10.0, 75.0, 150.0, 400.0] {
            let request = MemberRequest::new(KipFt(moment));
            let solved = select(&request, &builtin_catalog(), &settings()).unwrap();
            assert!(solved.value.candidates.iter().all(|c| c.stress_ratio <= 1.0));
        }
    }

    #[test]
    fn test_default_sort_is_stress_ratio_then_weight_then_name() {
        let request = MemberRequest::new(KipFt(20.0)).family(SectionFamily::Hss);
        let candidates = select(&request, &builtin_catalog(), &settings()).unwrap().value.candidates;
        for pair in candidates.windows(2) {
            let ordering = compare(SortBy::StressRatio, &pair[0], &pair[1]);
            assert_ne!(ordering, Ordering::Greater);
            assert!(pair[0].stress_ratio <= pair[1].stress_ratio);
        }
    }

    #[test]
    fn test_tie_breaks_on_designation() {
        let mut catalog = SectionCatalog::new();
        let base = builtin_catalog().lookup("HSS8X8X1/4").unwrap().clone();
        let mut twin = base.clone();
        twin.designation = "HSS8X8X1/4-ALT".to_string();
        catalog.insert(twin);
        catalog.insert(base);

        let request = MemberRequest::new(KipFt(10.0));
        let candidates = select(&request, &catalog, &settings()).unwrap().value.candidates;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].section.designation, "HSS8X8X1/4");
        assert_eq!(candidates[1].section.designation, "HSS8X8X1/4-ALT");
    }

    #[test]
    fn test_no_feasible_returns_empty_with_warning() {
        let request = MemberRequest::new(KipFt(5000.0)).family(SectionFamily::Pipe);
        let solved = select(&request, &builtin_catalog(), &settings()).unwrap();
        assert!(solved.value.candidates.is_empty());
        assert!(solved.has_kind(WarningKind::NoFeasible));
        assert_eq!(solved.value.closest_infeasible.as_deref(), Some("PIPE12STD"));
        assert!(solved.warnings[0].message.contains("PIPE12STD"));
    }

    #[test]
    fn test_slenderness_limit_excludes_small_sections() {
        // 40 ft cantilever, K = 2: KL = 960 in; r > 4.8 in required
        let request = MemberRequest::new(KipFt(1.0)).family(SectionFamily::Hss).length(40.0);
        let candidates = select(&request, &builtin_catalog(), &settings()).unwrap().value.candidates;
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.slenderness.unwrap() <= 200.0));
        assert!(candidates.iter().all(|c| c.section.r_min() >= 4.8));
    }

    #[test]
    fn test_grade_overrides_row_yield() {
        let catalog = builtin_catalog();
        let b = select(&MemberRequest::new(KipFt(50.0)).grade(SteelGrade::A500B), &catalog, &settings())
            .unwrap()
            .value;
        let c = select(&MemberRequest::new(KipFt(50.0)).grade(SteelGrade::A500C), &catalog, &settings())
            .unwrap()
            .value;
        let b_first = b.candidates.iter().find(|m| m.section.designation == "HSS8X8X3/8").unwrap();
        let c_first = c.candidates.iter().find(|m| m.section.designation == "HSS8X8X3/8").unwrap();
        assert_eq!(b_first.fy_ksi, 46.0);
        assert_eq!(c_first.fy_ksi, 50.0);
        assert!(c_first.stress_ratio < b_first.stress_ratio);
        assert!(b.candidates.iter().all(|m| m.section.family != SectionFamily::W));
    }

    #[test]
    fn test_incompatible_grade_is_invalid_input() {
        let request = MemberRequest::new(KipFt(50.0))
            .family(SectionFamily::Hss)
            .grade(SteelGrade::A992);
        let err = select(&request, &builtin_catalog(), &settings()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_negative_moment_is_invalid() {
        let err = select(&MemberRequest::new(KipFt(-1.0)), &builtin_catalog(), &settings()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
