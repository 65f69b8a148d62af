//! # Wind Load Solver
//!
//! Derives area, weight, wind force and overturning moment for a sign from
//! site wind parameters and panel geometry per ASCE 7-22 Chapters 26 and 29.
//!
//! ## Method
//!
//! ```text
//! qz = 0.00256 · Kz · Kzt · Kd · Ke · V²      (velocity pressure, psf)
//! p  = qz · G · Cf · Iw                       (design pressure, psf)
//! F  = p · A                                  (lateral force, lb)
//! M  = F · z̄                                  (moment at grade, kip-ft)
//! ```
//!
//! The gust factor G enters only the design pressure. Kz is evaluated at the
//! area centroid of the stacked panels.
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::calculations::wind_load::{calculate, WindLoadInput};
//! use pylon_core::loads::{Exposure, Panel, SiteLoads};
//! use pylon_core::settings::SolverSettings;
//!
//! let input = WindLoadInput::new(SiteLoads::new(115.0, Exposure::C), vec![Panel::new(10.0, 4.0)], 13.0);
//! let solved = calculate(&input, &SolverSettings::default()).unwrap();
//! assert!((solved.value.centroid_height_ft - 15.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

use crate::envelope::SolverInfo;
use crate::errors::{require_positive, CalcError, CalcResult};
use crate::loads::{Panel, SiteLoads, KZ_TABLE_MAX_HEIGHT_FT};
use crate::settings::SolverSettings;
use crate::units::{FtLb, KipFt};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("wind_load", "1.2.0");

/// Velocity pressure coefficient for V in mph and q in psf
pub const VELOCITY_PRESSURE_COEFFICIENT: f64 = 0.00256;

/// Wind speeds above this are outside the mapped range
pub const MAX_MAPPED_WIND_SPEED_MPH: f64 = 200.0;

/// Input for the wind load solver.
///
/// ## JSON Example
///
/// ```json
/// {
///   "site": { "wind_speed_mph": 115.0, "exposure": "C" },
///   "panels": [
///     { "width_ft": 10.0, "height_ft": 4.0, "weight_psf": 6.0 }
///   ],
///   "attachment_height_ft": 13.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindLoadInput {
    pub site: SiteLoads,
    /// Panels stacked upward from the attachment height, bottom first
    pub panels: Vec<Panel>,
    /// Height of the bottom of the lowest panel above grade (ft)
    pub attachment_height_ft: f64,
}

impl WindLoadInput {
    pub fn new(site: SiteLoads, panels: Vec<Panel>, attachment_height_ft: f64) -> Self {
        Self {
            site,
            panels,
            attachment_height_ft,
        }
    }

    pub fn validate(&self) -> CalcResult<()> {
        self.site.validate()?;
        require_positive("attachment_height_ft", self.attachment_height_ft)?;
        if self.panels.is_empty() {
            return Err(CalcError::invalid_input(
                "panels",
                "[]",
                "At least one panel is required",
            ));
        }
        for (i, panel) in self.panels.iter().enumerate() {
            panel.validate(i)?;
        }
        Ok(())
    }

    /// Height of the top of the panel stack (ft)
    pub fn top_height_ft(&self) -> f64 {
        self.attachment_height_ft + self.panels.iter().map(|p| p.height_ft).sum::<f64>()
    }
}

/// Derived loads for one sign. A pure function of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub total_area_sqft: f64,
    /// Area-weighted centroid height above grade (ft)
    pub centroid_height_ft: f64,
    pub top_height_ft: f64,
    /// Panel self-weight (lb)
    pub total_weight_lb: f64,
    pub kz: f64,
    /// qz (psf)
    pub velocity_pressure_psf: f64,
    /// p (psf)
    pub design_pressure_psf: f64,
    /// Service-level lateral force (lb)
    pub lateral_force_lb: f64,
    /// Service-level moment at grade
    pub moment_kipft: KipFt,
    /// LRFD factored lateral force (lb)
    pub factored_force_lb: f64,
    /// LRFD factored moment at grade
    pub factored_moment_kipft: KipFt,
}

/// qz at a height (psf). Does not include the gust factor.
pub fn velocity_pressure(site: &SiteLoads, height_ft: f64) -> f64 {
    VELOCITY_PRESSURE_COEFFICIENT
        * site.exposure.kz(height_ft)
        * site.kzt
        * site.kd
        * site.ke
        * site.wind_speed_mph.powi(2)
}

/// p from qz (psf). The single place the gust factor is applied.
pub fn design_pressure(site: &SiteLoads, velocity_pressure_psf: f64) -> f64 {
    velocity_pressure_psf
        * site.gust_factor
        * site.force_coefficient
        * site.risk_category.importance_factor()
}

/// Run the wind load solver.
///
/// Fails only on invalid input. Tall signs, heights past the Kz table and
/// speeds past the mapped range produce warnings instead.
pub fn calculate(input: &WindLoadInput, settings: &SolverSettings) -> CalcResult<Solved<LoadResult>> {
    input.validate()?;
    let mut warnings = Vec::new();

    // === Geometry ===
    let mut bottom = input.attachment_height_ft;
    let mut total_area = 0.0;
    let mut area_moment = 0.0;
    let mut total_weight = 0.0;
    for panel in &input.panels {
        let area = panel.area_sqft();
        total_area += area;
        area_moment += area * (bottom + panel.height_ft / 2.0);
        total_weight += area * panel.weight_psf;
        bottom += panel.height_ft;
    }
    let centroid = area_moment / total_area;
    let top = bottom;

    if top > settings.max_pole_height_ft {
        warnings.push(Warning::generic(
            SOLVER.name,
            format!(
                "Sign top at {:.1} ft exceeds the {:.0} ft height limit",
                top, settings.max_pole_height_ft
            ),
        ));
    }
    if centroid > KZ_TABLE_MAX_HEIGHT_FT {
        warnings.push(Warning::generic(
            SOLVER.name,
            format!(
                "Centroid at {:.1} ft is above the Kz table; power-law extrapolation used",
                centroid
            ),
        ));
    }
    if input.site.wind_speed_mph > MAX_MAPPED_WIND_SPEED_MPH {
        warnings.push(Warning::generic(
            SOLVER.name,
            format!(
                "Wind speed {:.0} mph is outside the mapped range",
                input.site.wind_speed_mph
            ),
        ));
    }

    // === Pressures ===
    let kz = input.site.exposure.kz(centroid);
    let qz = velocity_pressure(&input.site, centroid);
    let p = design_pressure(&input.site, qz);

    // === Force and moment ===
    let force = p * total_area;
    let moment: KipFt = FtLb(force * centroid).into();
    let factor = settings.wind_load_factor;

    tracing::debug!(
        qz_psf = qz,
        p_psf = p,
        force_lb = force,
        moment_kipft = moment.value(),
        "wind load solved"
    );

    Ok(Solved::new(
        LoadResult {
            total_area_sqft: total_area,
            centroid_height_ft: centroid,
            top_height_ft: top,
            total_weight_lb: total_weight,
            kz,
            velocity_pressure_psf: qz,
            design_pressure_psf: p,
            lateral_force_lb: force,
            moment_kipft: moment,
            factored_force_lb: force * factor,
            factored_moment_kipft: moment * factor,
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{content_hash, DuplicatePolicy, ResultEnvelope};
    use crate::loads::{Exposure, RiskCategory};
    use crate::warnings::WarningKind;

    fn sign_at_15ft() -> WindLoadInput {
        WindLoadInput::new(SiteLoads::new(115.0, Exposure::C), vec![Panel::new(10.0, 4.0)], 13.0)
    }

    #[test]
    fn test_pressures_at_15ft_exposure_c() {
        let solved = calculate(&sign_at_15ft(), &SolverSettings::default()).unwrap();
        let r = &solved.value;

        // 0.00256 * 0.85 * 0.85 * 115^2
        assert!((r.velocity_pressure_psf - 24.461).abs() < 0.01, "qz = {}", r.velocity_pressure_psf);
        assert!((r.design_pressure_psf - 24.950).abs() < 0.01, "p = {}", r.design_pressure_psf);
        // G * Cf = 0.85 * 1.2
        assert!((r.design_pressure_psf / r.velocity_pressure_psf - 1.02).abs() < 1e-12);
        assert!(solved.warnings.is_empty());
    }

    #[test]
    fn test_gust_factor_applied_once() {
        let site = SiteLoads::new(115.0, Exposure::C);
        let qz = velocity_pressure(&site, 15.0);
        let doubled = velocity_pressure(&site.clone().with_gust_factor(1.7), 15.0);
        assert_eq!(qz, doubled);

        let p_085 = design_pressure(&site, qz);
        let p_170 = design_pressure(&site.with_gust_factor(1.7), qz);
        assert!((p_170 / p_085 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_force_and_moment() {
        let r = calculate(&sign_at_15ft(), &SolverSettings::default()).unwrap().value;
        assert_eq!(r.total_area_sqft, 40.0);
        assert!((r.lateral_force_lb - r.design_pressure_psf * 40.0).abs() < 1e-9);
        assert!((r.moment_kipft.value() - r.lateral_force_lb * 15.0 / 1000.0).abs() < 1e-9);
        assert!((r.factored_moment_kipft.value() - 1.6 * r.moment_kipft.value()).abs() < 1e-9);
    }

    #[test]
    fn test_stacked_panel_centroid_and_weight() {
        let input = WindLoadInput::new(
            SiteLoads::new(110.0, Exposure::B),
            vec![Panel::new(8.0, 2.0).with_weight(5.0), Panel::new(8.0, 6.0).with_weight(5.0)],
            10.0,
        );
        let r = calculate(&input, &SolverSettings::default()).unwrap().value;
        // (16 * 11 + 48 * 15) / 64
        assert!((r.centroid_height_ft - 14.0).abs() < 1e-12);
        assert_eq!(r.top_height_ft, 18.0);
        assert_eq!(r.total_weight_lb, 320.0);
    }

    #[test]
    fn test_importance_factor_scales_pressure() {
        let mut input = sign_at_15ft();
        let base = calculate(&input, &SolverSettings::default()).unwrap().value;
        input.site = input.site.with_risk_category(RiskCategory::IV);
        let iv = calculate(&input, &SolverSettings::default()).unwrap().value;
        assert!((iv.design_pressure_psf / base.design_pressure_psf - 1.15).abs() < 1e-12);
        assert_eq!(iv.velocity_pressure_psf, base.velocity_pressure_psf);
    }

    #[test]
    fn test_tall_sign_warns_but_solves() {
        let input = WindLoadInput::new(SiteLoads::new(115.0, Exposure::C), vec![Panel::new(10.0, 4.0)], 45.0);
        let solved = calculate(&input, &SolverSettings::default()).unwrap();
        assert_eq!(solved.warnings.len(), 1);
        assert!(solved.has_kind(WarningKind::Generic));
        assert!(solved.value.moment_kipft.value() > 0.0);
    }

    #[test]
    fn test_extreme_height_and_speed_warn() {
        let input = WindLoadInput::new(SiteLoads::new(210.0, Exposure::D), vec![Panel::new(10.0, 4.0)], 170.0);
        let solved = calculate(&input, &SolverSettings::default()).unwrap();
        assert_eq!(solved.warnings.len(), 3);
    }

    #[test]
    fn test_invalid_geometry_fails() {
        let settings = SolverSettings::default();
        let mut input = sign_at_15ft();
        input.panels.clear();
        assert_eq!(calculate(&input, &settings).unwrap_err().error_code(), "INVALID_INPUT");

        let mut input = sign_at_15ft();
        input.panels[0].width_ft = 0.0;
        assert!(calculate(&input, &settings).is_err());

        let mut input = sign_at_15ft();
        input.attachment_height_ft = -1.0;
        assert!(calculate(&input, &settings).is_err());

        let mut input = sign_at_15ft();
        input.site.wind_speed_mph = 0.0;
        assert!(calculate(&input, &settings).is_err());
    }

    #[test]
    fn test_repeat_calls_are_byte_identical() {
        let settings = SolverSettings::default();
        let a = calculate(&sign_at_15ft(), &settings).unwrap();
        let b = calculate(&sign_at_15ft(), &settings).unwrap();
        assert_eq!(serde_json::to_string(&a.value).unwrap(), serde_json::to_string(&b.value).unwrap());
        assert_eq!(content_hash(&a.value).unwrap(), content_hash(&b.value).unwrap());

        let env_a = ResultEnvelope::from_solved(SOLVER, a, DuplicatePolicy::Penalize).unwrap();
        let env_b = ResultEnvelope::from_solved(SOLVER, b, DuplicatePolicy::Penalize).unwrap();
        assert_eq!(env_a.to_canonical_json().unwrap(), env_b.to_canonical_json().unwrap());
    }
}
