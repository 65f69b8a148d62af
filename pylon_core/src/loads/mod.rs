//! Site wind parameters and sign geometry per ASCE 7-22
//!
//! Value objects consumed by the load solver.
//!
//! # Overview
//!
//! - [`SiteLoads`] - wind speed, exposure, risk category and pressure factors
//! - [`Exposure`] - surface roughness category (B, C, D)
//! - [`RiskCategory`] - building risk category, sets the importance factor
//! - [`Panel`] - one rectangular sign face
//!
//! # Example
//!
//! ```
//! use pylon_core::loads::{Exposure, SiteLoads};
//!
//! let site = SiteLoads::new(115.0, Exposure::C);
//! assert_eq!(site.gust_factor, 0.85);
//! let kz = site.exposure.kz(15.0);
//! assert!((kz - 0.85).abs() < 1e-9);
//! ```

pub mod exposure;

pub use exposure::{Exposure, KZ_TABLE_MAX_HEIGHT_FT, KZ_TABLE_MIN_HEIGHT_FT};

use serde::{Deserialize, Serialize};

use crate::errors::{require_non_negative, require_positive, CalcResult};

/// Default wind directionality factor Kd (signs, ASCE 7-22 Table 26.6-1)
pub const DEFAULT_KD: f64 = 0.85;

/// Default gust-effect factor G for rigid structures
pub const DEFAULT_GUST_FACTOR: f64 = 0.85;

/// Default net force coefficient Cf for solid freestanding signs
pub const DEFAULT_FORCE_COEFFICIENT: f64 = 1.2;

/// Risk category (ASCE 7-22 Table 1.5-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskCategory {
    I,
    #[default]
    II,
    III,
    IV,
}

impl RiskCategory {
    /// Wind importance factor Iw
    pub fn importance_factor(&self) -> f64 {
        match self {
            RiskCategory::I => 0.87,
            RiskCategory::II => 1.0,
            RiskCategory::III | RiskCategory::IV => 1.15,
        }
    }
}

/// Site wind parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteLoads {
    /// Basic wind speed V (mph)
    pub wind_speed_mph: f64,
    pub exposure: Exposure,
    #[serde(default)]
    pub risk_category: RiskCategory,
    /// Gust-effect factor G
    #[serde(default = "default_gust_factor")]
    pub gust_factor: f64,
    /// Net force (shape) coefficient Cf
    #[serde(default = "default_force_coefficient")]
    pub force_coefficient: f64,
    /// Topographic factor Kzt
    #[serde(default = "default_unity")]
    pub kzt: f64,
    /// Directionality factor Kd
    #[serde(default = "default_kd")]
    pub kd: f64,
    /// Ground elevation factor Ke
    #[serde(default = "default_unity")]
    pub ke: f64,
}

fn default_gust_factor() -> f64 {
    DEFAULT_GUST_FACTOR
}

fn default_force_coefficient() -> f64 {
    DEFAULT_FORCE_COEFFICIENT
}

fn default_kd() -> f64 {
    DEFAULT_KD
}

fn default_unity() -> f64 {
    1.0
}

impl SiteLoads {
    /// Site with default factors (Risk Category II, G=0.85, Cf=1.2, Kd=0.85)
    pub fn new(wind_speed_mph: f64, exposure: Exposure) -> Self {
        Self {
            wind_speed_mph,
            exposure,
            risk_category: RiskCategory::II,
            gust_factor: DEFAULT_GUST_FACTOR,
            force_coefficient: DEFAULT_FORCE_COEFFICIENT,
            kzt: 1.0,
            kd: DEFAULT_KD,
            ke: 1.0,
        }
    }

    pub fn with_risk_category(mut self, risk_category: RiskCategory) -> Self {
        self.risk_category = risk_category;
        self
    }

    pub fn with_gust_factor(mut self, gust_factor: f64) -> Self {
        self.gust_factor = gust_factor;
        self
    }

    pub fn with_force_coefficient(mut self, cf: f64) -> Self {
        self.force_coefficient = cf;
        self
    }

    pub fn validate(&self) -> CalcResult<()> {
        require_positive("wind_speed_mph", self.wind_speed_mph)?;
        require_positive("gust_factor", self.gust_factor)?;
        require_positive("force_coefficient", self.force_coefficient)?;
        require_positive("kzt", self.kzt)?;
        require_positive("kd", self.kd)?;
        require_positive("ke", self.ke)?;
        Ok(())
    }
}

/// One rectangular sign face. Panels in a request stack vertically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub width_ft: f64,
    pub height_ft: f64,
    /// Self-weight of the face (psf)
    #[serde(default)]
    pub weight_psf: f64,
}

impl Panel {
    pub fn new(width_ft: f64, height_ft: f64) -> Self {
        Self {
            width_ft,
            height_ft,
            weight_psf: 0.0,
        }
    }

    pub fn with_weight(mut self, weight_psf: f64) -> Self {
        self.weight_psf = weight_psf;
        self
    }

    pub fn area_sqft(&self) -> f64 {
        self.width_ft * self.height_ft
    }

    pub fn validate(&self, index: usize) -> CalcResult<()> {
        require_positive(&format!("panels[{}].width_ft", index), self.width_ft)?;
        require_positive(&format!("panels[{}].height_ft", index), self.height_ft)?;
        require_non_negative(&format!("panels[{}].weight_psf", index), self.weight_psf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_factors() {
        assert_eq!(RiskCategory::I.importance_factor(), 0.87);
        assert_eq!(RiskCategory::II.importance_factor(), 1.0);
        assert_eq!(RiskCategory::IV.importance_factor(), 1.15);
    }

    #[test]
    fn test_site_defaults_from_json() {
        let site: SiteLoads =
            serde_json::from_str(r#"{"wind_speed_mph": 120.0, "exposure": "D"}"#).unwrap();
        assert_eq!(site.exposure, Exposure::D);
        assert_eq!(site.risk_category, RiskCategory::II);
        assert_eq!(site.kd, DEFAULT_KD);
        assert_eq!(site.force_coefficient, DEFAULT_FORCE_COEFFICIENT);
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_site_validation() {
        assert!(SiteLoads::new(0.0, Exposure::C).validate().is_err());
        assert!(SiteLoads::new(f64::NAN, Exposure::C).validate().is_err());
        assert!(SiteLoads::new(115.0, Exposure::C).with_gust_factor(-0.1).validate().is_err());
    }

    #[test]
    fn test_panel_validation() {
        assert!(Panel::new(10.0, 4.0).validate(0).is_ok());
        assert!(Panel::new(0.0, 4.0).validate(0).is_err());
        assert!(Panel::new(10.0, 4.0).with_weight(-1.0).validate(0).is_err());
        assert_eq!(Panel::new(10.0, 4.0).area_sqft(), 40.0);
    }
}
