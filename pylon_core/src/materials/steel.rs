//! Steel Section Catalog (AISC)
//!
//! Read-only index of section properties used by the member selector.
//! Rows are sourced externally (CSV export of the AISC Shapes Database or a
//! shop's stock list) and never mutated after loading.
//!
//! ## CSV Format
//!
//! The header row uses the [`SectionProperties`] field names:
//!
//! ```text
//! designation,family,weight_plf,area_in2,ix_in4,iy_in4,sx_in3,sy_in3,rx_in,ry_in,fy_ksi,design_wall
//! HSS8X8X1/4,HSS,25.82,7.10,70.7,70.7,17.7,17.7,3.15,3.15,46,true
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::materials::steel::{builtin_catalog, CatalogQuery, SectionFamily};
//!
//! let catalog = builtin_catalog();
//! let hss = catalog.query(&CatalogQuery::new().family(SectionFamily::Hss).min_sx(40.0));
//! assert!(hss.iter().all(|s| s.sx_in3 >= 40.0));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::errors::{CalcError, CalcResult};

/// Design wall thickness factor for hollow sections whose listed properties
/// are based on nominal wall (AISC 360 B4.2)
pub const DESIGN_WALL_FACTOR: f64 = 0.93;

/// Section family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionFamily {
    /// Square/rectangular hollow structural section
    #[serde(rename = "HSS")]
    Hss,
    /// Standard weight pipe
    #[serde(rename = "PIPE")]
    Pipe,
    /// Wide flange
    #[serde(rename = "W")]
    W,
}

impl SectionFamily {
    pub const ALL: [SectionFamily; 3] = [SectionFamily::Hss, SectionFamily::Pipe, SectionFamily::W];

    /// Parse from a family code ("HSS", "PIPE", "W"), case-insensitive
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HSS" => Some(SectionFamily::Hss),
            "PIPE" => Some(SectionFamily::Pipe),
            "W" => Some(SectionFamily::W),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SectionFamily::Hss => "HSS Rectangular/Square",
            SectionFamily::Pipe => "Pipe",
            SectionFamily::W => "Wide Flange (W)",
        }
    }

    /// Hollow sections are subject to the design wall thickness reduction
    pub fn is_hollow(&self) -> bool {
        matches!(self, SectionFamily::Hss | SectionFamily::Pipe)
    }
}

impl std::fmt::Display for SectionFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// ASTM steel grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SteelGrade {
    #[serde(rename = "A500B")]
    A500B,
    #[serde(rename = "A500C")]
    A500C,
    #[serde(rename = "A53B")]
    A53B,
    #[serde(rename = "A36")]
    A36,
    #[serde(rename = "A572-50")]
    A572Gr50,
    #[serde(rename = "A992")]
    A992,
}

impl SteelGrade {
    /// Minimum yield stress Fy (ksi)
    pub fn fy_ksi(&self) -> f64 {
        match self {
            SteelGrade::A500B => 46.0,
            SteelGrade::A500C => 50.0,
            SteelGrade::A53B => 35.0,
            SteelGrade::A36 => 36.0,
            SteelGrade::A572Gr50 => 50.0,
            SteelGrade::A992 => 50.0,
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace(' ', "").as_str() {
            "A500B" | "A500GRB" => Some(SteelGrade::A500B),
            "A500C" | "A500GRC" => Some(SteelGrade::A500C),
            "A53B" | "A53GRB" => Some(SteelGrade::A53B),
            "A36" => Some(SteelGrade::A36),
            "A572-50" | "A572GR50" => Some(SteelGrade::A572Gr50),
            "A992" => Some(SteelGrade::A992),
            _ => None,
        }
    }

    /// Whether sections of `family` are produced to this grade
    pub fn applies_to(&self, family: SectionFamily) -> bool {
        match family {
            SectionFamily::Hss => matches!(self, SteelGrade::A500B | SteelGrade::A500C),
            SectionFamily::Pipe => matches!(self, SteelGrade::A53B | SteelGrade::A500B),
            SectionFamily::W => matches!(
                self,
                SteelGrade::A992 | SteelGrade::A572Gr50 | SteelGrade::A36
            ),
        }
    }
}

/// One catalog row. All dimensional values are US customary (in, in², in³, in⁴).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionProperties {
    /// AISC Manual label (e.g., "HSS8X8X1/2", "PIPE6STD")
    pub designation: String,

    pub family: SectionFamily,

    /// Nominal weight per linear foot (lb/ft)
    pub weight_plf: f64,

    /// Cross-sectional area (in²)
    pub area_in2: f64,

    // === Strong Axis (X-X) ===
    pub ix_in4: f64,
    pub sx_in3: f64,
    pub rx_in: f64,

    // === Weak Axis (Y-Y) ===
    pub iy_in4: f64,
    pub sy_in3: f64,
    pub ry_in: f64,

    /// Listed yield stress (ksi) for the row's default grade
    pub fy_ksi: f64,

    /// True when listed properties already use the design wall thickness
    #[serde(default = "default_design_wall")]
    pub design_wall: bool,
}

fn default_design_wall() -> bool {
    true
}

impl SectionProperties {
    /// Governing radius of gyration (minimum of rx, ry)
    pub fn r_min(&self) -> f64 {
        self.rx_in.min(self.ry_in)
    }

    /// Slenderness KL/r for an effective length in inches
    pub fn slenderness(&self, effective_length_in: f64) -> f64 {
        effective_length_in / self.r_min()
    }

    /// Strong-axis section modulus used for design, reduced for nominal-wall
    /// hollow sections
    pub fn effective_sx(&self) -> f64 {
        if self.family.is_hollow() && !self.design_wall {
            self.sx_in3 * DESIGN_WALL_FACTOR
        } else {
            self.sx_in3
        }
    }

    fn validate(&self, row: usize) -> CalcResult<()> {
        let checks = [
            ("weight_plf", self.weight_plf),
            ("area_in2", self.area_in2),
            ("ix_in4", self.ix_in4),
            ("sx_in3", self.sx_in3),
            ("rx_in", self.rx_in),
            ("iy_in4", self.iy_in4),
            ("sy_in3", self.sy_in3),
            ("ry_in", self.ry_in),
            ("fy_ksi", self.fy_ksi),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(CalcError::catalog(format!(
                    "row {} ({}): {} must be positive, got {}",
                    row, self.designation, field, value
                )));
            }
        }
        if self.designation.trim().is_empty() {
            return Err(CalcError::catalog(format!("row {}: empty designation", row)));
        }
        Ok(())
    }
}

impl std::fmt::Display for SectionProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.2} plf, Sx={:.1} in³, r={:.2} in)",
            self.designation,
            self.weight_plf,
            self.sx_in3,
            self.r_min()
        )
    }
}

/// Filter for [`SectionCatalog::query`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    pub family: Option<SectionFamily>,
    pub min_sx_in3: Option<f64>,
    pub max_weight_plf: Option<f64>,
    pub designation_prefix: Option<String>,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn family(mut self, family: SectionFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn min_sx(mut self, sx_in3: f64) -> Self {
        self.min_sx_in3 = Some(sx_in3);
        self
    }

    pub fn max_weight(mut self, weight_plf: f64) -> Self {
        self.max_weight_plf = Some(weight_plf);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.designation_prefix = Some(prefix.into().to_uppercase());
        self
    }

    fn matches(&self, section: &SectionProperties) -> bool {
        self.family.map_or(true, |f| section.family == f)
            && self.min_sx_in3.map_or(true, |s| section.sx_in3 >= s)
            && self.max_weight_plf.map_or(true, |w| section.weight_plf <= w)
            && self
                .designation_prefix
                .as_deref()
                .map_or(true, |p| section.designation.to_uppercase().starts_with(p))
    }
}

/// Section catalog keyed by uppercase designation.
///
/// Backed by a `BTreeMap` so every iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct SectionCatalog {
    sections: BTreeMap<String, SectionProperties>,

    /// Source label (e.g., "builtin-common", file name)
    pub version: Option<String>,
}

impl SectionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a CSV file
    pub fn load_from_csv(path: impl AsRef<Path>) -> CalcResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            CalcError::file_error("open", path.display().to_string(), e.to_string())
        })?;
        let mut catalog = Self::from_reader(file)?;
        catalog.version = Some(path.display().to_string());
        Ok(catalog)
    }

    /// Load a catalog from any CSV reader
    pub fn from_reader<R: Read>(reader: R) -> CalcResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut catalog = SectionCatalog::new();

        for (index, record) in csv_reader.deserialize::<SectionProperties>().enumerate() {
            let row = index + 2; // header is row 1
            let section = record.map_err(|e| CalcError::catalog(format!("row {}: {}", row, e)))?;
            section.validate(row)?;
            catalog.insert(section);
        }

        tracing::debug!(sections = catalog.len(), "loaded section catalog");
        Ok(catalog)
    }

    /// Insert a section; a later row with the same designation replaces the earlier one
    pub fn insert(&mut self, section: SectionProperties) {
        self.sections.insert(section.designation.to_uppercase(), section);
    }

    /// Look up a section by designation (case-insensitive)
    pub fn lookup(&self, designation: &str) -> CalcResult<&SectionProperties> {
        self.sections
            .get(&designation.to_uppercase())
            .ok_or_else(|| CalcError::section_not_found(designation))
    }

    /// All sections of one family, in designation order
    pub fn of_family(&self, family: SectionFamily) -> Vec<&SectionProperties> {
        self.query(&CatalogQuery::new().family(family))
    }

    /// Sections matching a query, in designation order
    pub fn query(&self, query: &CatalogQuery) -> Vec<&SectionProperties> {
        self.sections.values().filter(|s| query.matches(s)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionProperties> {
        self.sections.values()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

// ============================================================================
// Built-in Common Sections (for use without a CSV file)
// ============================================================================

/// Catalog of common sign-pole sections (AISC Manual 16th Ed).
pub fn builtin_catalog() -> SectionCatalog {
    let mut catalog = SectionCatalog::new();

    // Square HSS: (label, W, A, I, S, r), A500 Gr. B, design wall
    let square_hss = [
        ("HSS4X4X1/4", 12.21, 3.37, 7.80, 3.90, 1.52),
        ("HSS6X6X1/4", 19.02, 5.24, 28.6, 9.54, 2.34),
        ("HSS6X6X3/8", 27.48, 7.58, 39.5, 13.2, 2.28),
        ("HSS8X8X1/4", 25.82, 7.10, 70.7, 17.7, 3.15),
        ("HSS8X8X3/8", 37.69, 10.4, 100.0, 25.0, 3.10),
        ("HSS8X8X1/2", 48.85, 13.5, 125.0, 31.2, 3.04),
        ("HSS10X10X3/8", 47.90, 13.2, 202.0, 40.4, 3.91),
        ("HSS10X10X1/2", 62.46, 17.2, 256.0, 51.2, 3.86),
        ("HSS12X12X3/8", 58.10, 16.0, 357.0, 59.6, 4.72),
        ("HSS12X12X1/2", 76.07, 21.0, 459.0, 76.5, 4.68),
        ("HSS14X14X1/2", 89.68, 24.6, 744.0, 106.0, 5.49),
        ("HSS16X16X1/2", 103.3, 28.3, 1130.0, 141.0, 6.31),
    ];
    for (label, w, a, i, s, r) in square_hss {
        catalog.insert(symmetric_section(label, SectionFamily::Hss, w, a, i, s, r, 46.0));
    }

    // Standard pipe: (label, W, A, I, S, r), A53 Gr. B
    let pipe = [
        ("PIPE4STD", 10.79, 2.96, 6.82, 3.21, 1.51),
        ("PIPE6STD", 18.97, 5.20, 26.5, 8.50, 2.25),
        ("PIPE8STD", 28.55, 7.85, 68.1, 15.8, 2.95),
        ("PIPE10STD", 40.48, 11.5, 151.0, 28.1, 3.68),
        ("PIPE12STD", 49.56, 13.7, 262.0, 41.0, 4.39),
    ];
    for (label, w, a, i, s, r) in pipe {
        catalog.insert(symmetric_section(label, SectionFamily::Pipe, w, a, i, s, r, 35.0));
    }

    // W-shapes: (label, W, A, Ix, Sx, rx, Iy, Sy, ry), A992
    let w_shapes = [
        ("W8X18", 18.0, 5.26, 61.9, 15.2, 3.43, 7.97, 3.04, 1.23),
        ("W8X31", 31.0, 9.12, 110.0, 27.5, 3.47, 37.1, 9.27, 2.02),
        ("W10X33", 33.0, 9.71, 170.0, 35.0, 4.19, 36.6, 9.20, 1.94),
        ("W12X26", 26.0, 7.65, 204.0, 33.4, 5.17, 17.3, 5.34, 1.51),
        ("W12X40", 40.0, 11.7, 307.0, 51.5, 5.13, 44.1, 11.0, 1.94),
        ("W14X48", 48.0, 14.1, 485.0, 70.2, 5.85, 51.4, 12.8, 1.91),
        ("W16X36", 36.0, 10.6, 448.0, 56.5, 6.51, 24.5, 7.00, 1.52),
        ("W18X50", 50.0, 14.7, 800.0, 88.9, 7.38, 40.1, 10.7, 1.65),
    ];
    for (label, w, a, ix, sx, rx, iy, sy, ry) in w_shapes {
        catalog.insert(SectionProperties {
            designation: label.to_string(),
            family: SectionFamily::W,
            weight_plf: w,
            area_in2: a,
            ix_in4: ix,
            sx_in3: sx,
            rx_in: rx,
            iy_in4: iy,
            sy_in3: sy,
            ry_in: ry,
            fy_ksi: 50.0,
            design_wall: true,
        });
    }

    catalog.version = Some("builtin-common".to_string());
    catalog
}

#[allow(clippy::too_many_arguments)]
fn symmetric_section(
    label: &str,
    family: SectionFamily,
    weight_plf: f64,
    area_in2: f64,
    i_in4: f64,
    s_in3: f64,
    r_in: f64,
    fy_ksi: f64,
) -> SectionProperties {
    SectionProperties {
        designation: label.to_string(),
        family,
        weight_plf,
        area_in2,
        ix_in4: i_in4,
        sx_in3: s_in3,
        rx_in: r_in,
        iy_in4: i_in4,
        sy_in3: s_in3,
        ry_in: r_in,
        fy_ksi,
        design_wall: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parsing() {
        assert_eq!(SectionFamily::from_code("hss"), Some(SectionFamily::Hss));
        assert_eq!(SectionFamily::from_code("PIPE"), Some(SectionFamily::Pipe));
        assert_eq!(SectionFamily::from_code("L"), None);
    }

    #[test]
    fn test_grade_parsing_and_compatibility() {
        assert_eq!(SteelGrade::from_code("A500B"), Some(SteelGrade::A500B));
        assert_eq!(SteelGrade::from_code("a572-50"), Some(SteelGrade::A572Gr50));
        assert_eq!(SteelGrade::A500B.fy_ksi(), 46.0);
        assert!(SteelGrade::A500B.applies_to(SectionFamily::Hss));
        assert!(!SteelGrade::A992.applies_to(SectionFamily::Hss));
        assert!(SteelGrade::A992.applies_to(SectionFamily::W));
    }

    #[test]
    fn test_builtin_lookup() {
        let catalog = builtin_catalog();
        assert!(catalog.len() > 20);

        let hss = catalog.lookup("hss12x12x3/8").unwrap();
        assert_eq!(hss.family, SectionFamily::Hss);
        assert!((hss.sx_in3 - 59.6).abs() < 1e-9);
        assert!(catalog.lookup("HSS99X99X1").is_err());
    }

    #[test]
    fn test_query_is_sorted_and_filtered() {
        let catalog = builtin_catalog();
        let results = catalog.query(&CatalogQuery::new().family(SectionFamily::Pipe).max_weight(30.0));
        assert_eq!(results.len(), 3);
        let names: Vec<&str> = results.iter().map(|s| s.designation.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        let w12 = catalog.query(&CatalogQuery::new().prefix("w12"));
        assert_eq!(w12.len(), 2);
    }

    #[test]
    fn test_effective_sx_for_nominal_wall() {
        let mut section = builtin_catalog().lookup("HSS8X8X1/4").unwrap().clone();
        assert_eq!(section.effective_sx(), section.sx_in3);
        section.design_wall = false;
        assert!((section.effective_sx() - 17.7 * 0.93).abs() < 1e-9);
    }

    #[test]
    fn test_load_from_csv_reader() {
        let csv = "designation,family,weight_plf,area_in2,ix_in4,iy_in4,sx_in3,sy_in3,rx_in,ry_in,fy_ksi,design_wall\n\
                   HSS5X5X1/4,HSS,15.62,4.30,15.6,15.6,6.25,6.25,1.90,1.90,46,false\n\
                   W6X15,W,15,4.43,29.1,9.32,9.72,3.11,2.56,1.45,50,true\n";
        let catalog = SectionCatalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        let hss = catalog.lookup("HSS5X5X1/4").unwrap();
        assert!(!hss.design_wall);
        assert_eq!(hss.r_min(), 1.90);
    }

    #[test]
    fn test_csv_rejects_non_positive_properties() {
        let csv = "designation,family,weight_plf,area_in2,ix_in4,iy_in4,sx_in3,sy_in3,rx_in,ry_in,fy_ksi\n\
                   BAD,HSS,10,0,1,1,1,1,1,1,46\n";
        let err = SectionCatalog::from_reader(csv.as_bytes()).unwrap_err();
        assert_eq!(err.error_code(), "CATALOG_ERROR");
    }

    #[test]
    fn test_section_display() {
        let catalog = builtin_catalog();
        let display = format!("{}", catalog.lookup("PIPE6STD").unwrap());
        assert!(display.contains("PIPE6STD"));
        assert!(display.contains("18.97"));
    }
}
