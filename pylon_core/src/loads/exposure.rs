//! Velocity pressure exposure coefficient Kz (ASCE 7-22 Table 26.10-1)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Heights below this use the 15 ft coefficient
pub const KZ_TABLE_MIN_HEIGHT_FT: f64 = 15.0;

/// Above this the power-law expression is used
pub const KZ_TABLE_MAX_HEIGHT_FT: f64 = 160.0;

const TABLE_HEIGHTS_FT: [f64; 14] = [
    15.0, 20.0, 25.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 120.0, 140.0, 160.0,
];

/// Kz columns keyed by exposure, aligned with `TABLE_HEIGHTS_FT`
static KZ_TABLE: Lazy<[(Exposure, [f64; 14]); 3]> = Lazy::new(|| {
    [
        (
            Exposure::B,
            [0.57, 0.62, 0.66, 0.70, 0.76, 0.81, 0.85, 0.89, 0.93, 0.96, 0.99, 1.04, 1.09, 1.13],
        ),
        (
            Exposure::C,
            [0.85, 0.90, 0.94, 0.98, 1.04, 1.09, 1.13, 1.17, 1.21, 1.24, 1.26, 1.31, 1.36, 1.39],
        ),
        (
            Exposure::D,
            [1.03, 1.08, 1.12, 1.16, 1.22, 1.27, 1.31, 1.34, 1.38, 1.40, 1.43, 1.48, 1.52, 1.55],
        ),
    ]
});

/// Surface roughness exposure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exposure {
    B,
    C,
    D,
}

impl Exposure {
    /// Terrain exponent α and gradient height zg (ft), Table 26.11-1
    pub fn terrain_constants(&self) -> (f64, f64) {
        match self {
            Exposure::B => (7.0, 1200.0),
            Exposure::C => (9.5, 900.0),
            Exposure::D => (11.5, 700.0),
        }
    }

    /// Kz at height z (ft). Linear between table rows, clamped at 15 ft,
    /// power law above 160 ft.
    pub fn kz(&self, height_ft: f64) -> f64 {
        if height_ft > KZ_TABLE_MAX_HEIGHT_FT {
            let (alpha, zg) = self.terrain_constants();
            return 2.01 * (height_ft / zg).powf(2.0 / alpha);
        }

        let column = self.column();
        let z = height_ft.max(KZ_TABLE_MIN_HEIGHT_FT);

        for i in 0..TABLE_HEIGHTS_FT.len() - 1 {
            let (z0, z1) = (TABLE_HEIGHTS_FT[i], TABLE_HEIGHTS_FT[i + 1]);
            if z <= z1 {
                let t = (z - z0) / (z1 - z0);
                return column[i] + t * (column[i + 1] - column[i]);
            }
        }
        column[column.len() - 1]
    }

    fn column(&self) -> &'static [f64; 14] {
        let table: &'static [(Exposure, [f64; 14]); 3] = &KZ_TABLE;
        match self {
            Exposure::B => &table[0].1,
            Exposure::C => &table[1].1,
            Exposure::D => &table[2].1,
        }
    }
}

impl std::fmt::Display for Exposure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Exposure::B => "B",
            Exposure::C => "C",
            Exposure::D => "D",
        };
        write!(f, "{}", code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_exact() {
        assert!((Exposure::C.kz(15.0) - 0.85).abs() < 1e-12);
        assert!((Exposure::B.kz(30.0) - 0.70).abs() < 1e-12);
        assert!((Exposure::D.kz(160.0) - 1.55).abs() < 1e-12);
    }

    #[test]
    fn test_below_minimum_height_clamps() {
        assert_eq!(Exposure::C.kz(5.0), Exposure::C.kz(15.0));
    }

    #[test]
    fn test_interpolation() {
        // Halfway between 20 ft (0.90) and 25 ft (0.94)
        assert!((Exposure::C.kz(22.5) - 0.92).abs() < 1e-12);
    }

    #[test]
    fn test_power_law_above_table() {
        let kz = Exposure::C.kz(200.0);
        let expected = 2.01 * (200.0_f64 / 900.0).powf(2.0 / 9.5);
        assert!((kz - expected).abs() < 1e-12);
        assert!(kz > Exposure::C.kz(160.0));
    }

    #[test]
    fn test_rougher_terrain_is_lower() {
        for z in [15.0, 40.0, 100.0] {
            assert!(Exposure::B.kz(z) < Exposure::C.kz(z));
            assert!(Exposure::C.kz(z) < Exposure::D.kz(z));
        }
    }
}
