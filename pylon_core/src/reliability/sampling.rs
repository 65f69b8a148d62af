//! Random variates, normal distribution functions and sample statistics.

use std::f64::consts::{PI, SQRT_2};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::errors::{require_non_negative, CalcError, CalcResult};

/// Seeded standard-normal generator (Box–Muller, both variates used)
pub struct NormalSampler {
    rng: StdRng,
    spare: Option<f64>,
}

impl NormalSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            spare: None,
        }
    }

    /// Next N(0, 1) variate
    pub fn standard(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        // 1 - u keeps the log argument in (0, 1]
        let u1: f64 = 1.0 - self.rng.random::<f64>();
        let u2: f64 = self.rng.random();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * PI * u2;
        self.spare = Some(radius * angle.sin());
        radius * angle.cos()
    }

    /// Next N(mean, std) variate
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        mean + std * self.standard()
    }
}

/// Complementary error function, fractional error below 1.2e-7
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Standard normal CDF Φ(x)
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Inverse standard normal CDF Φ⁻¹(p) (Acklam's rational approximation).
///
/// Returns -∞ at p = 0 and +∞ at p = 1; NaN outside [0, 1].
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_690e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

/// Two-sided critical value for a confidence level in (0, 1)
pub fn z_for_confidence(level: f64) -> CalcResult<f64> {
    if !(level > 0.0 && level < 1.0) {
        return Err(CalcError::invalid_input(
            "confidence_level",
            level.to_string(),
            "Confidence level must be in (0, 1)",
        ));
    }
    Ok(inverse_normal_cdf(0.5 + level / 2.0))
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Pearson correlation; 0 when either series has no variance
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (mx, my) = (mean(&x[..n]), mean(&y[..n]));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let (dx, dy) = (x[i] - mx, y[i] - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return 0.0;
    }
    sxy / (sxx * syy).sqrt()
}

/// Symmetric band around a nominal value for a coefficient of variation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyBand {
    pub nominal: f64,
    pub lower: f64,
    pub upper: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub confidence_level: f64,
}

pub fn uncertainty_band(nominal: f64, cov: f64, confidence_level: f64) -> CalcResult<UncertaintyBand> {
    require_non_negative("coefficient_of_variation", cov)?;
    if !nominal.is_finite() {
        return Err(CalcError::invalid_input("nominal", nominal.to_string(), "Must be finite"));
    }
    let z = z_for_confidence(confidence_level)?;
    let std_dev = (nominal * cov).abs();
    Ok(UncertaintyBand {
        nominal,
        lower: nominal - z * std_dev,
        upper: nominal + z * std_dev,
        std_dev,
        coefficient_of_variation: cov,
        confidence_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_is_reproducible() {
        let mut a = NormalSampler::new(7);
        let mut b = NormalSampler::new(7);
        for _ in 0..100 {
            assert_eq!(a.standard(), b.standard());
        }
    }

    #[test]
    fn test_sampler_moments() {
        let mut sampler = NormalSampler::new(42);
        let draws: Vec<f64> = (0..20_000).map(|_| sampler.normal(10.0, 2.0)).collect();
        assert!((mean(&draws) - 10.0).abs() < 0.1);
        assert!((std_dev(&draws) - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_normal_cdf_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975_002).abs() < 1e-5);
        assert!((normal_cdf(-3.0) - 0.001_349_9).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_cdf_roundtrip_and_ends() {
        for p in [1e-6, 0.001, 0.0245, 0.3, 0.5, 0.9, 0.999] {
            let x = inverse_normal_cdf(p);
            assert!((normal_cdf(x) - p).abs() / p < 1e-5, "p = {}", p);
        }
        assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
        assert_eq!(inverse_normal_cdf(1.0), f64::INFINITY);
        assert!(inverse_normal_cdf(1.5).is_nan());
    }

    #[test]
    fn test_z_for_confidence() {
        assert!((z_for_confidence(0.95).unwrap() - 1.959_964).abs() < 1e-5);
        assert!((z_for_confidence(0.99).unwrap() - 2.575_829).abs() < 1e-5);
        assert!(z_for_confidence(1.0).is_err());
    }

    #[test]
    fn test_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((correlation(&x, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-12);
        assert!((correlation(&x, &[8.0, 6.0, 4.0, 2.0]) + 1.0).abs() < 1e-12);
        assert_eq!(correlation(&x, &[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_uncertainty_band() {
        let band = uncertainty_band(100.0, 0.1, 0.9).unwrap();
        // z = 1.645
        assert!((band.upper - 116.449).abs() < 1e-2);
        assert!((band.lower - 83.551).abs() < 1e-2);
        assert_eq!(band.std_dev, 10.0);
        assert!(uncertainty_band(100.0, -0.1, 0.9).is_err());
    }
}
