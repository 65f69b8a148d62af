//! # Monte Carlo Reliability
//!
//! Failure probability of the limit state `g = R - Q` with normal load Q
//! and resistance R.
//!
//! ## Variance reduction
//!
//! Sampling is done in standard normal space `u = (u_Q, u_R)`.
//!
//! - **Importance sampling**: draws are centred on the Hasofer–Lind design
//!   point `u* = β·(σQ/σg, -σR/σg)` and re-weighted by the likelihood ratio
//!   `φ(u)/φ(u - u*) = exp(-z·u* - |u*|²/2)` where `u = u* + z`.
//! - **Antithetic pairs**: each draw `z` is paired with `-z`. The standard
//!   error is taken over the independent pair means.
//!
//! The closed-form index `β = (μR - μQ)/√(σR² + σQ²)` is always reported
//! next to the simulated `-Φ⁻¹(pf)` as a cross-check.
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::reliability::monte_carlo::{simulate, ReliabilityInput};
//!
//! let input = ReliabilityInput::new(100.0, 10.0, 150.0, 15.0).with_seed(11);
//! let solved = simulate(&input).unwrap();
//! assert!((solved.value.beta_hl - 2.7735).abs() < 1e-3);
//! ```

use serde::{Deserialize, Serialize};

use super::sampling::{inverse_normal_cdf, mean, normal_cdf, std_dev, z_for_confidence, NormalSampler};
use crate::envelope::SolverInfo;
use crate::errors::{require_positive, CalcError, CalcResult};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("monte_carlo", "1.0.0");

/// Target reliability index for ordinary structures (ASCE 7 Risk Category II)
pub const DEFAULT_TARGET_BETA: f64 = 3.5;

/// Simulation request.
///
/// ## JSON Example
///
/// ```json
/// {
///   "load_mean": 100.0,
///   "load_std": 10.0,
///   "resistance_mean": 150.0,
///   "resistance_std": 15.0,
///   "samples": 10000,
///   "seed": 11
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityInput {
    pub load_mean: f64,
    pub load_std: f64,
    pub resistance_mean: f64,
    pub resistance_std: f64,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_target_beta")]
    pub target_beta: f64,
    /// Two-sided level of the reported intervals
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default = "default_true")]
    pub importance_sampling: bool,
    #[serde(default = "default_true")]
    pub antithetic: bool,
}

fn default_samples() -> usize {
    10_000
}

fn default_target_beta() -> f64 {
    DEFAULT_TARGET_BETA
}

fn default_confidence_level() -> f64 {
    0.99
}

fn default_true() -> bool {
    true
}

impl ReliabilityInput {
    pub fn new(load_mean: f64, load_std: f64, resistance_mean: f64, resistance_std: f64) -> Self {
        Self {
            load_mean,
            load_std,
            resistance_mean,
            resistance_std,
            samples: default_samples(),
            seed: 0,
            target_beta: DEFAULT_TARGET_BETA,
            confidence_level: default_confidence_level(),
            importance_sampling: true,
            antithetic: true,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Plain Monte Carlo, no importance sampling or antithetic pairs
    pub fn crude(mut self) -> Self {
        self.importance_sampling = false;
        self.antithetic = false;
        self
    }

    pub fn validate(&self) -> CalcResult<()> {
        for (field, value) in [("load_mean", self.load_mean), ("resistance_mean", self.resistance_mean)] {
            if !value.is_finite() {
                return Err(CalcError::invalid_input(field, value.to_string(), "Must be finite"));
            }
        }
        require_positive("load_std", self.load_std)?;
        require_positive("resistance_std", self.resistance_std)?;
        require_positive("target_beta", self.target_beta)?;
        if self.samples < 2 {
            return Err(CalcError::invalid_input(
                "samples",
                self.samples.to_string(),
                "At least two samples are required",
            ));
        }
        z_for_confidence(self.confidence_level)?;
        Ok(())
    }

    /// Hasofer–Lind index for the linear limit state
    pub fn beta_hl(&self) -> f64 {
        (self.resistance_mean - self.load_mean) / self.sigma_g()
    }

    fn sigma_g(&self) -> f64 {
        self.load_std.hypot(self.resistance_std)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityResult {
    /// Closed-form Hasofer–Lind index
    pub beta_hl: f64,
    /// -Φ⁻¹(pf); None when no failure was observed
    pub beta_simulated: Option<f64>,
    /// Interval on the simulated index; None where unbounded
    pub beta_lower: Option<f64>,
    pub beta_upper: Option<f64>,
    pub failure_probability: f64,
    pub pf_lower: f64,
    pub pf_upper: f64,
    pub standard_error: f64,
    /// Samples actually drawn (rounded down to whole pairs)
    pub samples: usize,
    /// Samples that landed in the failure region
    pub failures: usize,
    pub confidence_level: f64,
    pub target_beta: f64,
    pub passes_target: bool,
}

/// Run the simulation. Deterministic for a given input (seeded).
pub fn simulate(input: &ReliabilityInput) -> CalcResult<Solved<ReliabilityResult>> {
    input.validate()?;

    let sigma_g = input.sigma_g();
    let beta_hl = input.beta_hl();
    let design_point = if input.importance_sampling {
        (beta_hl * input.load_std / sigma_g, -beta_hl * input.resistance_std / sigma_g)
    } else {
        (0.0, 0.0)
    };
    let shift_sq = design_point.0.powi(2) + design_point.1.powi(2);

    // Weighted failure indicator for a standard-normal offset z from the design point
    let evaluate = |z: (f64, f64)| -> (bool, f64) {
        let u_q = design_point.0 + z.0;
        let u_r = design_point.1 + z.1;
        let load = input.load_mean + input.load_std * u_q;
        let resistance = input.resistance_mean + input.resistance_std * u_r;
        if resistance - load < 0.0 {
            let weight = (-(z.0 * design_point.0 + z.1 * design_point.1) - 0.5 * shift_sq).exp();
            (true, weight)
        } else {
            (false, 0.0)
        }
    };

    let mut sampler = NormalSampler::new(input.seed);
    let mut contributions = Vec::new();
    let mut failures = 0usize;

    if input.antithetic {
        for _ in 0..input.samples / 2 {
            let z = (sampler.standard(), sampler.standard());
            let (fail_a, w_a) = evaluate(z);
            let (fail_b, w_b) = evaluate((-z.0, -z.1));
            failures += usize::from(fail_a) + usize::from(fail_b);
            contributions.push(0.5 * (w_a + w_b));
        }
    } else {
        for _ in 0..input.samples {
            let (fail, w) = evaluate((sampler.standard(), sampler.standard()));
            failures += usize::from(fail);
            contributions.push(w);
        }
    }

    let samples = if input.antithetic {
        contributions.len() * 2
    } else {
        contributions.len()
    };
    let pf = mean(&contributions);
    let standard_error = std_dev(&contributions) / (contributions.len() as f64).sqrt();
    let z_c = z_for_confidence(input.confidence_level)?;

    let mut warnings = Vec::new();
    let (pf_lower, pf_upper) = if failures == 0 {
        warnings.push(Warning::generic(
            SOLVER.name,
            format!("No failures in {} samples; pf bounded by the rule of three", samples),
        ));
        (0.0, (3.0 / samples as f64).min(1.0))
    } else {
        ((pf - z_c * standard_error).max(0.0), (pf + z_c * standard_error).min(1.0))
    };

    let implied = |p: f64| {
        let beta = -inverse_normal_cdf(p);
        beta.is_finite().then_some(beta)
    };
    let beta_simulated = if failures == 0 { None } else { implied(pf) };
    let beta_lower = implied(pf_upper);
    let beta_upper = implied(pf_lower);

    let pf_closed_form = normal_cdf(-beta_hl);
    if failures > 0 && !(pf_lower..=pf_upper).contains(&pf_closed_form) {
        warnings.push(Warning::generic(
            SOLVER.name,
            format!(
                "Simulated pf {:.3e} disagrees with the closed-form {:.3e} at the {:.0}% level",
                pf,
                pf_closed_form,
                input.confidence_level * 100.0
            ),
        ));
    }

    let passes_target = beta_hl >= input.target_beta;
    if !passes_target {
        warnings.push(Warning::failed_check(
            SOLVER.name,
            format!("Reliability index {:.3} is below the target {:.2}", beta_hl, input.target_beta),
        ));
    }

    tracing::debug!(beta_hl, pf, standard_error, failures, samples, "monte carlo finished");

    Ok(Solved::new(
        ReliabilityResult {
            beta_hl,
            beta_simulated,
            beta_lower,
            beta_upper,
            failure_probability: pf,
            pf_lower,
            pf_upper,
            standard_error,
            samples,
            failures,
            confidence_level: input.confidence_level,
            target_beta: input.target_beta,
            passes_target,
        },
        warnings,
    ))
}
