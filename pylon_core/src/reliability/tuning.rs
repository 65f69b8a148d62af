//! # Auto-Tuning
//!
//! Calibrates the footing model against field-observed embedment depths.
//!
//! ```text
//! adjusted = predicted · k / m
//! k  footing calibration factor      [0.5, 2.0]
//! m  soil bearing multiplier         [0.8, 1.5]
//! objective = mean(|adjusted - observed| / observed)
//! ```
//!
//! The search is a projected BFGS over the box with central-difference
//! gradients and Armijo backtracking. A result that breaches a safety limit
//! is rejected with [`CalcError::SafetyViolation`] and the tuner keeps its
//! prior parameters: tuning never overrides safety.

use serde::{Deserialize, Serialize};

use crate::envelope::SolverInfo;
use crate::errors::{require_positive, CalcError, CalcResult};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("tuning", "1.0.0");

pub const FOOTING_CALIBRATION_BOUNDS: (f64, f64) = (0.5, 2.0);
pub const SOIL_MULTIPLIER_BOUNDS: (f64, f64) = (0.8, 1.5);

/// Fewer records than this leaves the parameters untouched
pub const MIN_RECORDS: usize = 10;

const MAX_ITERATIONS: u32 = 50;
const GRADIENT_STEP: f64 = 1e-6;
const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: u32 = 40;
const TOLERANCE: f64 = 1e-10;

/// One predicted-vs-observed embedment pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub predicted_depth_ft: f64,
    pub observed_depth_ft: f64,
}

impl FieldRecord {
    pub fn new(predicted_depth_ft: f64, observed_depth_ft: f64) -> Self {
        Self {
            predicted_depth_ft,
            observed_depth_ft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    /// k
    pub footing_calibration: f64,
    /// m
    pub soil_bearing_multiplier: f64,
    /// Fixed; not tuned
    pub safety_factor_base: f64,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            footing_calibration: 1.0,
            soil_bearing_multiplier: 1.0,
            safety_factor_base: 2.0,
        }
    }
}

impl TuningParams {
    pub fn adjust(&self, predicted_depth_ft: f64) -> f64 {
        predicted_depth_ft * self.footing_calibration / self.soil_bearing_multiplier
    }

    /// Safety factor left after calibration
    pub fn effective_safety_factor(&self) -> f64 {
        self.safety_factor_base * self.footing_calibration / self.soil_bearing_multiplier
    }
}

/// Limits no tuned parameter set may breach
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyFloors {
    pub min_effective_safety_factor: f64,
    pub max_soil_bearing_multiplier: f64,
    pub min_footing_calibration: f64,
}

impl Default for SafetyFloors {
    fn default() -> Self {
        Self {
            min_effective_safety_factor: 1.5,
            max_soil_bearing_multiplier: 1.5,
            min_footing_calibration: 0.5,
        }
    }
}

impl SafetyFloors {
    pub fn check(&self, params: &TuningParams) -> CalcResult<()> {
        let sf = params.effective_safety_factor();
        if sf < self.min_effective_safety_factor {
            return Err(CalcError::safety_violation(
                "effective_safety_factor",
                sf,
                self.min_effective_safety_factor,
            ));
        }
        if params.soil_bearing_multiplier > self.max_soil_bearing_multiplier {
            return Err(CalcError::safety_violation(
                "soil_bearing_multiplier",
                params.soil_bearing_multiplier,
                self.max_soil_bearing_multiplier,
            ));
        }
        if params.footing_calibration < self.min_footing_calibration {
            return Err(CalcError::safety_violation(
                "footing_calibration",
                params.footing_calibration,
                self.min_footing_calibration,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub params: TuningParams,
    pub prior: TuningParams,
    pub objective_before: f64,
    pub objective_after: f64,
    pub iterations: u32,
    pub converged: bool,
    pub records: usize,
}

/// Mean relative error of the adjusted predictions
pub fn mean_relative_error(records: &[FieldRecord], params: &TuningParams) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let total: f64 = records
        .iter()
        .map(|r| (params.adjust(r.predicted_depth_ft) - r.observed_depth_ft).abs() / r.observed_depth_ft)
        .sum();
    total / records.len() as f64
}

/// Holds the current calibration and replaces it only with a safe one
#[derive(Debug, Clone, Default)]
pub struct AutoTuner {
    params: TuningParams,
    floors: SafetyFloors,
}

impl AutoTuner {
    pub fn new(params: TuningParams, floors: SafetyFloors) -> Self {
        Self { params, floors }
    }

    pub fn params(&self) -> &TuningParams {
        &self.params
    }

    /// Tune against field records.
    ///
    /// # Returns
    ///
    /// * `Ok` with the prior parameters and a warning when there are fewer
    ///   than [`MIN_RECORDS`] records
    /// * `Err(CalcError::SafetyViolation)` when the optimum breaches a floor;
    ///   the tuner is left unchanged
    pub fn tune(&mut self, records: &[FieldRecord]) -> CalcResult<Solved<TuningOutcome>> {
        for r in records {
            require_positive("predicted_depth_ft", r.predicted_depth_ft)?;
            require_positive("observed_depth_ft", r.observed_depth_ft)?;
        }

        let prior = self.params;
        let before = mean_relative_error(records, &prior);

        if records.len() < MIN_RECORDS {
            let outcome = TuningOutcome {
                params: prior,
                prior,
                objective_before: before,
                objective_after: before,
                iterations: 0,
                converged: false,
                records: records.len(),
            };
            let warning = Warning::generic(
                SOLVER.name,
                format!(
                    "{} field records is below the minimum of {}; parameters unchanged",
                    records.len(),
                    MIN_RECORDS
                ),
            );
            return Ok(Solved::new(outcome, vec![warning]));
        }

        let objective = |x: [f64; 2]| {
            let params = TuningParams {
                footing_calibration: x[0],
                soil_bearing_multiplier: x[1],
                ..prior
            };
            mean_relative_error(records, &params)
        };
        let start = project([prior.footing_calibration, prior.soil_bearing_multiplier]);
        let search = minimize(objective, start);

        let tuned = TuningParams {
            footing_calibration: search.x[0],
            soil_bearing_multiplier: search.x[1],
            ..prior
        };

        if let Err(err) = self.floors.check(&tuned) {
            tracing::warn!(
                event = "tuning_rejected",
                k = tuned.footing_calibration,
                m = tuned.soil_bearing_multiplier,
                error = %err,
                "tuned parameters rejected"
            );
            return Err(err);
        }

        self.params = tuned;
        tracing::info!(
            event = "tuning_accepted",
            k = tuned.footing_calibration,
            m = tuned.soil_bearing_multiplier,
            objective_before = before,
            objective_after = search.fx,
            iterations = search.iterations,
            "tuned parameters accepted"
        );

        let mut warnings = Vec::new();
        if !search.converged {
            warnings.push(Warning::generic(
                SOLVER.name,
                format!("Search stopped at the {} iteration limit", MAX_ITERATIONS),
            ));
        }

        Ok(Solved::new(
            TuningOutcome {
                params: tuned,
                prior,
                objective_before: before,
                objective_after: search.fx,
                iterations: search.iterations,
                converged: search.converged,
                records: records.len(),
            },
            warnings,
        ))
    }
}

struct SearchResult {
    x: [f64; 2],
    fx: f64,
    iterations: u32,
    converged: bool,
}

fn project(x: [f64; 2]) -> [f64; 2] {
    [
        x[0].clamp(FOOTING_CALIBRATION_BOUNDS.0, FOOTING_CALIBRATION_BOUNDS.1),
        x[1].clamp(SOIL_MULTIPLIER_BOUNDS.0, SOIL_MULTIPLIER_BOUNDS.1),
    ]
}

fn gradient(f: &impl Fn([f64; 2]) -> f64, x: [f64; 2]) -> [f64; 2] {
    let mut g = [0.0; 2];
    for i in 0..2 {
        let mut hi = x;
        let mut lo = x;
        hi[i] += GRADIENT_STEP;
        lo[i] -= GRADIENT_STEP;
        g[i] = (f(hi) - f(lo)) / (2.0 * GRADIENT_STEP);
    }
    g
}

fn dot(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

/// Projected BFGS with Armijo backtracking on a 2-parameter box
fn minimize(f: impl Fn([f64; 2]) -> f64, start: [f64; 2]) -> SearchResult {
    let identity = [[1.0, 0.0], [0.0, 1.0]];
    let mut h = identity;
    let mut x = start;
    let mut fx = f(x);
    let mut g = gradient(&f, x);

    for iteration in 1..=MAX_ITERATIONS {
        let dir = [
            -(h[0][0] * g[0] + h[0][1] * g[1]),
            -(h[1][0] * g[0] + h[1][1] * g[1]),
        ];

        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = project([x[0] + step * dir[0], x[1] + step * dir[1]]);
            let s = [candidate[0] - x[0], candidate[1] - x[1]];
            let fc = f(candidate);
            if fc <= fx + ARMIJO_C1 * dot(g, s) && fc < fx {
                accepted = Some((candidate, s, fc));
                break;
            }
            step *= 0.5;
        }

        let Some((next, s, f_next)) = accepted else {
            if h == identity {
                // No descent even along the gradient: stationary on the box
                return SearchResult { x, fx, iterations: iteration, converged: true };
            }
            h = identity;
            continue;
        };

        let g_next = gradient(&f, next);
        let y = [g_next[0] - g[0], g_next[1] - g[1]];
        let improvement = fx - f_next;
        x = next;
        fx = f_next;
        g = g_next;

        if improvement < TOLERANCE {
            return SearchResult { x, fx, iterations: iteration, converged: true };
        }

        let sy = dot(s, y);
        if sy > 1e-12 {
            // H+ = (I - ρsyᵀ) H (I - ρysᵀ) + ρssᵀ
            let rho = 1.0 / sy;
            let hy = [h[0][0] * y[0] + h[0][1] * y[1], h[1][0] * y[0] + h[1][1] * y[1]];
            let yhy = dot(y, hy);
            let mut updated = h;
            for i in 0..2 {
                for j in 0..2 {
                    updated[i][j] = h[i][j] - rho * (hy[i] * s[j] + s[i] * hy[j])
                        + (rho * rho * yhy + rho) * s[i] * s[j];
                }
            }
            h = updated;
        } else {
            h = identity;
        }
    }

    SearchResult {
        x,
        fx,
        iterations: MAX_ITERATIONS,
        converged: false,
    }
}
