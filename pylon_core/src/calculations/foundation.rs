//! # Foundation Embedment
//!
//! Minimum embedment depth of a drilled pier or direct-embedded pole in
//! soil, nonconstrained at grade (IBC 1807.3.2.1).
//!
//! ## Method
//!
//! ```text
//! d  = 0.5·A·(1 + √(1 + 4.36·h/A))            (IBC Eq. 18-1)
//! A  = 2.34·P / (S1·b)
//! S1 = 2 · Slat · min(d/3, 15)                 (lateral bearing at d/3, isolated pole)
//! ```
//!
//! `Slat` is the presumptive lateral bearing per foot of depth, interpolated
//! from the allowable vertical bearing along IBC Table 1806.2. Because S1
//! depends on depth the equation is implicit. It is solved by fixed-point
//! iteration on the rearranged form `d² = A(d)·(d + 1.09h)`:
//!
//! 1. trial depth: closed form with S1 taken at the minimum embedment
//! 2. `d ← ∛(A(d)·d·(d + 1.09h))` until the relative change is under the
//!    configured tolerance or the iteration budget runs out
//!
//! Those two settings only decide the [`Convergence`] tag. The reported
//! depth is the same iteration carried on to a 1e-10 ft step, so it is the
//! fixed point itself and never decreases as the load grows.
//!
//! Non-convergence is an outcome, not an error: the depth comes back tagged
//! `request_engineering`. The minimum embedment floor is applied after the
//! formula.
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::calculations::foundation::{solve, Convergence, FoundationInput};
//! use pylon_core::settings::SolverSettings;
//! use pylon_core::units::KipFt;
//!
//! let input = FoundationInput::from_moment(KipFt(50.0), 15.0, 3.0, 3000.0);
//! let solved = solve(&input, &SolverSettings::default()).unwrap();
//! assert!(matches!(solved.value.convergence, Convergence::Converged { .. }));
//! assert!(solved.value.depth_ft >= 3.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::envelope::SolverInfo;
use crate::errors::{require_non_negative, require_positive, CalcResult};
use crate::settings::SolverSettings;
use crate::units::{FtLb, KipFt};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("foundation", "1.3.0");

/// Increase allowed for isolated poles not adversely affected by 1/2 in. of
/// ground-surface motion (IBC 1806.3.4)
pub const ISOLATED_POLE_FACTOR: f64 = 2.0;

/// Lateral bearing may not exceed this multiple of the tabulated value
pub const MAX_DEPTH_MULTIPLE: f64 = 15.0;

/// Step size (ft) at which the reported depth is taken as the fixed point
const DEPTH_RESOLUTION_FT: f64 = 1e-10;

/// Hard cap on refinement steps
const MAX_REFINEMENT_STEPS: u32 = 500;

/// (allowable vertical bearing psf, lateral bearing psf/ft), IBC Table 1806.2
const PRESUMPTIVE_BEARING: [(f64, f64); 6] = [
    (0.0, 0.0),
    (1500.0, 100.0),
    (2000.0, 150.0),
    (3000.0, 200.0),
    (4000.0, 400.0),
    (12000.0, 1200.0),
];

/// Input for the foundation solver.
///
/// ## JSON Example
///
/// ```json
/// {
///   "lateral_force_lb": 3333.3,
///   "load_height_ft": 15.0,
///   "diameter_ft": 3.0,
///   "soil_bearing_psf": 3000.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationInput {
    /// Service lateral force P (lb)
    pub lateral_force_lb: f64,
    /// Height of the force resultant above grade, h (ft)
    pub load_height_ft: f64,
    /// Pier or pole diameter, b (ft)
    pub diameter_ft: f64,
    /// Allowable vertical soil bearing pressure (psf)
    pub soil_bearing_psf: f64,
}

impl FoundationInput {
    /// Derive P from a moment at grade and its lever arm
    pub fn from_moment(moment: KipFt, load_height_ft: f64, diameter_ft: f64, soil_bearing_psf: f64) -> Self {
        let moment_ftlb: FtLb = moment.into();
        Self {
            lateral_force_lb: moment_ftlb.value() / load_height_ft,
            load_height_ft,
            diameter_ft,
            soil_bearing_psf,
        }
    }

    pub fn validate(&self) -> CalcResult<()> {
        require_non_negative("lateral_force_lb", self.lateral_force_lb)?;
        require_positive("load_height_ft", self.load_height_ft)?;
        require_positive("diameter_ft", self.diameter_ft)?;
        require_positive("soil_bearing_psf", self.soil_bearing_psf)?;
        Ok(())
    }
}

/// How the iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Convergence {
    Converged { iterations: u32 },
    /// Budget exhausted; depth is the last estimate
    NotConverged { iterations: u32 },
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged { .. })
    }

    pub fn iterations(&self) -> u32 {
        match self {
            Convergence::Converged { iterations } | Convergence::NotConverged { iterations } => *iterations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationResult {
    /// Required embedment depth (ft), never below the floor
    pub depth_ft: f64,
    /// Depth from the formula before the floor was applied (ft)
    pub formula_depth_ft: f64,
    pub minimum_governs: bool,
    pub convergence: Convergence,
    /// Set when the depth needs review by an engineer
    pub request_engineering: bool,
    /// Presumptive lateral bearing (psf/ft)
    pub lateral_bearing_psf_per_ft: f64,
    /// S1 at the final depth (psf)
    pub s1_psf: f64,
    /// Lateral force the final depth can resist (lb)
    pub lateral_capacity_lb: f64,
    /// lateral_capacity / applied force, on top of the allowable-stress margin
    pub capacity_ratio: f64,
    /// P·h at grade (kip-ft)
    pub overturning_moment_kipft: f64,
    /// Moment at grade the embedment can resist (kip-ft)
    pub resisting_moment_kipft: f64,
    pub depth_to_diameter: f64,
}

/// Presumptive lateral bearing per foot of depth for an allowable vertical
/// bearing pressure (psf/ft)
pub fn lateral_bearing_per_ft(soil_bearing_psf: f64) -> f64 {
    let last = PRESUMPTIVE_BEARING[PRESUMPTIVE_BEARING.len() - 1];
    if soil_bearing_psf >= last.0 {
        return last.1;
    }
    for pair in PRESUMPTIVE_BEARING.windows(2) {
        let ((v0, l0), (v1, l1)) = (pair[0], pair[1]);
        if soil_bearing_psf <= v1 {
            return l0 + (soil_bearing_psf - v0) / (v1 - v0) * (l1 - l0);
        }
    }
    last.1
}

/// S1 at depth d: lateral bearing evaluated at d/3, isolated-pole increase,
/// capped at 15 times the tabulated value
fn s1_at_depth(lateral_per_ft: f64, depth_ft: f64) -> f64 {
    ISOLATED_POLE_FACTOR * lateral_per_ft * (depth_ft / 3.0).min(MAX_DEPTH_MULTIPLE)
}

/// IBC Eq. 18-1 closed form for a fixed S1
fn closed_form_depth(p: f64, h: f64, b: f64, s1: f64) -> f64 {
    let a = 2.34 * p / (s1 * b);
    0.5 * a * (1.0 + (1.0 + 4.36 * h / a).sqrt())
}

/// One fixed-point step `d ← ∛(A(d)·d·(d + 1.09h))`
fn next_depth(p: f64, h: f64, b: f64, lateral_per_ft: f64, depth_ft: f64) -> f64 {
    let a = 2.34 * p / (s1_at_depth(lateral_per_ft, depth_ft) * b);
    (a * depth_ft * (depth_ft + 1.09 * h)).cbrt()
}

/// Lateral force resisted at depth d (Eq. 18-1 solved for P)
fn lateral_capacity(h: f64, b: f64, lateral_per_ft: f64, depth_ft: f64) -> f64 {
    let a = depth_ft.powi(2) / (depth_ft + 1.09 * h);
    a * s1_at_depth(lateral_per_ft, depth_ft) * b / 2.34
}

/// Solve for embedment depth.
///
/// Fails on non-positive soil bearing, diameter or load height, and on a
/// negative load. Otherwise always returns a finite depth.
pub fn solve(input: &FoundationInput, settings: &SolverSettings) -> CalcResult<Solved<FoundationResult>> {
    input.validate()?;
    settings.validate()?;

    let p = input.lateral_force_lb;
    let h = input.load_height_ft;
    let b = input.diameter_ft;
    let floor = settings.min_embedment_ft;
    let lateral_per_ft = lateral_bearing_per_ft(input.soil_bearing_psf);

    // === Fixed-point iteration ===
    let (formula_depth, convergence) = if p == 0.0 {
        (0.0, Convergence::Converged { iterations: 0 })
    } else {
        let mut depth = closed_form_depth(p, h, b, s1_at_depth(lateral_per_ft, floor));
        let mut outcome = Convergence::NotConverged {
            iterations: settings.foundation_max_iterations,
        };
        for iteration in 1..=settings.foundation_max_iterations {
            let next = next_depth(p, h, b, lateral_per_ft, depth);
            let change = (next - depth).abs() / depth;
            tracing::trace!(iteration, depth_ft = next, change, "foundation iteration");
            depth = next;
            if change < settings.foundation_tolerance {
                outcome = Convergence::Converged { iterations: iteration };
                break;
            }
        }
        for _ in 0..MAX_REFINEMENT_STEPS {
            let next = next_depth(p, h, b, lateral_per_ft, depth);
            let step = (next - depth).abs();
            depth = next;
            if step < DEPTH_RESOLUTION_FT {
                break;
            }
        }
        (depth, outcome)
    };

    // === Floor and checks ===
    let depth = formula_depth.max(floor);
    let minimum_governs = formula_depth < floor;
    let capacity = lateral_capacity(h, b, lateral_per_ft, depth);
    let capacity_ratio = if p > 0.0 { capacity / p } else { f64::INFINITY };

    let mut warnings = Vec::new();
    if let Convergence::NotConverged { iterations } = convergence {
        warnings.push(Warning::engineering_review(
            SOLVER.name,
            format!(
                "request_engineering: embedment did not converge in {} iterations; refined depth {:.2} ft",
                iterations, depth
            ),
        ));
    }
    if depth > settings.max_footing_depth_ft {
        warnings.push(Warning::engineering_review(
            SOLVER.name,
            format!(
                "request_engineering: embedment {:.2} ft exceeds the {:.1} ft limit",
                depth, settings.max_footing_depth_ft
            ),
        ));
    }
    let request_engineering = !warnings.is_empty();

    tracing::debug!(
        depth_ft = depth,
        iterations = convergence.iterations(),
        converged = convergence.is_converged(),
        "foundation solved"
    );

    Ok(Solved::new(
        FoundationResult {
            depth_ft: depth,
            formula_depth_ft: formula_depth,
            minimum_governs,
            convergence,
            request_engineering,
            lateral_bearing_psf_per_ft: lateral_per_ft,
            s1_psf: s1_at_depth(lateral_per_ft, depth),
            lateral_capacity_lb: capacity,
            // serde_json cannot carry infinity; an unloaded pier reports 0
            capacity_ratio: if capacity_ratio.is_finite() { capacity_ratio } else { 0.0 },
            overturning_moment_kipft: KipFt::from(FtLb(p * h)).value(),
            resisting_moment_kipft: KipFt::from(FtLb(capacity * h)).value(),
            depth_to_diameter: depth / b,
        },
        warnings,
    ))
}
