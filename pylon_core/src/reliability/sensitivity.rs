//! # Sensitivity Analysis
//!
//! Ranks uncertain inputs by how much of the output variance each explains.
//!
//! Two independent sample matrices A and B are drawn. For input i, matrix
//! `AB_i` is A with column i replaced by B's. The outputs `y_B` and `y_ABi`
//! share only input i, so their correlation estimates the first-order index
//! `S_i = Var(E[Y|X_i]) / Var(Y)`. The outputs `y_A` and `y_ABi` share every
//! input except i, so `1 - corr(y_A, y_ABi)` is a total-effect proxy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::sampling::{correlation, std_dev, NormalSampler};
use crate::envelope::SolverInfo;
use crate::errors::{require_non_negative, CalcError, CalcResult};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("sensitivity", "1.0.0");

/// One normally distributed model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertainInput {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

impl UncertainInput {
    pub fn new(name: impl Into<String>, mean: f64, std: f64) -> Self {
        Self {
            name: name.into(),
            mean,
            std,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityIndex {
    pub name: String,
    pub first_order: f64,
    pub total_effect: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    /// Indices in input order
    pub indices: Vec<SensitivityIndex>,
    /// Input names, most influential first
    pub ranked: Vec<String>,
    pub output_std: f64,
    pub samples: usize,
}

impl SensitivityResult {
    pub fn index(&self, name: &str) -> Option<&SensitivityIndex> {
        self.indices.iter().find(|i| i.name == name)
    }
}

fn validate(inputs: &[UncertainInput], samples: usize) -> CalcResult<()> {
    if inputs.is_empty() {
        return Err(CalcError::invalid_input("inputs", "[]", "At least one input is required"));
    }
    if samples < 2 {
        return Err(CalcError::invalid_input(
            "samples",
            samples.to_string(),
            "At least two samples are required",
        ));
    }
    let mut seen = BTreeSet::new();
    for input in inputs {
        if !seen.insert(input.name.as_str()) {
            return Err(CalcError::invalid_input("name", &input.name, "Input names must be unique"));
        }
        if !input.mean.is_finite() {
            return Err(CalcError::invalid_input(&input.name, input.mean.to_string(), "Mean must be finite"));
        }
        require_non_negative(&input.name, input.std)?;
    }
    Ok(())
}

fn evaluate<F>(model: &F, rows: &[Vec<f64>]) -> CalcResult<Vec<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    rows.iter()
        .map(|row| {
            let y = model(row);
            if y.is_finite() {
                Ok(y)
            } else {
                Err(CalcError::invalid_input(
                    "model",
                    y.to_string(),
                    "Model produced a non-finite output",
                ))
            }
        })
        .collect()
}

/// Estimate sensitivity indices of `model` over `inputs`.
///
/// `model` receives one value per input, in the order given. Costs
/// `samples · (inputs + 2)` model evaluations.
pub fn analyze<F>(
    inputs: &[UncertainInput],
    model: F,
    samples: usize,
    seed: u64,
) -> CalcResult<Solved<SensitivityResult>>
where
    F: Fn(&[f64]) -> f64,
{
    validate(inputs, samples)?;

    let mut sampler = NormalSampler::new(seed);
    let mut draw_matrix = || -> Vec<Vec<f64>> {
        (0..samples)
            .map(|_| inputs.iter().map(|x| sampler.normal(x.mean, x.std)).collect())
            .collect()
    };
    let a = draw_matrix();
    let b = draw_matrix();

    let y_a = evaluate(&model, &a)?;
    let y_b = evaluate(&model, &b)?;
    let output_std = std_dev(&y_a);

    let mut warnings = Vec::new();
    let mut indices = Vec::with_capacity(inputs.len());

    if output_std == 0.0 {
        warnings.push(Warning::generic(
            SOLVER.name,
            "Model output has no variance; every input ranks at zero",
        ));
        for input in inputs {
            indices.push(SensitivityIndex {
                name: input.name.clone(),
                first_order: 0.0,
                total_effect: 0.0,
            });
        }
    } else {
        for (i, input) in inputs.iter().enumerate() {
            let ab: Vec<Vec<f64>> = a
                .iter()
                .zip(&b)
                .map(|(row_a, row_b)| {
                    let mut row = row_a.clone();
                    row[i] = row_b[i];
                    row
                })
                .collect();
            let y_ab = evaluate(&model, &ab)?;
            indices.push(SensitivityIndex {
                name: input.name.clone(),
                first_order: correlation(&y_b, &y_ab).clamp(0.0, 1.0),
                total_effect: (1.0 - correlation(&y_a, &y_ab)).clamp(0.0, 1.0),
            });
        }
    }

    let mut order: Vec<&SensitivityIndex> = indices.iter().collect();
    order.sort_by(|x, y| y.first_order.total_cmp(&x.first_order).then_with(|| x.name.cmp(&y.name)));
    let ranked = order.into_iter().map(|i| i.name.clone()).collect();

    Ok(Solved::new(
        SensitivityResult {
            indices,
            ranked,
            output_std,
            samples,
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::WarningKind;

    fn inputs() -> Vec<UncertainInput> {
        vec![
            UncertainInput::new("wind", 0.0, 1.0),
            UncertainInput::new("soil", 0.0, 1.0),
            UncertainInput::new("unused", 0.0, 1.0),
        ]
    }

    #[test]
    fn test_linear_model_indices() {
        let solved = analyze(&inputs(), |x| 3.0 * x[0] + x[1], 4000, 9).unwrap();
        let r = &solved.value;

        assert_eq!(r.ranked, vec!["wind", "soil", "unused"]);
        // Variance shares 9/10 and 1/10
        assert!((r.index("wind").unwrap().first_order - 0.9).abs() < 0.05);
        assert!((r.index("soil").unwrap().first_order - 0.1).abs() < 0.05);
        assert!(r.index("unused").unwrap().first_order < 0.05);
        assert!(r.index("unused").unwrap().total_effect < 0.05);
        assert!(solved.warnings.is_empty());
    }

    #[test]
    fn test_constant_model_ranks_by_name() {
        let solved = analyze(&inputs(), |_| 4.0, 100, 1).unwrap();
        assert_eq!(solved.value.ranked, vec!["soil", "unused", "wind"]);
        assert!(solved.value.indices.iter().all(|i| i.first_order == 0.0));
        assert!(solved.has_kind(WarningKind::Generic));
    }

    #[test]
    fn test_reproducible() {
        let a = analyze(&inputs(), |x| x[0] * x[1] + x[2], 500, 3).unwrap();
        let b = analyze(&inputs(), |x| x[0] * x[1] + x[2], 500, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(analyze(&[], |_| 1.0, 100, 0).is_err());

        let dupes = vec![UncertainInput::new("a", 0.0, 1.0), UncertainInput::new("a", 1.0, 1.0)];
        assert!(analyze(&dupes, |x| x[0], 100, 0).is_err());

        let err = analyze(&inputs(), |x| x[0].ln(), 100, 0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
