//! Goodness-of-fit of predictions against field observations.

use serde::{Deserialize, Serialize};

use super::sampling::mean;
use super::tuning::FieldRecord;
use crate::envelope::SolverInfo;
use crate::errors::{require_positive, CalcError, CalcResult};
use crate::warnings::{Solved, Warning};

pub const SOLVER: SolverInfo = SolverInfo::new("field_validation", "1.0.0");

/// |bias %| above this is a systematic bias
pub const BIAS_LIMIT_PERCENT: f64 = 5.0;

/// RMSE as a percentage of the mean observation must not exceed this
pub const ACCURACY_TARGET_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub count: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    /// mean(predicted - observed); positive means conservative for depths
    pub bias: f64,
    pub bias_percent: f64,
    pub rmse_percent: f64,
    pub systematic_bias: bool,
    pub meets_accuracy_target: bool,
}

pub fn validate(records: &[FieldRecord]) -> CalcResult<Solved<ValidationStats>> {
    if records.len() < 2 {
        return Err(CalcError::invalid_input(
            "records",
            records.len().to_string(),
            "At least two field records are required",
        ));
    }
    for r in records {
        require_positive("observed_depth_ft", r.observed_depth_ft)?;
        require_positive("predicted_depth_ft", r.predicted_depth_ft)?;
    }

    let n = records.len() as f64;
    let observed: Vec<f64> = records.iter().map(|r| r.observed_depth_ft).collect();
    let residuals: Vec<f64> = records
        .iter()
        .map(|r| r.predicted_depth_ft - r.observed_depth_ft)
        .collect();

    let mean_observed = mean(&observed);
    let ss_res: f64 = residuals.iter().map(|e| e * e).sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean_observed).powi(2)).sum();

    let rmse = (ss_res / n).sqrt();
    let mae = residuals.iter().map(|e| e.abs()).sum::<f64>() / n;
    let bias = mean(&residuals);
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
    let bias_percent = 100.0 * bias / mean_observed;
    let rmse_percent = 100.0 * rmse / mean_observed;

    let systematic_bias = bias_percent.abs() > BIAS_LIMIT_PERCENT;
    let meets_accuracy_target = rmse_percent <= ACCURACY_TARGET_PERCENT;

    let mut warnings = Vec::new();
    if systematic_bias {
        warnings.push(Warning::generic(
            SOLVER.name,
            format!("Systematic bias of {:+.1}% against field data", bias_percent),
        ));
    }
    if !meets_accuracy_target {
        warnings.push(Warning::failed_check(
            SOLVER.name,
            format!(
                "RMSE is {:.1}% of the mean observation, target {:.0}%",
                rmse_percent, ACCURACY_TARGET_PERCENT
            ),
        ));
    }

    Ok(Solved::new(
        ValidationStats {
            count: records.len(),
            rmse,
            mae,
            r_squared,
            bias,
            bias_percent,
            rmse_percent,
            systematic_bias,
            meets_accuracy_target,
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::WarningKind;

    #[test]
    fn test_perfect_predictions() {
        let records: Vec<FieldRecord> = (1..=5).map(|i| FieldRecord::new(i as f64, i as f64)).collect();
        let solved = validate(&records).unwrap();
        assert_eq!(solved.value.rmse, 0.0);
        assert_eq!(solved.value.r_squared, 1.0);
        assert!(!solved.value.systematic_bias);
        assert!(solved.warnings.is_empty());
    }

    #[test]
    fn test_known_statistics() {
        let records = vec![
            FieldRecord::new(5.0, 4.0),
            FieldRecord::new(6.0, 6.0),
            FieldRecord::new(7.0, 8.0),
            FieldRecord::new(9.0, 8.0),
        ];
        let s = validate(&records).unwrap().value;
        // residuals 1, 0, -1, 1
        assert!((s.rmse - 0.75_f64.sqrt()).abs() < 1e-12);
        assert!((s.mae - 0.75).abs() < 1e-12);
        assert!((s.bias - 0.25).abs() < 1e-12);
        // mean observed 6.5; ss_tot = 6.25 + 0.25 + 2.25 + 2.25
        assert!((s.r_squared - (1.0 - 3.0 / 11.0)).abs() < 1e-12);
        assert!((s.bias_percent - 100.0 * 0.25 / 6.5).abs() < 1e-9);
    }

    #[test]
    fn test_biased_predictions_flagged() {
        let records: Vec<FieldRecord> = (1..=6)
            .map(|i| FieldRecord::new(1.2 * (3.0 + i as f64), 3.0 + i as f64))
            .collect();
        let solved = validate(&records).unwrap();
        assert!(solved.value.systematic_bias);
        assert!(!solved.value.meets_accuracy_target);
        assert!(solved.has_kind(WarningKind::Generic));
        assert!(solved.has_kind(WarningKind::FailedCheck));
    }

    #[test]
    fn test_requires_two_records() {
        assert!(validate(&[FieldRecord::new(1.0, 1.0)]).is_err());
    }
}
