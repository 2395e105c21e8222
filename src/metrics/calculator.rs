//! Per-date scoring of model and baseline predictions.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::data::ForecastDataset;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error(
        "prediction length mismatch: {rows} test rows, {model} model predictions, {baseline} baseline predictions"
    )]
    LengthMismatch {
        rows: usize,
        model: usize,
        baseline: usize,
    },
}

/// One scored test row: both adjusted forecasts next to the truth.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub timestamp: NaiveDateTime,
    pub horizon_minutes: i64,
    pub hour: u32,
    pub actual_mw: f64,
    pub forecast_mw: f64,
    pub model_adjusted_mw: f64,
    pub baseline_adjusted_mw: f64,
}

/// Per-row error components, keyed for the aggregation tables.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub date: NaiveDate,
    pub horizon_minutes: i64,
    pub hour: u32,
    pub model_abs_error: f64,
    pub model_sq_error: f64,
    pub baseline_abs_error: f64,
    pub baseline_sq_error: f64,
}

/// MAE/RMSE over a set of scored rows.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ErrorSummary {
    pub mae: f64,
    pub rmse: f64,
    pub rows: usize,
}

impl ErrorSummary {
    fn from_components(abs_sum: f64, sq_sum: f64, rows: usize) -> Self {
        if rows == 0 {
            return Self {
                mae: 0.0,
                rmse: 0.0,
                rows: 0,
            };
        }
        Self {
            mae: abs_sum / rows as f64,
            rmse: (sq_sum / rows as f64).sqrt(),
            rows,
        }
    }
}

/// Everything the runner keeps from one evaluation date.
#[derive(Debug, Clone)]
pub struct DateScore {
    pub records: Vec<ErrorRecord>,
    pub results: Vec<PredictionResult>,
    /// Rows dropped for missing ground truth or a non-finite prediction.
    pub rows_excluded: usize,
    pub model: ErrorSummary,
    pub baseline: ErrorSummary,
}

/// Score one evaluation date.
///
/// `model_error_pred` is the predicted forecast-error target per test
/// row; the model-adjusted forecast is `forecast + predicted_error`.
/// `baseline_adjusted` is already an adjusted forecast in MW.
pub fn score_date(
    test: &ForecastDataset,
    model_error_pred: &[f64],
    baseline_adjusted: &[f64],
) -> Result<DateScore, MetricsError> {
    if model_error_pred.len() != test.len() || baseline_adjusted.len() != test.len() {
        return Err(MetricsError::LengthMismatch {
            rows: test.len(),
            model: model_error_pred.len(),
            baseline: baseline_adjusted.len(),
        });
    }

    let mut records = Vec::with_capacity(test.len());
    let mut results = Vec::with_capacity(test.len());
    let mut rows_excluded = 0usize;
    let mut model_abs_sum = 0.0;
    let mut model_sq_sum = 0.0;
    let mut baseline_abs_sum = 0.0;
    let mut baseline_sq_sum = 0.0;

    for ((row, &pred_error), &baseline_mw) in
        test.rows.iter().zip(model_error_pred).zip(baseline_adjusted)
    {
        let model_mw = row.forecast_mw + pred_error;
        let actual = match row.actual_mw {
            Some(a) if a.is_finite() && model_mw.is_finite() && baseline_mw.is_finite() => a,
            _ => {
                rows_excluded += 1;
                continue;
            }
        };

        let model_error = model_mw - actual;
        let baseline_error = baseline_mw - actual;

        model_abs_sum += model_error.abs();
        model_sq_sum += model_error * model_error;
        baseline_abs_sum += baseline_error.abs();
        baseline_sq_sum += baseline_error * baseline_error;

        records.push(ErrorRecord {
            date: row.date(),
            horizon_minutes: row.horizon_minutes,
            hour: row.hour,
            model_abs_error: model_error.abs(),
            model_sq_error: model_error * model_error,
            baseline_abs_error: baseline_error.abs(),
            baseline_sq_error: baseline_error * baseline_error,
        });
        results.push(PredictionResult {
            timestamp: row.timestamp,
            horizon_minutes: row.horizon_minutes,
            hour: row.hour,
            actual_mw: actual,
            forecast_mw: row.forecast_mw,
            model_adjusted_mw: model_mw,
            baseline_adjusted_mw: baseline_mw,
        });
    }

    let rows = records.len();
    Ok(DateScore {
        model: ErrorSummary::from_components(model_abs_sum, model_sq_sum, rows),
        baseline: ErrorSummary::from_components(baseline_abs_sum, baseline_sq_sum, rows),
        records,
        results,
        rows_excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ForecastRow;
    use chrono::NaiveDate;

    fn row(hour: u32, forecast: f64, actual: Option<f64>) -> ForecastRow {
        ForecastRow {
            timestamp: NaiveDate::from_ymd_opt(2024, 8, 8)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            horizon_minutes: 30,
            hour,
            forecast_mw: forecast,
            actual_mw: actual,
            error_mw: actual.map(|a| a - forecast),
            baseline_input: None,
            features: vec![],
        }
    }

    fn dataset(rows: Vec<ForecastRow>) -> ForecastDataset {
        ForecastDataset::new(vec![], rows)
    }

    #[test]
    fn test_perfect_predictions_zero_mae() {
        let test = dataset(vec![row(6, 10.0, Some(12.0)), row(7, 20.0, Some(19.0))]);
        // predicted error exactly matches, baseline handed the truth
        let score = score_date(&test, &[2.0, -1.0], &[12.0, 19.0]).unwrap();
        assert_eq!(score.model.mae, 0.0);
        assert_eq!(score.model.rmse, 0.0);
        assert_eq!(score.baseline.mae, 0.0);
        assert_eq!(score.rows_excluded, 0);
        assert_eq!(score.records.len(), 2);
    }

    #[test]
    fn test_mae_rmse_nonnegative() {
        let test = dataset(vec![row(6, 10.0, Some(14.0)), row(7, 10.0, Some(6.0))]);
        let score = score_date(&test, &[0.0, 0.0], &[11.0, 11.0]).unwrap();
        assert!(score.model.mae >= 0.0);
        assert!(score.model.rmse >= 0.0);
        assert_eq!(score.model.mae, 4.0);
        assert_eq!(score.model.rmse, 4.0);
        // baseline errors: -3 and +5
        assert_eq!(score.baseline.mae, 4.0);
        assert!((score.baseline.rmse - (17.0f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_missing_truth_excluded_and_counted() {
        let test = dataset(vec![row(6, 10.0, Some(12.0)), row(7, 10.0, None)]);
        let score = score_date(&test, &[2.0, 2.0], &[12.0, 12.0]).unwrap();
        assert_eq!(score.rows_excluded, 1);
        assert_eq!(score.records.len(), 1);
        assert_eq!(score.model.rows, 1);
    }

    #[test]
    fn test_nan_baseline_excluded() {
        let test = dataset(vec![row(6, 10.0, Some(12.0))]);
        let score = score_date(&test, &[2.0], &[f64::NAN]).unwrap();
        assert_eq!(score.rows_excluded, 1);
        assert!(score.records.is_empty());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let test = dataset(vec![row(6, 10.0, Some(12.0))]);
        let err = score_date(&test, &[1.0, 2.0], &[12.0]).unwrap_err();
        assert!(matches!(err, MetricsError::LengthMismatch { .. }));
    }
}
