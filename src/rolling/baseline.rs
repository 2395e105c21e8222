//! Rule-based reference adjustment.

use crate::data::ForecastDataset;

/// Adjusted forecast under the rule-based correction: the raw forecast
/// plus the trailing mean error for the row's (hour, horizon) cell.
///
/// Rows without a baseline input (typically the earliest days, where no
/// trailing history exists) yield NaN and are excluded downstream when
/// scoring.
pub fn compute_baseline(test: &ForecastDataset) -> Vec<f64> {
    test.rows
        .iter()
        .map(|row| match row.baseline_input {
            Some(correction) => row.forecast_mw + correction,
            None => f64::NAN,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ForecastRow;
    use chrono::NaiveDate;

    fn row(forecast: f64, baseline_input: Option<f64>) -> ForecastRow {
        ForecastRow {
            timestamp: NaiveDate::from_ymd_opt(2024, 8, 8)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            horizon_minutes: 30,
            hour: 12,
            forecast_mw: forecast,
            actual_mw: Some(forecast + 1.0),
            error_mw: Some(1.0),
            baseline_input,
            features: vec![],
        }
    }

    #[test]
    fn test_adds_trailing_correction() {
        let ds = ForecastDataset::new(
            vec![],
            vec![row(100.0, Some(2.5)), row(50.0, Some(-4.0))],
        );
        let adjusted = compute_baseline(&ds);
        assert_eq!(adjusted, vec![102.5, 46.0]);
    }

    #[test]
    fn test_missing_input_yields_nan() {
        let ds = ForecastDataset::new(vec![], vec![row(100.0, None)]);
        let adjusted = compute_baseline(&ds);
        assert!(adjusted[0].is_nan());
    }

    #[test]
    fn test_baseline_error_against_truth() {
        // actual = forecast + 1, correction 2.5 overshoots by 1.5
        let ds = ForecastDataset::new(vec![], vec![row(100.0, Some(2.5))]);
        let adjusted = compute_baseline(&ds);
        let abs_err = (adjusted[0] - ds.rows[0].actual_mw.unwrap()).abs();
        assert!((abs_err - 1.5).abs() < 1e-12);
    }
}
