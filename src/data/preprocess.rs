//! Feature engineering for the adjuster dataset.
//!
//! Turns raw CSV records into the modelling dataset:
//! - calendar features (hour, day-of-week, month)
//! - lagged actuals for the preceding 1..=7 days plus their mean
//! - lagged forecast errors per (timestamp, horizon) for 1..=7 days
//!   plus their mean, which doubles as the rule-based baseline input
//!
//! The current row's actual and error never enter the feature vector;
//! they are the ground truth and the learning target respectively.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDateTime};
use tracing::info;

use super::loader::RawRecord;
use super::types::{hour_of, ForecastDataset, ForecastRow};

/// Number of trailing days used for lag features and the baseline input.
pub const MAX_LAG_DAYS: i64 = 7;

/// Build the feature schema produced by [`build_dataset`].
pub fn feature_names() -> Vec<String> {
    let mut names = vec![
        "forecasted_pv_generation_MW".to_string(),
        "forecast_horizon_minutes".to_string(),
        "hour".to_string(),
        "dayofweek".to_string(),
        "month".to_string(),
    ];
    for lag in 1..=MAX_LAG_DAYS {
        names.push(format!("actual_pv_generation_MW_lag_{}d", lag));
    }
    names.push(format!("actual_pv_generation_MW_lag_mean_{}d", MAX_LAG_DAYS));
    for lag in 1..=MAX_LAG_DAYS {
        names.push(format!("forecast_error_MW_lag_{}d", lag));
    }
    names.push(format!("forecast_error_MW_lag_mean_{}d", MAX_LAG_DAYS));
    names
}

/// Engineer features and assemble the evaluation dataset.
pub fn build_dataset(records: Vec<RawRecord>) -> ForecastDataset {
    // Lag lookups: actuals keyed by timestamp, errors by (timestamp, horizon).
    let mut actual_by_ts: HashMap<NaiveDateTime, f64> = HashMap::new();
    let mut error_by_key: HashMap<(NaiveDateTime, i64), f64> = HashMap::new();

    for rec in &records {
        if let Some(actual) = rec.actual_mw {
            actual_by_ts.entry(rec.timestamp).or_insert(actual);
        }
        if let Some(error) = rec.error_mw {
            error_by_key
                .entry((rec.timestamp, rec.horizon_minutes))
                .or_insert(error);
        }
    }

    let names = feature_names();
    let mut rows = Vec::with_capacity(records.len());

    for rec in records {
        let mut features = Vec::with_capacity(names.len());
        features.push(rec.forecast_mw);
        features.push(rec.horizon_minutes as f64);
        features.push(hour_of(rec.timestamp) as f64);
        features.push(rec.timestamp.weekday().num_days_from_monday() as f64);
        features.push(rec.timestamp.month() as f64);

        let mut actual_lags = Vec::with_capacity(MAX_LAG_DAYS as usize);
        for lag in 1..=MAX_LAG_DAYS {
            let prior = rec.timestamp - Duration::days(lag);
            let value = actual_by_ts.get(&prior).copied();
            features.push(value.unwrap_or(f64::NAN));
            if let Some(v) = value {
                actual_lags.push(v);
            }
        }
        features.push(mean_or_nan(&actual_lags));

        let mut error_lags = Vec::with_capacity(MAX_LAG_DAYS as usize);
        for lag in 1..=MAX_LAG_DAYS {
            let prior = rec.timestamp - Duration::days(lag);
            let value = error_by_key.get(&(prior, rec.horizon_minutes)).copied();
            features.push(value.unwrap_or(f64::NAN));
            if let Some(v) = value {
                error_lags.push(v);
            }
        }
        let error_lag_mean = mean_or_nan(&error_lags);
        features.push(error_lag_mean);

        let baseline_input = if error_lag_mean.is_finite() {
            Some(error_lag_mean)
        } else {
            None
        };

        rows.push(ForecastRow {
            timestamp: rec.timestamp,
            horizon_minutes: rec.horizon_minutes,
            hour: hour_of(rec.timestamp),
            forecast_mw: rec.forecast_mw,
            actual_mw: rec.actual_mw,
            error_mw: rec.error_mw,
            baseline_input,
            features,
        });
    }

    let dataset = ForecastDataset::new(names, rows);
    info!(
        "Built dataset: {} rows, {} features",
        dataset.len(),
        dataset.feature_count()
    );
    dataset
}

fn mean_or_nan(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(day: u32, hour: u32, horizon: i64, forecast: f64, actual: f64) -> RawRecord {
        let timestamp = NaiveDate::from_ymd_opt(2024, 8, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        RawRecord {
            timestamp,
            horizon_minutes: horizon,
            forecast_mw: forecast,
            actual_mw: Some(actual),
            error_mw: Some(actual - forecast),
        }
    }

    fn feature(ds: &ForecastDataset, row: usize, name: &str) -> f64 {
        let idx = ds
            .feature_names
            .iter()
            .position(|n| n == name)
            .expect("feature present");
        ds.rows[row].features[idx]
    }

    #[test]
    fn test_schema_size() {
        let names = feature_names();
        assert_eq!(names.len(), 5 + 8 + 8);
        assert_eq!(names[0], "forecasted_pv_generation_MW");
        assert!(names.contains(&"forecast_error_MW_lag_mean_7d".to_string()));
    }

    #[test]
    fn test_calendar_features() {
        let ds = build_dataset(vec![rec(5, 13, 30, 10.0, 12.0)]);
        // 2024-08-05 is a Monday
        assert_eq!(feature(&ds, 0, "hour"), 13.0);
        assert_eq!(feature(&ds, 0, "dayofweek"), 0.0);
        assert_eq!(feature(&ds, 0, "month"), 8.0);
        assert_eq!(ds.rows[0].hour, 13);
    }

    #[test]
    fn test_lagged_error_features() {
        let ds = build_dataset(vec![
            rec(1, 6, 30, 10.0, 12.0), // error 2.0
            rec(2, 6, 30, 10.0, 14.0), // error 4.0
            rec(3, 6, 30, 10.0, 13.0),
        ]);
        // third row: lag 1d = day2 error, lag 2d = day1 error
        assert_eq!(feature(&ds, 2, "forecast_error_MW_lag_1d"), 4.0);
        assert_eq!(feature(&ds, 2, "forecast_error_MW_lag_2d"), 2.0);
        assert!(feature(&ds, 2, "forecast_error_MW_lag_3d").is_nan());
        assert_eq!(feature(&ds, 2, "forecast_error_MW_lag_mean_7d"), 3.0);
        assert_eq!(ds.rows[2].baseline_input, Some(3.0));
    }

    #[test]
    fn test_lags_respect_horizon() {
        let ds = build_dataset(vec![
            rec(1, 6, 30, 10.0, 12.0),  // error 2.0, horizon 30
            rec(1, 6, 60, 10.0, 12.0),  // error 2.0, horizon 60
            rec(2, 6, 60, 11.0, 12.0),  // horizon 60: lag must come from horizon 60
        ]);
        assert_eq!(feature(&ds, 2, "forecast_error_MW_lag_1d"), 2.0);
        // actual lags are keyed by timestamp only
        assert_eq!(feature(&ds, 2, "actual_pv_generation_MW_lag_1d"), 12.0);
    }

    #[test]
    fn test_first_day_has_no_baseline_input() {
        let ds = build_dataset(vec![rec(1, 6, 30, 10.0, 12.0)]);
        assert_eq!(ds.rows[0].baseline_input, None);
        assert!(feature(&ds, 0, "forecast_error_MW_lag_mean_7d").is_nan());
    }
}
