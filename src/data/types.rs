//! Core data types for adjuster evaluation.
//!
//! A dataset is an ordered sequence of forecast rows, each carrying the
//! raw forecast, the ground truth (when available), the forecast-error
//! target, and a numeric feature vector aligned with the dataset's
//! feature schema. Rows are uniquely identified by (timestamp, horizon).

use chrono::{NaiveDate, NaiveDateTime, Timelike};

/// A single forecast record for one (period, horizon) pair.
#[derive(Debug, Clone)]
pub struct ForecastRow {
    /// Forecast period start (UTC, tz stripped).
    pub timestamp: NaiveDateTime,

    /// Forecast lead time in minutes.
    pub horizon_minutes: i64,

    /// Hour-of-day of the forecast period.
    pub hour: u32,

    /// Raw forecasted PV generation in MW.
    pub forecast_mw: f64,

    /// Actual PV generation in MW; missing for periods without telemetry.
    pub actual_mw: Option<f64>,

    /// Forecast error (actual - forecast), the learning target.
    pub error_mw: Option<f64>,

    /// Trailing mean forecast error for this row's (hour, horizon),
    /// consumed by the rule-based baseline adjuster.
    pub baseline_input: Option<f64>,

    /// Numeric features aligned with `ForecastDataset::feature_names`.
    /// `f64::NAN` encodes a missing value.
    pub features: Vec<f64>,
}

impl ForecastRow {
    /// Calendar date of the forecast period.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// An ordered, schema-carrying collection of forecast rows.
#[derive(Debug, Clone, Default)]
pub struct ForecastDataset {
    /// Names of the feature columns, shared by every row.
    pub feature_names: Vec<String>,

    /// Rows sorted by (timestamp, horizon).
    pub rows: Vec<ForecastRow>,
}

impl ForecastDataset {
    /// Create a dataset, sorting rows into canonical order.
    pub fn new(feature_names: Vec<String>, mut rows: Vec<ForecastRow>) -> Self {
        rows.sort_by_key(|r| (r.timestamp, r.horizon_minutes));
        Self {
            feature_names,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Earliest timestamp in the dataset.
    pub fn min_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.first().map(|r| r.timestamp)
    }

    /// Latest timestamp in the dataset.
    pub fn max_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|r| r.timestamp)
    }

    /// Last calendar date with any data.
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.max_timestamp().map(|ts| ts.date())
    }

    /// New dataset containing the rows with timestamp in `[start, end)`.
    pub fn slice_by_time(&self, start: NaiveDateTime, end: NaiveDateTime) -> ForecastDataset {
        let rows = self
            .rows
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp < end)
            .cloned()
            .collect();
        ForecastDataset {
            feature_names: self.feature_names.clone(),
            rows,
        }
    }

    /// Number of rows with a present training target.
    pub fn target_count(&self) -> usize {
        self.rows.iter().filter(|r| r.error_mw.is_some()).count()
    }
}

/// Derive the hour-of-day from a period start timestamp.
pub fn hour_of(ts: NaiveDateTime) -> u32 {
    ts.hour()
}
