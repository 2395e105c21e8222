//! CSV loader for the adjuster dataset.
//!
//! Reads the raw forecast CSV into typed records. The file carries one row
//! per (forecast period, horizon) with the following columns:
//! - forecast_period_start_datetime_utc
//! - forecast_horizon_minutes
//! - forecasted_pv_generation_MW
//! - actual_pv_generation_MW
//! - forecast_error_MW (derived from actual - forecast when absent)

use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;
use tracing::warn;

/// Columns the loader refuses to run without.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "forecast_period_start_datetime_utc",
    "forecast_horizon_minutes",
    "forecasted_pv_generation_MW",
    "actual_pv_generation_MW",
];

const ERROR_COLUMN: &str = "forecast_error_MW";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One CSV row, before feature engineering.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub timestamp: NaiveDateTime,
    pub horizon_minutes: i64,
    pub forecast_mw: f64,
    pub actual_mw: Option<f64>,
    pub error_mw: Option<f64>,
}

/// Load the adjuster CSV into raw records.
pub fn load_csv(path: &Path) -> Result<Vec<RawRecord>, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    records_from_dataframe(&df)
}

/// Convert a DataFrame with the adjuster schema into raw records.
pub fn records_from_dataframe(df: &DataFrame) -> Result<Vec<RawRecord>, LoaderError> {
    for col in REQUIRED_COLUMNS {
        if df.column(col).is_err() {
            return Err(LoaderError::MissingColumn(col.to_string()));
        }
    }

    let ts_col = df.column("forecast_period_start_datetime_utc")?;
    let ts_col = ts_col.cast(&DataType::String)?;
    let ts_col = ts_col.str()?;

    let horizon_col = df.column("forecast_horizon_minutes")?.cast(&DataType::Int64)?;
    let horizon_col = horizon_col.i64()?;

    let forecast_col = df
        .column("forecasted_pv_generation_MW")?
        .cast(&DataType::Float64)?;
    let forecast_col = forecast_col.f64()?;

    let actual_col = df
        .column("actual_pv_generation_MW")?
        .cast(&DataType::Float64)?;
    let actual_col = actual_col.f64()?;

    let has_error_col = df.column(ERROR_COLUMN).is_ok();
    if !has_error_col {
        warn!("{} column absent, deriving from actual - forecast", ERROR_COLUMN);
    }
    let error_col = if has_error_col {
        Some(df.column(ERROR_COLUMN)?.cast(&DataType::Float64)?)
    } else {
        None
    };
    let error_col = match &error_col {
        Some(c) => Some(c.f64()?),
        None => None,
    };

    let mut records = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        let raw_ts = ts_col.get(idx).ok_or_else(|| {
            LoaderError::InvalidData(format!("null timestamp at row {}", idx))
        })?;
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            LoaderError::InvalidData(format!("unparseable timestamp '{}' at row {}", raw_ts, idx))
        })?;

        let horizon_minutes = horizon_col.get(idx).ok_or_else(|| {
            LoaderError::InvalidData(format!("null horizon at row {}", idx))
        })?;

        let forecast_mw = forecast_col.get(idx).ok_or_else(|| {
            LoaderError::InvalidData(format!("null forecast at row {}", idx))
        })?;

        let actual_mw = actual_col.get(idx);
        let error_mw = match error_col {
            Some(col) => col.get(idx),
            None => actual_mw.map(|a| a - forecast_mw),
        };

        records.push(RawRecord {
            timestamp,
            horizon_minutes,
            forecast_mw,
            actual_mw,
            error_mw,
        });
    }

    Ok(records)
}

/// Parse a period start timestamp, accepting RFC3339 or naive formats.
/// Offsets are normalized to UTC and stripped.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok()
}
