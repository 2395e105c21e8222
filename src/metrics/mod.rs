//! Error metrics for adjusted forecasts.
//!
//! Per-row absolute and squared errors for the model-adjusted and
//! baseline-adjusted forecasts, reduced to MAE/RMSE summaries. Rows
//! without usable ground truth are excluded and counted, never silently
//! dropped.

pub mod calculator;

pub use calculator::{
    score_date, DateScore, ErrorRecord, ErrorSummary, MetricsError, PredictionResult,
};
