//! Rolling evaluation engine.
//!
//! Walks a daily sequence of evaluation dates; for each date it splits
//! the dataset into a trailing train window and the date itself, selects
//! features, fits a fresh model, scores model and baseline against the
//! truth, and accumulates the per-row errors into multi-granularity
//! aggregate tables. Recoverable per-date failures (insufficient data,
//! model constraints) are recorded as skips; anything else aborts the
//! run with the failing date attached.

pub mod baseline;
pub mod report;
pub mod runner;
pub mod splits;

use chrono::NaiveDate;
use thiserror::Error;

pub use baseline::compute_baseline;
pub use report::{AggregateReport, GroupErrors, SkippedDate};
pub use runner::{DateOutcome, DateStatus, EvalConfig, RollingRunner, RunState};
pub use splits::{split, Split};

/// Error taxonomy of the rolling evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Train or test subset is empty for a date (recoverable: skip).
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A model or selection constraint was violated (recoverable: skip).
    #[error("model constraint: {0}")]
    ModelConstraint(String),

    /// Invalid run configuration (fatal, raised before iteration).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Aggregation over zero successful dates (fatal).
    #[error("aggregation failed: no dates succeeded ({skipped} skipped)")]
    Aggregation { skipped: usize },

    /// Unrecoverable failure while evaluating one date (fatal).
    #[error("evaluation failed on {date}: {reason}")]
    DateFailed { date: NaiveDate, reason: String },
}

impl EvalError {
    /// Whether the runner may record this as a skipped date and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EvalError::InsufficientData(_) | EvalError::ModelConstraint(_)
        )
    }
}
