//! Aggregation of per-row scores into comparison tables.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::metrics::ErrorRecord;

/// Paired model/baseline errors for one aggregation group.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GroupErrors {
    pub model_mae: f64,
    pub model_rmse: f64,
    pub baseline_mae: f64,
    pub baseline_rmse: f64,
    pub row_count: usize,
}

/// A date the runner attempted but could not evaluate.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: String,
}

/// Final output of a rolling evaluation: the overall comparison plus
/// breakdowns by date, horizon, hour, and the horizon-hour cross.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub overall: GroupErrors,
    pub per_date: BTreeMap<NaiveDate, GroupErrors>,
    pub per_horizon: BTreeMap<i64, GroupErrors>,
    pub per_hour: BTreeMap<u32, GroupErrors>,
    pub per_horizon_hour: BTreeMap<(i64, u32), GroupErrors>,
    pub processed_dates: usize,
    pub skipped: Vec<SkippedDate>,
    pub rows_excluded: usize,
}

/// Running sums for one group. MAE is the mean absolute error and RMSE
/// the root of the mean squared error, both averaged over rows.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    model_abs: f64,
    model_sq: f64,
    baseline_abs: f64,
    baseline_sq: f64,
    rows: usize,
}

impl Accumulator {
    fn push(&mut self, record: &ErrorRecord) {
        self.model_abs += record.model_abs_error;
        self.model_sq += record.model_sq_error;
        self.baseline_abs += record.baseline_abs_error;
        self.baseline_sq += record.baseline_sq_error;
        self.rows += 1;
    }

    fn finish(self) -> GroupErrors {
        if self.rows == 0 {
            return GroupErrors {
                model_mae: 0.0,
                model_rmse: 0.0,
                baseline_mae: 0.0,
                baseline_rmse: 0.0,
                row_count: 0,
            };
        }
        let n = self.rows as f64;
        GroupErrors {
            model_mae: self.model_abs / n,
            model_rmse: (self.model_sq / n).sqrt(),
            baseline_mae: self.baseline_abs / n,
            baseline_rmse: (self.baseline_sq / n).sqrt(),
            row_count: self.rows,
        }
    }
}

impl AggregateReport {
    /// Fold scored rows into the grouped tables. An empty record list
    /// yields a zeroed overall group and empty breakdown tables.
    pub fn from_records(
        records: &[ErrorRecord],
        processed_dates: usize,
        skipped: Vec<SkippedDate>,
        rows_excluded: usize,
    ) -> Self {
        let mut overall = Accumulator::default();
        let mut per_date: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
        let mut per_horizon: BTreeMap<i64, Accumulator> = BTreeMap::new();
        let mut per_hour: BTreeMap<u32, Accumulator> = BTreeMap::new();
        let mut per_horizon_hour: BTreeMap<(i64, u32), Accumulator> = BTreeMap::new();

        for record in records {
            overall.push(record);
            per_date.entry(record.date).or_default().push(record);
            per_horizon
                .entry(record.horizon_minutes)
                .or_default()
                .push(record);
            per_hour.entry(record.hour).or_default().push(record);
            per_horizon_hour
                .entry((record.horizon_minutes, record.hour))
                .or_default()
                .push(record);
        }

        AggregateReport {
            overall: overall.finish(),
            per_date: per_date.into_iter().map(|(k, v)| (k, v.finish())).collect(),
            per_horizon: per_horizon
                .into_iter()
                .map(|(k, v)| (k, v.finish()))
                .collect(),
            per_hour: per_hour.into_iter().map(|(k, v)| (k, v.finish())).collect(),
            per_horizon_hour: per_horizon_hour
                .into_iter()
                .map(|(k, v)| (k, v.finish()))
                .collect(),
            processed_dates,
            skipped,
            rows_excluded,
        }
    }

    /// Relative MAE improvement of the model over the baseline, as a
    /// fraction. Positive means the model beats the baseline. A perfect
    /// baseline (zero MAE) reports no improvement rather than a
    /// non-finite ratio.
    pub fn mae_improvement(&self) -> f64 {
        if self.overall.baseline_mae == 0.0 {
            return 0.0;
        }
        (self.overall.baseline_mae - self.overall.model_mae) / self.overall.baseline_mae
    }
}
