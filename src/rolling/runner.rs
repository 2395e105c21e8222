//! The date-by-date evaluation loop.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::ForecastDataset;
use crate::metrics::{score_date, ErrorRecord, ErrorSummary, PredictionResult};
use crate::models::{ModelError, ModelKind};
use crate::selection::{select_features, SelectionError};

use super::baseline::compute_baseline;
use super::report::{AggregateReport, SkippedDate};
use super::splits::split;
use super::EvalError;

/// Run parameters. Deserializable from a TOML config file; every field
/// has a default so partial configs work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// First evaluation date (inclusive). Evaluation runs daily from
    /// here through the last date present in the dataset.
    pub start_date: NaiveDate,
    /// Which adjuster strategy to evaluate.
    pub model_kind: ModelKind,
    /// Trailing train window length in days.
    pub lookback_days: i64,
    /// Keep only the k highest-ranked features; `None` keeps every
    /// feature with positive importance.
    pub feature_top_k: Option<usize>,
    /// Seed for the permutation-importance shuffles.
    pub random_seed: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap_or_default(),
            model_kind: ModelKind::GradientBoostedTree,
            lookback_days: 7,
            feature_top_k: None,
            random_seed: 42,
        }
    }
}

/// Lifecycle of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Iterating,
    Aggregating,
    Done,
    Error,
}

/// What happened on one evaluation date.
#[derive(Debug, Clone)]
pub enum DateStatus {
    Succeeded {
        rows_scored: usize,
        rows_excluded: usize,
        model: ErrorSummary,
        baseline: ErrorSummary,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct DateOutcome {
    pub date: NaiveDate,
    pub status: DateStatus,
}

/// Drives the rolling evaluation over a daily date sequence.
///
/// `step` advances one date at a time so callers can render progress or
/// stop early; `run` drains the sequence and aggregates. A report built
/// before the sequence is exhausted covers only the dates evaluated so
/// far.
pub struct RollingRunner {
    config: EvalConfig,
    dataset: ForecastDataset,
    dates: Vec<NaiveDate>,
    cursor: usize,
    state: RunState,
    records: Vec<ErrorRecord>,
    results: Vec<PredictionResult>,
    outcomes: Vec<DateOutcome>,
    skipped: Vec<SkippedDate>,
    rows_excluded: usize,
}

impl RollingRunner {
    /// Validate the configuration against the dataset and lay out the
    /// evaluation dates.
    pub fn new(config: EvalConfig, dataset: ForecastDataset) -> Result<Self, EvalError> {
        if dataset.is_empty() {
            return Err(EvalError::Configuration("dataset is empty".into()));
        }
        if config.lookback_days < 1 {
            return Err(EvalError::Configuration(format!(
                "lookback_days must be at least 1, got {}",
                config.lookback_days
            )));
        }
        let max_date = dataset
            .max_date()
            .ok_or_else(|| EvalError::Configuration("dataset has no timestamps".into()))?;
        if config.start_date > max_date {
            return Err(EvalError::Configuration(format!(
                "start_date {} is past the last dataset date {}",
                config.start_date, max_date
            )));
        }

        let mut dates = Vec::new();
        let mut date = config.start_date;
        while date <= max_date {
            dates.push(date);
            date += Duration::days(1);
        }

        info!(
            "Rolling evaluation: {} dates from {} to {}, model={}, lookback={}d",
            dates.len(),
            config.start_date,
            max_date,
            config.model_kind.as_str(),
            config.lookback_days
        );

        Ok(Self {
            config,
            dataset,
            dates,
            cursor: 0,
            state: RunState::Init,
            records: Vec::new(),
            results: Vec::new(),
            outcomes: Vec::new(),
            skipped: Vec::new(),
            rows_excluded: 0,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Number of dates in the evaluation sequence.
    pub fn total_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn outcomes(&self) -> &[DateOutcome] {
        &self.outcomes
    }

    /// Every scored row across all processed dates, in date order.
    pub fn prediction_results(&self) -> &[PredictionResult] {
        &self.results
    }

    /// Evaluate the next date. Returns `Ok(None)` once the sequence is
    /// exhausted. Recoverable failures become `Skipped` outcomes; a
    /// fatal failure moves the runner into the `Error` state and stops
    /// iteration.
    pub fn step(&mut self) -> Result<Option<DateOutcome>, EvalError> {
        match self.state {
            RunState::Init => self.state = RunState::Iterating,
            RunState::Iterating => {}
            RunState::Aggregating | RunState::Done | RunState::Error => return Ok(None),
        }
        let Some(&date) = self.dates.get(self.cursor) else {
            self.state = RunState::Aggregating;
            return Ok(None);
        };
        self.cursor += 1;

        let outcome = match self.evaluate_date(date) {
            Ok(status) => DateOutcome { date, status },
            Err(err) if err.is_recoverable() => {
                warn!("Skipping {}: {}", date, err);
                self.skipped.push(SkippedDate {
                    date,
                    reason: err.to_string(),
                });
                DateOutcome {
                    date,
                    status: DateStatus::Skipped {
                        reason: err.to_string(),
                    },
                }
            }
            Err(err) => {
                self.state = RunState::Error;
                let fatal = match err {
                    failed @ EvalError::DateFailed { .. } => failed,
                    other => EvalError::DateFailed {
                        date,
                        reason: other.to_string(),
                    },
                };
                return Err(fatal);
            }
        };

        self.outcomes.push(outcome.clone());
        Ok(Some(outcome))
    }

    fn evaluate_date(&mut self, date: NaiveDate) -> Result<DateStatus, EvalError> {
        let parts = split(&self.dataset, date, self.config.lookback_days)?;

        let features = select_features(
            &parts.train,
            self.config.feature_top_k,
            self.config.random_seed,
        )
        .map_err(|e| map_selection(date, e))?;

        let mut model = self.config.model_kind.build();
        model
            .fit(&parts.train, &features)
            .map_err(|e| map_model(date, e))?;
        let predicted_errors = model
            .predict(&parts.test, &features)
            .map_err(|e| map_model(date, e))?;

        let baseline_adjusted = compute_baseline(&parts.test);
        let score = score_date(&parts.test, &predicted_errors, &baseline_adjusted)
            .map_err(|e| EvalError::DateFailed {
                date,
                reason: e.to_string(),
            })?;

        info!(
            "{}: {} rows scored ({} excluded), model MAE {:.3}, baseline MAE {:.3}, {} features",
            date,
            score.records.len(),
            score.rows_excluded,
            score.model.mae,
            score.baseline.mae,
            features.len()
        );

        let rows_scored = score.records.len();
        self.records.extend(score.records);
        self.results.extend(score.results);
        self.rows_excluded += score.rows_excluded;

        Ok(DateStatus::Succeeded {
            rows_scored,
            rows_excluded: score.rows_excluded,
            model: score.model,
            baseline: score.baseline,
        })
    }

    /// Drain the date sequence and aggregate.
    pub fn run(&mut self) -> Result<AggregateReport, EvalError> {
        while self.step()?.is_some() {}
        self.report()
    }

    /// Aggregate everything scored so far. Valid mid-run for a partial
    /// view; fails only when no date has succeeded. A succeeded date may
    /// contribute zero rows (every row excluded) and still counts.
    pub fn report(&mut self) -> Result<AggregateReport, EvalError> {
        let processed = self
            .outcomes
            .iter()
            .filter(|o| matches!(o.status, DateStatus::Succeeded { .. }))
            .count();
        if processed == 0 {
            return Err(EvalError::Aggregation {
                skipped: self.skipped.len(),
            });
        }
        let report = AggregateReport::from_records(
            &self.records,
            processed,
            self.skipped.clone(),
            self.rows_excluded,
        );
        if self.state != RunState::Error {
            self.state = RunState::Done;
        }
        Ok(report)
    }
}

fn map_selection(date: NaiveDate, err: SelectionError) -> EvalError {
    match err {
        SelectionError::InsufficientRows(reason) => EvalError::InsufficientData(reason),
        SelectionError::Model(model_err) => map_model(date, model_err),
    }
}

/// Constraint violations are skips; training or prediction failures on
/// otherwise valid data are defects and abort the run.
fn map_model(date: NaiveDate, err: ModelError) -> EvalError {
    match err {
        ModelError::Constraint { model, reason } => {
            EvalError::ModelConstraint(format!("{model}: {reason}"))
        }
        other => EvalError::DateFailed {
            date,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ForecastRow;

    /// Hourly rows for August days in `days`, with a learnable linear
    /// relationship between the two features and the error target.
    fn dataset(days: &[u32]) -> ForecastDataset {
        let mut rows = Vec::new();
        for &day in days {
            for hour in 0..24u32 {
                let ts = NaiveDate::from_ymd_opt(2024, 8, day)
                    .unwrap()
                    .and_hms_opt(hour, 0, 0)
                    .unwrap();
                let signal = (hour as f64) / 4.0 + (day as f64) / 10.0;
                let forecast = 100.0 + hour as f64;
                let error = 2.0 * signal - 1.0;
                rows.push(ForecastRow {
                    timestamp: ts,
                    horizon_minutes: 30 * (1 + (hour as i64) % 2),
                    hour,
                    forecast_mw: forecast,
                    actual_mw: Some(forecast + error),
                    error_mw: Some(error),
                    baseline_input: Some(error * 0.9),
                    features: vec![signal, (day as f64) * 0.01],
                });
            }
        }
        ForecastDataset::new(vec!["signal".into(), "noise".into()], rows)
    }

    fn config(start: NaiveDate) -> EvalConfig {
        EvalConfig {
            start_date: start,
            ..EvalConfig::default()
        }
    }

    #[test]
    fn test_full_run_over_contiguous_days() {
        // 14 days of data, evaluation starts on day 8 with a 7-day
        // lookback, so exactly 7 dates run and none is skipped.
        let ds = dataset(&(1..=14).collect::<Vec<_>>());
        let start = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        let mut runner = RollingRunner::new(config(start), ds).unwrap();
        assert_eq!(runner.total_dates(), 7);

        let report = runner.run().unwrap();
        assert_eq!(runner.state(), RunState::Done);
        assert_eq!(report.processed_dates, 7);
        assert!(report.skipped.is_empty());
        assert_eq!(report.per_date.len(), 7);
        // 24 hourly rows per date, none excluded
        assert_eq!(report.overall.row_count, 7 * 24);
        assert!(report.overall.model_mae.is_finite());
    }

    #[test]
    fn test_missing_day_is_skipped() {
        // Day 9 absent, so its test window is empty.
        let days: Vec<u32> = (1..=10).filter(|&d| d != 9).collect();
        let ds = dataset(&days);
        let start = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        let mut runner = RollingRunner::new(config(start), ds).unwrap();

        let report = runner.run().unwrap();
        assert_eq!(report.processed_dates, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].date,
            NaiveDate::from_ymd_opt(2024, 8, 9).unwrap()
        );
    }

    #[test]
    fn test_partial_report_mid_run() {
        let ds = dataset(&(1..=10).collect::<Vec<_>>());
        let start = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        let mut runner = RollingRunner::new(config(start), ds).unwrap();

        runner.step().unwrap();
        let partial = runner.report().unwrap();
        assert_eq!(partial.processed_dates, 1);
        assert_eq!(partial.overall.row_count, 24);
    }

    #[test]
    fn test_step_outcomes_and_exhaustion() {
        let ds = dataset(&(1..=9).collect::<Vec<_>>());
        let start = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        let mut runner = RollingRunner::new(config(start), ds).unwrap();

        let first = runner.step().unwrap().unwrap();
        assert_eq!(first.date, start);
        assert!(matches!(
            first.status,
            DateStatus::Succeeded { rows_scored: 24, .. }
        ));
        assert!(runner.step().unwrap().is_some());
        assert!(runner.step().unwrap().is_none());
        assert_eq!(runner.state(), RunState::Aggregating);
        assert_eq!(runner.prediction_results().len(), 48);
    }

    #[test]
    fn test_tabular_model_runs() {
        let ds = dataset(&(1..=9).collect::<Vec<_>>());
        let start = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        let cfg = EvalConfig {
            model_kind: ModelKind::TabularFoundation,
            ..config(start)
        };
        let report = RollingRunner::new(cfg, ds).unwrap().run().unwrap();
        assert_eq!(report.processed_dates, 2);
        assert!(report.overall.model_mae.is_finite());
    }

    #[test]
    fn test_invalid_configurations_rejected() {
        let ds = dataset(&(1..=9).collect::<Vec<_>>());
        let late = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(
            RollingRunner::new(config(late), ds.clone()),
            Err(EvalError::Configuration(_))
        ));

        let bad = EvalConfig {
            lookback_days: 0,
            ..config(NaiveDate::from_ymd_opt(2024, 8, 8).unwrap())
        };
        assert!(matches!(
            RollingRunner::new(bad, ds),
            Err(EvalError::Configuration(_))
        ));

        let empty = ForecastDataset::new(vec![], vec![]);
        assert!(matches!(
            RollingRunner::new(EvalConfig::default(), empty),
            Err(EvalError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        // partial config: unspecified fields fall back to defaults
        let cfg: EvalConfig = toml::from_str(
            "start_date = \"2024-08-08\"\nmodel_kind = \"tabular_foundation\"\nfeature_top_k = 5\n",
        )
        .unwrap();
        assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2024, 8, 8).unwrap());
        assert_eq!(cfg.model_kind, ModelKind::TabularFoundation);
        assert_eq!(cfg.feature_top_k, Some(5));
        assert_eq!(cfg.lookback_days, 7);
        assert_eq!(cfg.random_seed, 42);

        let empty: EvalConfig = toml::from_str("").unwrap();
        assert_eq!(empty.model_kind, ModelKind::GradientBoostedTree);
    }

    #[test]
    fn test_malformed_config_rejected() {
        assert!(toml::from_str::<EvalConfig>("lookback_days = \"seven\"").is_err());
        assert!(toml::from_str::<EvalConfig>("model_kind = \"perceptron\"").is_err());
    }

    #[test]
    fn test_date_with_no_scorable_rows_still_counts() {
        // The evaluation day has rows but no telemetry, so every row is
        // excluded from scoring; the date still succeeds and the report
        // aggregates over zero rows instead of failing.
        let mut ds = dataset(&(1..=8).collect::<Vec<_>>());
        let eval_day = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        for row in &mut ds.rows {
            if row.date() == eval_day {
                row.actual_mw = None;
                row.error_mw = None;
            }
        }

        let mut runner = RollingRunner::new(config(eval_day), ds).unwrap();
        let report = runner.run().unwrap();
        assert_eq!(report.processed_dates, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.overall.row_count, 0);
        assert_eq!(report.rows_excluded, 24);
    }

    #[test]
    fn test_all_dates_skipped_yields_aggregation_error() {
        // Only history days, evaluation days missing entirely.
        let ds = dataset(&[1, 2, 3, 4, 5, 6, 7, 20]);
        let start = NaiveDate::from_ymd_opt(2024, 8, 10).unwrap();
        let cfg = EvalConfig {
            lookback_days: 2,
            ..config(start)
        };
        let mut runner = RollingRunner::new(cfg, ds).unwrap();
        // Date 20 has no trailing train window; all others have no test rows.
        let err = runner.run().unwrap_err();
        assert!(matches!(err, EvalError::Aggregation { .. }));
    }
}
