//! Date-bounded train/test splitting.

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::data::ForecastDataset;

use super::EvalError;

/// A train/test partition for one evaluation date.
///
/// Invariant: every train timestamp is strictly before every test
/// timestamp.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: ForecastDataset,
    pub test: ForecastDataset,
}

/// Partition the dataset for `evaluation_date`.
///
/// Train covers `[date - lookback_days, date)`, test covers the
/// evaluation date itself `[date, date + 1d)`. Pure function; fails with
/// `InsufficientData` when either side is empty so the runner can skip
/// the date.
pub fn split(
    dataset: &ForecastDataset,
    evaluation_date: NaiveDate,
    lookback_days: i64,
) -> Result<Split, EvalError> {
    let test_start = evaluation_date.and_time(NaiveTime::MIN);
    let test_end = test_start + Duration::days(1);
    let train_start = test_start - Duration::days(lookback_days);

    let train = dataset.slice_by_time(train_start, test_start);
    let test = dataset.slice_by_time(test_start, test_end);

    if train.is_empty() {
        return Err(EvalError::InsufficientData(format!(
            "no train rows in [{}, {})",
            train_start, test_start
        )));
    }
    if test.is_empty() {
        return Err(EvalError::InsufficientData(format!(
            "no test rows on {}",
            evaluation_date
        )));
    }

    debug!(
        "Split for {}: {} train rows, {} test rows",
        evaluation_date,
        train.len(),
        test.len()
    );
    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ForecastRow;
    use chrono::NaiveDateTime;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn row(ts: NaiveDateTime) -> ForecastRow {
        ForecastRow {
            timestamp: ts,
            horizon_minutes: 30,
            hour: 0,
            forecast_mw: 10.0,
            actual_mw: Some(11.0),
            error_mw: Some(1.0),
            baseline_input: None,
            features: vec![],
        }
    }

    /// Hourly rows across `days` consecutive days of August 2024.
    fn dataset(days: u32) -> ForecastDataset {
        let mut rows = Vec::new();
        for day in 1..=days {
            for hour in 0..24 {
                rows.push(row(
                    NaiveDate::from_ymd_opt(2024, 8, day)
                        .unwrap()
                        .and_hms_opt(hour, 0, 0)
                        .unwrap(),
                ));
            }
        }
        ForecastDataset::new(vec![], rows)
    }

    #[test]
    fn test_no_leakage_across_random_combinations() {
        let ds = dataset(20);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let day = rng.gen_range(2..=20u32);
            let lookback = rng.gen_range(1..=10i64);
            let date = NaiveDate::from_ymd_opt(2024, 8, day).unwrap();
            let s = split(&ds, date, lookback).unwrap();
            assert!(s.train.max_timestamp().unwrap() < s.test.min_timestamp().unwrap());
        }
    }

    #[test]
    fn test_window_bounds() {
        let ds = dataset(14);
        let s = split(&ds, NaiveDate::from_ymd_opt(2024, 8, 8).unwrap(), 7).unwrap();
        // 7 prior days of hourly rows
        assert_eq!(s.train.len(), 7 * 24);
        assert_eq!(s.test.len(), 24);
        assert_eq!(
            s.train.min_timestamp().unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
        );
        assert!(s
            .test
            .rows
            .iter()
            .all(|r| r.date() == NaiveDate::from_ymd_opt(2024, 8, 8).unwrap()));
    }

    #[test]
    fn test_empty_test_day_is_insufficient() {
        let ds = dataset(5);
        let err = split(&ds, NaiveDate::from_ymd_opt(2024, 8, 9).unwrap(), 7).unwrap_err();
        assert!(matches!(err, EvalError::InsufficientData(_)));
    }

    #[test]
    fn test_empty_train_window_is_insufficient() {
        let ds = dataset(5);
        let err = split(&ds, NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(), 7).unwrap_err();
        assert!(matches!(err, EvalError::InsufficientData(_)));
    }
}
