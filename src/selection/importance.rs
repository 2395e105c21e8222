//! Permutation importance ranking.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::data::ForecastDataset;
use crate::models::{AdjusterModel, GradientBoostedModel};

use super::{FeatureSet, SelectionError};

/// Shuffle repeats per feature; the reported importance is the mean MAE
/// increase across repeats.
pub const N_REPEATS: usize = 10;

/// Minimum train-subset size that still leaves a usable holdout tail.
const MIN_SELECTION_ROWS: usize = 24;

/// Importance score for one candidate feature.
#[derive(Debug, Clone)]
pub struct FeatureImportance {
    /// Index into the dataset's feature schema.
    pub index: usize,
    pub name: String,
    /// Mean validation-MAE increase when the feature is shuffled.
    pub importance: f64,
}

/// Rank every candidate feature by permutation importance, descending.
/// Ties keep schema order (stable sort), so the ranking is deterministic
/// for a fixed seed and dataset.
pub fn rank_features(
    train: &ForecastDataset,
    seed: u64,
) -> Result<Vec<FeatureImportance>, SelectionError> {
    let n = train.len();
    if n < MIN_SELECTION_ROWS {
        return Err(SelectionError::InsufficientRows(format!(
            "{} rows, need at least {}",
            n, MIN_SELECTION_ROWS
        )));
    }

    // Chronological holdout: last ~20% of the train subset.
    let holdout = (n / 5).max(1);
    let fit_part = ForecastDataset {
        feature_names: train.feature_names.clone(),
        rows: train.rows[..n - holdout].to_vec(),
    };
    let validation = ForecastDataset {
        feature_names: train.feature_names.clone(),
        rows: train.rows[n - holdout..].to_vec(),
    };
    if validation.target_count() == 0 {
        return Err(SelectionError::InsufficientRows(
            "holdout slice has no rows with a target".to_string(),
        ));
    }

    let width = train.feature_count();
    let candidates = FeatureSet::all(width);

    let mut reference = GradientBoostedModel::new();
    reference.fit(&fit_part, &candidates)?;

    let baseline_preds = reference.predict(&validation, &candidates)?;
    let baseline_mae = target_mae(&baseline_preds, &validation);
    debug!("Selection baseline MAE: {:.4}", baseline_mae);

    let importances: Vec<f64> = (0..width)
        .into_par_iter()
        .map(|feature_idx| -> Result<f64, SelectionError> {
            let mut permuted_maes = Vec::with_capacity(N_REPEATS);
            for repeat in 0..N_REPEATS {
                let mut shuffled = validation.clone();
                let mut values: Vec<f64> = shuffled
                    .rows
                    .iter()
                    .map(|r| r.features[feature_idx])
                    .collect();
                let mut rng = StdRng::seed_from_u64(derive_seed(seed, feature_idx, repeat));
                values.shuffle(&mut rng);
                for (row, value) in shuffled.rows.iter_mut().zip(values) {
                    row.features[feature_idx] = value;
                }
                let preds = reference.predict(&shuffled, &candidates)?;
                permuted_maes.push(target_mae(&preds, &shuffled));
            }
            let mean_permuted =
                permuted_maes.iter().sum::<f64>() / permuted_maes.len() as f64;
            Ok(mean_permuted - baseline_mae)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut ranked: Vec<FeatureImportance> = importances
        .into_iter()
        .enumerate()
        .map(|(index, importance)| FeatureImportance {
            index,
            name: train.feature_names[index].clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    Ok(ranked)
}

/// Select the features a model should train on for one evaluation date.
///
/// With `top_k` set, the k highest-ranked features are kept. Otherwise
/// every feature with positive importance is kept, falling back to the
/// full candidate list when none clears zero.
pub fn select_features(
    train: &ForecastDataset,
    top_k: Option<usize>,
    seed: u64,
) -> Result<FeatureSet, SelectionError> {
    let ranked = rank_features(train, seed)?;

    let indices: Vec<usize> = match top_k {
        Some(k) => ranked.iter().take(k).map(|f| f.index).collect(),
        None => {
            let positives: Vec<usize> = ranked
                .iter()
                .filter(|f| f.importance > 0.0)
                .map(|f| f.index)
                .collect();
            if positives.is_empty() {
                return Ok(FeatureSet::all(train.feature_count()));
            }
            positives
        }
    };

    let selected = FeatureSet::new(indices);
    info!(
        "Selected {}/{} features: {:?}...",
        selected.len(),
        train.feature_count(),
        selected
            .names(&train.feature_names)
            .iter()
            .take(5)
            .collect::<Vec<_>>()
    );
    Ok(selected)
}

/// MAE of predicted vs true targets, skipping rows without a target.
fn target_mae(predictions: &[f64], dataset: &ForecastDataset) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (pred, row) in predictions.iter().zip(&dataset.rows) {
        if let Some(target) = row.error_mw {
            sum += (pred - target).abs();
            count += 1;
        }
    }
    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}

fn derive_seed(seed: u64, feature: usize, repeat: usize) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((feature as u64) << 32)
        .wrapping_add(repeat as u64 + 1)
}
