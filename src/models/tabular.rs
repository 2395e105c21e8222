//! In-context tabular adjuster.
//!
//! Follows the foundation-model contract: `fit` only ingests the training
//! subset as context (no parameter updates), and `predict` runs inference
//! for each test row against that context, here a distance-weighted
//! nearest-neighbour regression over z-scored features. Fully
//! deterministic; ties between equidistant neighbours resolve by row
//! order.

use tracing::debug;

use crate::data::ForecastDataset;
use crate::selection::FeatureSet;

use super::{test_matrix, training_matrix, AdjusterModel, Imputer, ModelError};

const MODEL_NAME: &str = "tabular_foundation";

/// Largest context the strategy accepts; larger training subsets violate
/// the model constraint and the date is skipped.
pub const MAX_CONTEXT_ROWS: usize = 10_000;

/// Neighbours consulted per prediction.
const NEIGHBORS: usize = 16;

const DISTANCE_EPS: f64 = 1e-9;

struct Context {
    /// Standardized training features.
    x: Vec<Vec<f64>>,
    /// Forecast-error targets aligned with `x`.
    y: Vec<f64>,
    imputer: Imputer,
    means: Vec<f64>,
    stds: Vec<f64>,
}

/// In-context tabular strategy.
pub struct TabularFoundationModel {
    context: Option<Context>,
}

impl TabularFoundationModel {
    pub fn new() -> Self {
        Self { context: None }
    }
}

impl Default for TabularFoundationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl AdjusterModel for TabularFoundationModel {
    fn fit(&mut self, train: &ForecastDataset, features: &FeatureSet) -> Result<(), ModelError> {
        let (mut x, y) = training_matrix(train, features);
        if x.is_empty() {
            return Err(ModelError::Constraint {
                model: MODEL_NAME,
                reason: "no train rows with a target".to_string(),
            });
        }
        if x.len() > MAX_CONTEXT_ROWS {
            return Err(ModelError::Constraint {
                model: MODEL_NAME,
                reason: format!(
                    "context window supports at most {} rows, got {}",
                    MAX_CONTEXT_ROWS,
                    x.len()
                ),
            });
        }

        let width = features.len();
        let imputer = Imputer::fit(&x, width);
        for row in &mut x {
            imputer.apply(row);
        }

        let (means, stds) = column_stats(&x, width);
        for row in &mut x {
            standardize(row, &means, &stds);
        }

        debug!("Stored context of {} rows x {} features", x.len(), width);
        self.context = Some(Context {
            x,
            y,
            imputer,
            means,
            stds,
        });
        Ok(())
    }

    fn predict(
        &self,
        test: &ForecastDataset,
        features: &FeatureSet,
    ) -> Result<Vec<f64>, ModelError> {
        let context = self.context.as_ref().ok_or_else(|| ModelError::Prediction {
            model: MODEL_NAME,
            reason: "model not fitted".to_string(),
        })?;

        let mut predictions = Vec::with_capacity(test.len());
        for mut row in test_matrix(test, features) {
            context.imputer.apply(&mut row);
            standardize(&mut row, &context.means, &context.stds);
            predictions.push(infer(context, &row));
        }
        Ok(predictions)
    }
}

/// Distance-weighted mean of the nearest context targets.
fn infer(context: &Context, query: &[f64]) -> f64 {
    let mut distances: Vec<(f64, usize)> = context
        .x
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let d2: f64 = row
                .iter()
                .zip(query)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (d2.sqrt(), idx)
        })
        .collect();
    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let k = NEIGHBORS.min(distances.len());
    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;
    for &(dist, idx) in distances.iter().take(k) {
        let weight = 1.0 / (dist + DISTANCE_EPS);
        weight_sum += weight;
        value_sum += weight * context.y[idx];
    }
    value_sum / weight_sum
}

fn column_stats(matrix: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = matrix.len() as f64;
    let mut means = vec![0.0; width];
    for row in matrix {
        for (j, &v) in row.iter().enumerate() {
            means[j] += v;
        }
    }
    for mean in &mut means {
        *mean /= n;
    }

    let mut stds = vec![0.0; width];
    for row in matrix {
        for (j, &v) in row.iter().enumerate() {
            let d = v - means[j];
            stds[j] += d * d;
        }
    }
    for std in &mut stds {
        *std = (*std / n).sqrt();
        if *std < DISTANCE_EPS {
            *std = 1.0;
        }
    }
    (means, stds)
}

fn standardize(row: &mut [f64], means: &[f64], stds: &[f64]) {
    for (j, v) in row.iter_mut().enumerate() {
        *v = (*v - means[j]) / stds[j];
    }
}
