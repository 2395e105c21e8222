//! Gradient-boosted tree adjuster backed by the `gbdt` crate.
//!
//! Mirrors the reference configuration used for the forecast-error
//! target: squared-error loss, 200 rounds, depth 6, shrinkage 0.05.
//! Subsampling ratios are pinned to 1.0 so training is deterministic.

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use tracing::debug;

use crate::data::ForecastDataset;
use crate::selection::FeatureSet;

use super::{test_matrix, training_matrix, AdjusterModel, Imputer, ModelError};

const MODEL_NAME: &str = "gradient_boosted_tree";

/// Minimum rows with a present target required to grow trees.
pub const MIN_TRAIN_ROWS: usize = 16;

const ITERATIONS: usize = 200;
const MAX_DEPTH: u32 = 6;
const SHRINKAGE: f64 = 0.05;

/// Gradient-boosted tree strategy.
pub struct GradientBoostedModel {
    booster: Option<GBDT>,
    imputer: Option<Imputer>,
}

impl GradientBoostedModel {
    pub fn new() -> Self {
        Self {
            booster: None,
            imputer: None,
        }
    }
}

impl Default for GradientBoostedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl AdjusterModel for GradientBoostedModel {
    fn fit(&mut self, train: &ForecastDataset, features: &FeatureSet) -> Result<(), ModelError> {
        let (x, y) = training_matrix(train, features);
        if x.len() < MIN_TRAIN_ROWS {
            return Err(ModelError::Constraint {
                model: MODEL_NAME,
                reason: format!(
                    "needs at least {} train rows with a target, got {}",
                    MIN_TRAIN_ROWS,
                    x.len()
                ),
            });
        }

        let imputer = Imputer::fit(&x, features.len());

        let mut training_data: DataVec = x
            .into_iter()
            .zip(y)
            .map(|(mut row, target)| {
                imputer.apply(&mut row);
                let feature: Vec<ValueType> = row.iter().map(|&v| v as ValueType).collect();
                Data::new_training_data(feature, 1.0, target as ValueType, None)
            })
            .collect();

        let mut cfg = Config::new();
        cfg.set_feature_size(features.len());
        cfg.set_max_depth(MAX_DEPTH);
        cfg.set_iterations(ITERATIONS);
        cfg.set_shrinkage(SHRINKAGE as ValueType);
        cfg.set_loss("SquaredError");
        cfg.set_data_sample_ratio(1.0);
        cfg.set_feature_sample_ratio(1.0);
        cfg.set_training_optimization_level(2);
        cfg.set_debug(false);

        let mut booster = GBDT::new(&cfg);
        booster.fit(&mut training_data);
        debug!(
            "Trained gbdt on {} rows x {} features",
            training_data.len(),
            features.len()
        );

        self.booster = Some(booster);
        self.imputer = Some(imputer);
        Ok(())
    }

    fn predict(
        &self,
        test: &ForecastDataset,
        features: &FeatureSet,
    ) -> Result<Vec<f64>, ModelError> {
        let booster = self.booster.as_ref().ok_or_else(|| ModelError::Prediction {
            model: MODEL_NAME,
            reason: "model not fitted".to_string(),
        })?;
        let imputer = self.imputer.as_ref().ok_or_else(|| ModelError::Prediction {
            model: MODEL_NAME,
            reason: "model not fitted".to_string(),
        })?;

        let test_data: DataVec = test_matrix(test, features)
            .into_iter()
            .map(|mut row| {
                imputer.apply(&mut row);
                let feature: Vec<ValueType> = row.iter().map(|&v| v as ValueType).collect();
                Data::new_test_data(feature, None)
            })
            .collect();

        let predictions = booster.predict(&test_data);
        Ok(predictions.into_iter().map(|p| p as f64).collect())
    }
}
