//! Pluggable adjuster models.
//!
//! Every strategy implements the same two-method contract: fit on a
//! training subset, predict the forecast-error target for a test subset,
//! row-aligned. Internals are opaque; the rolling runner only sees this
//! trait and the constraint errors a strategy may raise.

pub mod gradient_boosted;
pub mod tabular;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::ForecastDataset;
use crate::selection::FeatureSet;

pub use gradient_boosted::GradientBoostedModel;
pub use tabular::TabularFoundationModel;

#[derive(Error, Debug)]
pub enum ModelError {
    /// A strategy-specific constraint was violated (recoverable: the
    /// runner skips the date and logs the reason).
    #[error("{model}: constraint violated: {reason}")]
    Constraint { model: &'static str, reason: String },

    #[error("{model}: training failed: {reason}")]
    Training { model: &'static str, reason: String },

    #[error("{model}: prediction failed: {reason}")]
    Prediction { model: &'static str, reason: String },
}

/// The fit/predict contract shared by all adjuster strategies.
///
/// A model instance is fitted at most once; the runner constructs a fresh
/// instance per evaluation date, so no state ever crosses dates.
pub trait AdjusterModel {
    /// Train on `train`, restricted to the selected features. Must never
    /// see the test subset.
    fn fit(&mut self, train: &ForecastDataset, features: &FeatureSet) -> Result<(), ModelError>;

    /// Predict the forecast-error target for every row of `test`, in row
    /// order.
    fn predict(
        &self,
        test: &ForecastDataset,
        features: &FeatureSet,
    ) -> Result<Vec<f64>, ModelError>;
}

/// Known model strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// gbdt-based gradient boosted trees.
    GradientBoostedTree,
    /// In-context tabular predictor (fit stores the context, predict
    /// runs inference against it).
    TabularFoundation,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GradientBoostedTree => "gradient_boosted_tree",
            Self::TabularFoundation => "tabular_foundation",
        }
    }

    /// Construct a fresh, unfitted model of this kind. Both strategies
    /// are deterministic by construction; the run's random seed only
    /// drives feature selection.
    pub fn build(&self) -> Box<dyn AdjusterModel> {
        match self {
            Self::GradientBoostedTree => Box::new(GradientBoostedModel::new()),
            Self::TabularFoundation => Box::new(TabularFoundationModel::new()),
        }
    }
}

/// Column-mean imputer fitted on training data.
///
/// Both strategies reject NaN inputs internally, so missing feature
/// values (early lag windows) are replaced by the train-column mean; a
/// column with no finite values imputes to zero.
#[derive(Debug, Clone)]
pub(crate) struct Imputer {
    means: Vec<f64>,
}

impl Imputer {
    pub(crate) fn fit(matrix: &[Vec<f64>], width: usize) -> Self {
        let mut sums = vec![0.0; width];
        let mut counts = vec![0usize; width];
        for row in matrix {
            for (j, &v) in row.iter().enumerate() {
                if v.is_finite() {
                    sums[j] += v;
                    counts[j] += 1;
                }
            }
        }
        let means = sums
            .iter()
            .zip(counts.iter())
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();
        Self { means }
    }

    pub(crate) fn apply(&self, row: &mut [f64]) {
        for (j, v) in row.iter_mut().enumerate() {
            if !v.is_finite() {
                *v = self.means[j];
            }
        }
    }
}

/// Extract the (features, target) training matrix for rows with a
/// present target, restricted to the selected feature columns.
pub(crate) fn training_matrix(
    train: &ForecastDataset,
    features: &FeatureSet,
) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut x = Vec::with_capacity(train.len());
    let mut y = Vec::with_capacity(train.len());
    for row in &train.rows {
        if let Some(target) = row.error_mw {
            x.push(features.project(&row.features));
            y.push(target);
        }
    }
    (x, y)
}

/// Extract the feature matrix for every test row, in row order.
pub(crate) fn test_matrix(test: &ForecastDataset, features: &FeatureSet) -> Vec<Vec<f64>> {
    test.rows
        .iter()
        .map(|row| features.project(&row.features))
        .collect()
}
