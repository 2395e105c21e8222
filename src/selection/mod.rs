//! Feature selection via permutation importance.
//!
//! A reference gradient-boosted model is fitted on the head of the
//! training subset; importance is the MAE increase on a held-out tail
//! when a feature's values are shuffled. The test subset is never
//! consulted, so selection cannot leak into the reported metrics.

pub mod importance;

use thiserror::Error;

use crate::models::ModelError;

pub use importance::{rank_features, select_features, FeatureImportance};

#[derive(Error, Debug)]
pub enum SelectionError {
    /// Not enough training rows to hold out a validation slice
    /// (recoverable: the runner skips the date).
    #[error("feature selection needs more rows: {0}")]
    InsufficientRows(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Ordered selection of feature columns, as indices into the dataset's
/// feature schema. Produced per evaluation date and never carried across
/// dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    indices: Vec<usize>,
}

impl FeatureSet {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    /// Every feature column, in schema order.
    pub fn all(count: usize) -> Self {
        Self {
            indices: (0..count).collect(),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Restrict a full feature vector to the selected columns.
    pub fn project(&self, features: &[f64]) -> Vec<f64> {
        self.indices.iter().map(|&i| features[i]).collect()
    }

    /// Resolve the selected columns against the schema.
    pub fn names(&self, schema: &[String]) -> Vec<String> {
        self.indices.iter().map(|&i| schema[i].clone()).collect()
    }
}
