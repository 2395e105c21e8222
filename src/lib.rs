pub mod data;
pub mod metrics;
pub mod models;
pub mod rolling;
pub mod selection;

// Re-export commonly used types
pub use data::{ForecastDataset, ForecastRow, LoaderError, RawRecord};
pub use metrics::{ErrorRecord, ErrorSummary, PredictionResult};
pub use models::{AdjusterModel, ModelError, ModelKind};
pub use rolling::{
    AggregateReport, DateOutcome, EvalConfig, EvalError, RollingRunner, RunState, Split,
};
pub use selection::FeatureSet;
