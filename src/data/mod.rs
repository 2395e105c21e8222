//! Data layer: typed forecast rows, CSV ingestion, and feature engineering.
//!
//! Polars handles the file boundary; everything past the loader works on
//! plain Rust structs so the evaluation engine never touches a DataFrame.

pub mod loader;
pub mod preprocess;
pub mod types;

pub use loader::{load_csv, LoaderError, RawRecord, REQUIRED_COLUMNS};
pub use preprocess::build_dataset;
pub use types::{ForecastDataset, ForecastRow};
