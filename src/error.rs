//! Error types shared by every pipeline stage.

use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input file not found: '{0}'")]
    FileNotFound(PathBuf),

    #[error("No parquet files found in '{0}'")]
    NoPartitionFiles(PathBuf),

    #[error("Invalid glob pattern '{0}'")]
    GlobPattern(String, #[source] glob::PatternError),

    #[error("Required column '{column}' is missing from {table}")]
    MissingColumn { table: String, column: String },

    #[error("Power table is empty or has no year columns")]
    EmptyPowerTable,

    #[error("Cannot convert {what} '{value}' to a number")]
    TypeConversion { what: String, value: String },

    #[error("Month {0} is outside 1..=12")]
    InvalidMonth(i64),

    #[error("Lag must be at least 1, got {0}")]
    InvalidLag(usize),

    #[error("Regression needs more than {params} observations, got {observations}")]
    InsufficientObservations { observations: usize, params: usize },

    #[error("Design matrix is singular; regressors are perfectly collinear")]
    SingularDesign,

    #[error("Invalid distribution parameters: {0}")]
    Distribution(String),

    #[error("Failed to render chart: {0}")]
    ChartRender(String),

    #[error("I/O error on '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to serialize regression results")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl PipelineError {
    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        PipelineError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
