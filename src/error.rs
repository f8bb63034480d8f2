//! Ошибки библиотеки

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Нет обязательной колонки с меткой (только режим дообучения)
    #[error("Configuration error: required label column `{0}` is missing")]
    Configuration(String),

    #[error("Failed to load artifact `{name}`: {reason}")]
    ArtifactLoad { name: String, reason: String },

    #[error("Failed to store artifact `{name}`: {reason}")]
    ArtifactStore { name: String, reason: String },

    #[error("Malformed CSV: {0}")]
    Csv(String),

    #[error("Could not convert `{value}` to float in column `{column}` (row {row})")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Selected feature `{0}` is not among the kept columns")]
    UnknownFeature(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
