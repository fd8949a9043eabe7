//! Error types for the pipetune framework

use thiserror::Error;

/// Result type alias for pipetune operations
pub type Result<T> = std::result::Result<T, PipetuneError>;

/// Main error type for the pipetune framework
#[derive(Error, Debug)]
pub enum PipetuneError {
    #[error("Data error: {0}")]
    Data(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("History error: {0}")]
    History(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PipetuneError {
    fn from(err: serde_json::Error) -> Self {
        PipetuneError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipetuneError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipetuneError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
