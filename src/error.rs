//! Error types for the Kolosal FHE linear models

use thiserror::Error;

/// Result type alias for Kolosal FHE operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type for quantized model training, compilation and execution
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Quantization error: {0}")]
    QuantizationError(String),

    #[error("Compilation error: {0}")]
    CompilationError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Model not compiled, call compile() before executing in FHE")]
    ModelNotCompiled,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Circuit needs {required}-bit accumulators but the limit is {limit} bits")]
    BitWidthOverflow { required: u32, limit: u32 },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl KolosalError {
    /// Shorthand for a rejected hyperparameter value
    pub fn invalid_param(name: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        KolosalError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a row/column count mismatch
    pub fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        KolosalError::ShapeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
