// error.rs — Error types for reliability tracking.

use thiserror::Error;

/// Errors that can occur while recording or persisting reliability data.
#[derive(Debug, Error)]
pub enum ReliabilityError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize reliability data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Helpfulness must be a real number in [0, 1].
    #[error("helpfulness {0} is out of range [0, 1]")]
    OutOfRange(f64),
}
