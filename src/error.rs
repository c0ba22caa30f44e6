//! Error types for the Kolosal drift monitor

use thiserror::Error;

/// Result type alias for drift monitoring operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Main error type for the drift monitor
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Operation '{operation}' timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DriftError {
    /// Whether the error came from an I/O boundary (store, source, sink)
    /// rather than from the caller's input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriftError::StorageError(_) | DriftError::Timeout { .. } | DriftError::IoError(_)
        )
    }
}

impl From<serde_json::Error> for DriftError {
    fn from(err: serde_json::Error) -> Self {
        DriftError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriftError::NotImplemented("incremental baseline merge".to_string());
        assert_eq!(err.to_string(), "Not implemented: incremental baseline merge");
    }

    #[test]
    fn test_timeout_display() {
        let err = DriftError::Timeout { operation: "fetch_evaluations".to_string(), after_ms: 250 };
        assert_eq!(err.to_string(), "Operation 'fetch_evaluations' timed out after 250 ms");
        assert!(err.is_transient());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DriftError = io_err.into();
        assert!(matches!(err, DriftError::IoError(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DriftError = json_err.into();
        assert!(matches!(err, DriftError::SerializationError(_)));
        assert!(!err.is_transient());
    }
}
