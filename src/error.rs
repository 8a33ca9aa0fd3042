//! Error handling for visflow
//!
//! Network operations return `NetworkError` directly. This module wraps it
//! together with the configuration, I/O and serialization failures that
//! appear at the crate's outer edges.

use crate::network::NetworkError;
use thiserror::Error;

/// Main error type for visflow operations
#[derive(Error, Debug)]
pub enum VisFlowError {
    /// Errors raised by the processor network
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<VisFlowError>,
    },
}

impl VisFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        VisFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for VisFlowError {
    fn from(err: serde_json::Error) -> Self {
        VisFlowError::Serialization(err.to_string())
    }
}

/// Result type alias for visflow operations
pub type Result<T> = std::result::Result<T, VisFlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<VisFlowError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ProcessorId;

    #[test]
    fn test_error_display() {
        let err = VisFlowError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_with_context() {
        let err = VisFlowError::Serialization("test".to_string());
        let with_ctx = err.with_context("Failed to load snapshot");
        assert!(with_ctx.to_string().contains("Failed to load snapshot"));
    }

    #[test]
    fn test_network_error_conversion() {
        let result: std::result::Result<(), NetworkError> =
            Err(NetworkError::UnknownProcessor(ProcessorId(7)));
        let err = result.context("Restoring").unwrap_err();
        assert!(err.to_string().starts_with("Restoring: Network error"));
    }
}
