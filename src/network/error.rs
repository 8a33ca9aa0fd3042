//! Network-specific error types.

use crate::network::id::ProcessorId;
use thiserror::Error;

/// Errors returned synchronously by network, port and property operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Invalid connection: {reason}")]
    InvalidConnection { reason: String },

    #[error("No data available on port '{port}'")]
    MissingData { port: String },

    #[error("Port mismatch: {0}")]
    PortMismatch(String),

    #[error("Property '{property}' holds {expected}, got {found}")]
    PropertyTypeMismatch {
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown processor {0:?}")]
    UnknownProcessor(ProcessorId),

    #[error("Unknown processor identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Processor {processor:?} has no port '{port}'")]
    UnknownPort { processor: ProcessorId, port: String },

    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    #[error("Duplicate property identifier '{0}'")]
    DuplicateProperty(String),

    #[error("Duplicate port identifier '{0}'")]
    DuplicatePort(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("No processor registered for class '{0}'")]
    UnknownClass(String),

    #[error("Network is full ({0} processors)")]
    CapacityExceeded(usize),
}

impl NetworkError {
    pub fn invalid_connection(reason: impl Into<String>) -> Self {
        NetworkError::InvalidConnection {
            reason: reason.into(),
        }
    }
}

pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Failure reported by a processor's `process()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    /// The processor stays invalid and is retried on the next pass.
    #[error("{0}")]
    Recoverable(String),

    /// Intentionally partial or empty output. Not an error for invalidation purposes.
    #[error("Incomplete result")]
    Incomplete,

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ProcessError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        ProcessError::Recoverable(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::invalid_connection("would create a cycle");
        assert_eq!(err.to_string(), "Invalid connection: would create a cycle");

        let err = NetworkError::PropertyTypeMismatch {
            property: "factor".to_string(),
            expected: "Float",
            found: "Text",
        };
        assert_eq!(err.to_string(), "Property 'factor' holds Float, got Text");
    }

    #[test]
    fn test_process_error_from_network_error() {
        let err: ProcessError = NetworkError::MissingData {
            port: "in".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "No data available on port 'in'");
    }
}
