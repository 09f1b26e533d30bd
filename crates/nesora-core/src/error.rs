//! Error types for Nesora.

use thiserror::Error;

/// Main error type for Nesora operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NesoraError {
    /// The intent names an operation with no registered endpoint.
    #[error("Unknown intent: {name}")]
    UnknownOperation { name: String },

    /// An upstream endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {reason} - {body}")]
    Http {
        status: u16,
        reason: String,
        body: String,
    },

    /// The request never produced a response (connect, TLS, reset...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The outbound call did not finish within the configured timeout.
    #[error("Request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A response body could not be decoded as JSON.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The intent waits on ids that never complete (cycle or missing id).
    #[error("Not executed: unresolved dependencies [{}] for intent {id}", .waiting_on.join(", "))]
    UnresolvableDependency { id: String, waiting_on: Vec<String> },

    /// Another intent in the same batch already uses this id.
    #[error("Duplicate intent id: {id}")]
    DuplicateIntent { id: String },

    /// Inbound request was malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is missing or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The LLM completion gateway rejected the call.
    #[error("Gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },
}

impl NesoraError {
    /// Upstream HTTP status carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NesoraError::Http { status, .. } | NesoraError::Gateway { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience Result type for Nesora operations.
pub type Result<T> = std::result::Result<T, NesoraError>;

impl From<serde_json::Error> for NesoraError {
    fn from(err: serde_json::Error) -> Self {
        NesoraError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message() {
        let err = NesoraError::Http {
            status: 500,
            reason: "Internal Server Error".to_string(),
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error - boom");
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_unresolvable_message_lists_deps() {
        let err = NesoraError::UnresolvableDependency {
            id: "b".to_string(),
            waiting_on: vec!["a".to_string(), "c".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Not executed: unresolved dependencies [a, c] for intent b"
        );
    }

    #[test]
    fn test_unknown_operation_message() {
        let err = NesoraError::UnknownOperation {
            name: "archive_ticket".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown intent: archive_ticket");
    }
}
