//! Error types for the conversation store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the conversation API.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// Network or transport failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered outside the accepted status range.
    #[error("server returned {status}: {status_text}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        status_text: String,
    },

    /// Response body could not be decoded.
    #[error("JSON parsing error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl ConversationError {
    /// Build a status error from a response status.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

/// Convenience result alias for conversation API operations.
pub type ConversationResult<T> = Result<T, ConversationError>;

/// Normalized error carried by `SERVER_ERROR_BROADCAST`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    /// Human readable description.
    pub message: String,
}

impl From<&ConversationError> for ServerError {
    fn from(err: &ConversationError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_reason() {
        let err = ConversationError::from_status(reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "server returned 503: Service Unavailable");
        assert_eq!(
            ServerError::from(&err).message,
            "server returned 503: Service Unavailable"
        );
    }
}
