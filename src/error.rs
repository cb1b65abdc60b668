use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Result type for publishing operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors surfaced by the publishing client.
///
/// The variants are split so callers can tell apart "the network is bad"
/// ([`PublishError::Transport`], 5xx [`PublishError::UnexpectedResponse`]),
/// "my request is bad" (4xx), "my data is bad" ([`PublishError::ResourceFailed`]),
/// "it took too long" ([`PublishError::Timeout`]) and "this resource cannot do
/// that right now" ([`PublishError::NotImplemented`]).
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status}: {body}")]
    UnexpectedResponse { status: u16, body: Value },

    #[error("Response indicated that resource failed to process: {body}")]
    ResourceFailed { body: Value },

    #[error("Timed out after {elapsed:?} waiting for completion of {resource}: {body}")]
    Timeout {
        elapsed: Duration,
        resource: String,
        /// Attributes of the last state fetched
        body: Value,
    },

    #[error("{operation} is not implemented for this resource in its current state")]
    NotImplemented { operation: String },

    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Upload worker failed: {0}")]
    Worker(String),
}

impl PublishError {
    /// Create a malformed response error
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Create a not implemented error for the given operation name
    pub fn not_implemented<S: Into<String>>(operation: S) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Connection-level failures and 5xx responses are transient. Anything
    /// the server rejected with a non-5xx status, and every local failure,
    /// is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source } => !source.is_builder(),
            Self::UnexpectedResponse { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// The remote status code, when the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedResponse { status, .. } => Some(*status),
            Self::Transport { source } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
