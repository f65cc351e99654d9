//! Error types for remote API operations.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a [`crate::GitLabClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Token rejected by the remote. Fatal to the whole run.
    #[error("authentication failed against {url}")]
    Auth { url: String },

    /// The requested resource does not exist.
    #[error("resource not found: {endpoint}")]
    NotFound { endpoint: String },

    /// The remote asked us to back off. The caller retries after the delay.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Destination reported a collision. The raw error text is preserved
    /// for the conflict resolver to pattern-match.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Any other API-level failure.
    #[error("api request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure, retried internally before surfacing.
    #[error("network error: {0}")]
    Network(String),

    /// The circuit breaker is open; no network call was made.
    #[error("circuit breaker open, retry in {}s", retry_in.as_secs())]
    CircuitOpen { retry_in: Duration },
}

impl ClientError {
    /// Whether the error indicates a transient transport problem.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Whether the error is fatal to the entire run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
