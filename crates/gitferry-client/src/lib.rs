//! GitLab API client for migration operations.
//!
//! Every request against a remote passes through three layers owned by one
//! [`GitLabClient`] per instance:
//!
//! 1. a [`CircuitBreaker`] that fails fast while the remote is unhealthy,
//! 2. a token-bucket [`RateLimiter`] bounding outbound request rate,
//! 3. a transient-failure retry loop driven by a [`RetryPolicy`].
//!
//! Rate-limit responses (429) are surfaced to the caller as
//! [`ClientError::RateLimited`] rather than slept on here; the strategy
//! layer owns that retry.

pub mod breaker;
pub mod client;
pub mod error;
pub mod rate_limit;
pub mod retry;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{ApiResponse, GitLabClient, Pages};
pub use error::{ClientError, Result};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
