//! Circuit breaker for remote API calls.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Calls rejected without touching the network.
    Open,
    /// One probe call allowed through.
    HalfOpen,
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    /// Whether a half-open probe is currently in flight.
    probing: bool,
}

/// Failure-tripped gate that fails fast while a remote is unhealthy.
///
/// Only consecutive failures count: any success in the Closed state resets
/// the counter. After `reset_timeout` in the Open state, exactly one caller
/// wins the probe slot; concurrent callers keep failing fast until the
/// probe resolves.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probing: false,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Gate a call. `Ok(())` admits it; the caller must then report the
    /// outcome through [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn preflight(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    debug!("circuit breaker half-open, admitting probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probing = true;
                    Ok(())
                } else {
                    Err(ClientError::CircuitOpen {
                        retry_in: self.config.reset_timeout - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probing {
                    Err(ClientError::CircuitOpen {
                        retry_in: self.config.reset_timeout,
                    })
                } else {
                    inner.probing = true;
                    Ok(())
                }
            }
        }
    }

    /// Report a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            debug!("circuit breaker closed after successful probe");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probing = false;
    }

    /// Report a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit breaker re-opened after failed probe");
                inner.state = CircuitState::Open;
                inner.probing = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Current state, without side effects.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
        })
    }

    #[tokio::test]
    async fn starts_closed() {
        let cb = CircuitBreaker::with_defaults();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.preflight().is_ok());
    }

    #[tokio::test]
    async fn opens_exactly_at_threshold() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..2 {
            cb.preflight().unwrap();
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.preflight().unwrap();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // The next call is rejected without invoking anything.
        assert!(matches!(
            cb.preflight(),
            Err(ClientError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_one_probe_after_reset_timeout() {
        let cb = breaker(1, Duration::from_secs(10));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_secs(10)).await;

        // Many callers race for the probe slot; only one is admitted.
        let admitted: Vec<bool> = (0..5).map(|_| cb.preflight().is_ok()).collect();
        assert_eq!(admitted.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes() {
        let cb = breaker(1, Duration::from_secs(5));
        cb.record_failure();
        tokio::time::sleep(Duration::from_secs(5)).await;

        cb.preflight().unwrap();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.preflight().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_restarts_timeout() {
        let cb = breaker(1, Duration::from_secs(5));
        cb.record_failure();
        tokio::time::sleep(Duration::from_secs(5)).await;

        cb.preflight().unwrap();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Clock restarted: still rejecting before another full timeout.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(matches!(
            cb.preflight(),
            Err(ClientError::CircuitOpen { .. })
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(cb.preflight().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_reports_remaining_wait() {
        let cb = breaker(1, Duration::from_secs(10));
        cb.record_failure();
        tokio::time::sleep(Duration::from_secs(4)).await;

        match cb.preflight() {
            Err(ClientError::CircuitOpen { retry_in }) => {
                assert_eq!(retry_in, Duration::from_secs(6));
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }
    }
}
