//! Token-bucket rate limiting for API requests.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter bounding outbound request rate against one remote.
///
/// The bucket holds up to `requests_per_second` tokens and refills
/// continuously. One instance is shared by every concurrent operation
/// against the same instance.
pub struct RateLimiter {
    requests_per_second: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter admitting `requests_per_second` requests.
    ///
    /// The rate must be positive; configuration validation enforces this
    /// before a client is built.
    pub fn new(requests_per_second: f64) -> Self {
        debug_assert!(requests_per_second > 0.0);
        Self {
            requests_per_second,
            bucket: Mutex::new(Bucket {
                tokens: requests_per_second,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until one admission token is available, then consume it.
    ///
    /// Never rejects and never times out. Contending callers serialize on
    /// the bucket lock, which is held across the wait so check-and-decrement
    /// stays atomic per admission.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * self.requests_per_second).min(self.requests_per_second);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return;
        }

        let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / self.requests_per_second);
        trace!(wait_ms = wait.as_millis() as u64, "throttling request");
        tokio::time::sleep(wait).await;

        // Exactly the missing fraction accumulated during the wait.
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
    }

    /// Configured admission rate.
    pub fn rate(&self) -> f64 {
        self.requests_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_is_immediate() {
        let limiter = RateLimiter::new(2.0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn five_requests_at_two_per_second_take_at_least_1500ms() {
        let limiter = RateLimiter::new(2.0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // Burst of 2, then 3 more spaced at 500ms each.
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn admissions_bounded_in_sliding_window() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        let mut admissions = Vec::new();
        for _ in 0..4 {
            limiter.acquire().await;
            admissions.push(start.elapsed());
        }
        // Window of 2s may admit at most 1*2 + 1 requests.
        let window = Duration::from_secs(2);
        for (i, at) in admissions.iter().enumerate() {
            let in_window = admissions[i..]
                .iter()
                .take_while(|later| **later - *at <= window)
                .count();
            assert!(in_window <= 3, "{in_window} admissions within {window:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquirers_are_serialized() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(2.0));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        // 2 burst + 2 throttled at 500ms spacing.
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_refills_up_to_capacity_only() {
        let limiter = RateLimiter::new(2.0);
        limiter.acquire().await;
        limiter.acquire().await;

        // A long idle period must not bank more than `rate` tokens.
        tokio::time::sleep(Duration::from_secs(60)).await;
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
