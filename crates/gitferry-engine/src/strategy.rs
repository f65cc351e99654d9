//! Migration strategy interface and shared scaffolding.

use std::future::Future;

use async_trait::async_trait;
use tracing::debug;

use gitferry_client::{ClientError, Result as ClientResult};
use gitferry_types::EntityKind;

use crate::error::Result;
use crate::result::MigrationResult;

/// Create/map/verify logic for one entity kind against two remotes.
///
/// `migrate` is infallible at the type level: every per-entity failure is
/// captured in the returned result, never raised, so one entity cannot
/// take down a batch.
#[async_trait]
pub trait MigrationStrategy: Send + Sync {
    type Entity: Send + 'static;

    fn kind(&self) -> EntityKind;

    /// Systemic precondition check, run once before any entity is
    /// attempted. Failures abort the batch.
    async fn validate_prerequisites(&self) -> Result<()>;

    /// Migrate a single entity.
    async fn migrate(&self, entity: Self::Entity) -> MigrationResult;
}

/// Drive a remote call, replaying it after the advertised delay whenever
/// the remote rate-limits us. Uncapped: a remote that keeps saying
/// "retry later" keeps being retried later; every replay re-enters the
/// circuit breaker through the client.
pub(crate) async fn call_remote<T, F, Fut>(mut op: F) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    loop {
        match op().await {
            Err(ClientError::RateLimited { retry_after }) => {
                debug!(
                    delay_s = retry_after.as_secs(),
                    "remote rate limited, waiting before replay"
                );
                tokio::time::sleep(retry_after).await;
            }
            other => return other,
        }
    }
}

/// Percent-encode a path segment or query value.
pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn call_remote_replays_rate_limited_calls() {
        let calls = AtomicUsize::new(0);
        let result: ClientResult<u32> = call_remote(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(ClientError::RateLimited {
                        retry_after: Duration::from_secs(30),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn call_remote_passes_other_errors_through() {
        let result: ClientResult<u32> = call_remote(|| async {
            Err(ClientError::NotFound {
                endpoint: "/users/1".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(ClientError::NotFound { .. })));
    }

    #[test]
    fn encode_escapes_reserved_characters() {
        assert_eq!(encode("devs/app"), "devs%2Fapp");
        assert_eq!(encode("a+b@example.com"), "a%2Bb%40example.com");
    }
}
