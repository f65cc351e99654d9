//! Bounded-concurrency batch execution of one strategy over a collection.

use std::sync::Arc;

use futures::StreamExt;
use tracing::info;

use crate::error::Result;
use crate::progress::MigrationProgress;
use crate::result::MigrationResult;
use crate::strategy::MigrationStrategy;

/// Run `strategy` over `entities` with at most `concurrency` attempts in
/// flight.
///
/// Returns one result per input entity, in completion order. Per-entity
/// failures are captured as `failed` results and never abort the batch;
/// the only fatal path is prerequisite validation, which runs before any
/// entity is attempted. No ordering is guaranteed between concurrent
/// attempts of the same batch.
pub async fn run_batch<S>(
    strategy: Arc<S>,
    entities: Vec<S::Entity>,
    concurrency: usize,
    progress: &MigrationProgress,
) -> Result<Vec<MigrationResult>>
where
    S: MigrationStrategy + 'static,
{
    strategy.validate_prerequisites().await?;

    let kind = strategy.kind();
    progress.start_phase(kind, entities.len() as u64);
    info!(%kind, entities = entities.len(), concurrency, "starting phase");

    let results: Vec<MigrationResult> = futures::stream::iter(entities)
        .map(|entity| {
            let strategy = Arc::clone(&strategy);
            async move { strategy.migrate(entity).await }
        })
        .buffer_unordered(concurrency.max(1))
        .inspect(|result| progress.entity_done(&result.label, result.status))
        .collect()
        .await;

    info!(%kind, results = results.len(), "phase complete");
    Ok(results)
}
