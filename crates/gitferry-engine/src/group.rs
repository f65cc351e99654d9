//! Group migration strategy.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use gitferry_client::{ApiResponse, ClientError, Result as ClientResult};
use gitferry_types::{ConflictClass, EntityKind, Group, NewGroup};

use crate::context::MigrationContext;
use crate::error::{EngineError, Result};
use crate::members::{sync_members, MemberScope};
use crate::result::MigrationResult;
use crate::strategy::{call_remote, encode, MigrationStrategy};

/// Migrates groups, resolving parent groups through the id map and
/// disambiguating path collisions once before giving up.
pub struct GroupMigrationStrategy {
    ctx: Arc<MigrationContext>,
}

impl GroupMigrationStrategy {
    pub fn new(ctx: Arc<MigrationContext>) -> Self {
        Self { ctx }
    }

    async fn find_existing(&self, full_path: &str) -> ClientResult<Option<u64>> {
        let endpoint = format!("/groups/{}", encode(full_path));
        match call_remote(|| self.ctx.destination.get(&endpoint)).await {
            Ok(response) => Ok(response.body.get("id").and_then(Value::as_u64)),
            Err(ClientError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, payload: &NewGroup) -> ClientResult<ApiResponse> {
        call_remote(|| self.ctx.destination.post("/groups", payload)).await
    }

    /// Finish a successful create: record the mapping, sync members.
    async fn finish_create(
        &self,
        mut result: MigrationResult,
        group: &Group,
        response: ApiResponse,
    ) -> MigrationResult {
        let created = response.body.get("id").and_then(Value::as_u64);
        let mapped = created.or_else(|| self.ctx.dry_run.then_some(group.id));
        if let Some(id) = mapped {
            self.ctx.maps.record(EntityKind::Group, group.id, id);
            sync_members(&self.ctx, MemberScope::Group, group.id, id, &mut result).await;
        }
        info!(path = %group.path, destination_id = ?mapped, "group migrated");
        result.succeed(mapped)
    }

    /// One retry under a disambiguated path; a second collision fails the
    /// entity instead of growing an unbounded suffix chain.
    async fn retry_with_new_path(
        &self,
        mut result: MigrationResult,
        group: &Group,
        parent_id: Option<u64>,
    ) -> MigrationResult {
        let candidate = self.ctx.resolver.disambiguate(&group.path);

        match self.find_existing(&candidate).await {
            Ok(Some(_)) => {
                return result.fail(format!(
                    "disambiguated path {candidate} already exists on destination"
                ));
            }
            Ok(None) => {}
            Err(e) => return result.fail(format!("could not verify candidate path: {e}")),
        }

        let mut payload = NewGroup::from_group(group, parent_id);
        payload.path = candidate.clone();
        match self.create(&payload).await {
            Ok(response) => {
                result.warn(format!("path conflict: created as {candidate}"));
                self.finish_create(result, group, response).await
            }
            Err(e) if self.ctx.resolver.classify_error(&e).is_some() => result.fail(format!(
                "path conflict persisted after disambiguation: {e}"
            )),
            Err(e) => result.fail(format!("failed to create group {candidate}: {e}")),
        }
    }
}

#[async_trait]
impl MigrationStrategy for GroupMigrationStrategy {
    type Entity = Group;

    fn kind(&self) -> EntityKind {
        EntityKind::Group
    }

    async fn validate_prerequisites(&self) -> Result<()> {
        call_remote(|| self.ctx.destination.get("/groups?per_page=1"))
            .await
            .map_err(|e| EngineError::Prerequisites {
                kind: EntityKind::Group,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn migrate(&self, group: Group) -> MigrationResult {
        let label = group.full_path.clone().unwrap_or_else(|| group.path.clone());
        let mut result = MigrationResult::begin(EntityKind::Group, group.id, &label);
        info!(path = %label, id = group.id, "migrating group");

        let lookup = group.full_path.as_deref().unwrap_or(&group.path);
        match self.find_existing(lookup).await {
            Ok(Some(existing_id)) => {
                self.ctx.maps.record(EntityKind::Group, group.id, existing_id);
                result.destination_id = Some(existing_id);
                sync_members(&self.ctx, MemberScope::Group, group.id, existing_id, &mut result)
                    .await;
                result.skip("already exists on destination")
            }
            Ok(None) => {
                let parent_id = match group.parent_id {
                    Some(source_parent) => {
                        let resolved = self.ctx.maps.resolve(EntityKind::Group, source_parent);
                        if resolved.is_none() {
                            result.warn(format!(
                                "parent group {source_parent} not migrated; creating at top level"
                            ));
                        }
                        resolved
                    }
                    None => None,
                };

                let payload = NewGroup::from_group(&group, parent_id);
                match self.create(&payload).await {
                    Ok(response) => self.finish_create(result, &group, response).await,
                    Err(e) => match self.ctx.resolver.classify_error(&e) {
                        Some(ConflictClass::Storage) => {
                            warn!(path = %group.path, error = %e, "storage conflict, skipping");
                            result.skip(format!("storage conflict on destination: {e}"))
                        }
                        Some(ConflictClass::Path) => {
                            self.retry_with_new_path(result, &group, parent_id).await
                        }
                        None => result.fail(format!("failed to create group {}: {e}", group.path)),
                    },
                }
            }
            Err(e) => result.fail(format!("destination lookup failed: {e}")),
        }
    }
}
