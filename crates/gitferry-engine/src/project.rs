//! Project migration strategy.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use gitferry_client::{ApiResponse, ClientError, Result as ClientResult};
use gitferry_types::{ConflictClass, EntityKind, Namespace, NewProject, Project};

use crate::context::MigrationContext;
use crate::error::{EngineError, Result};
use crate::members::{sync_members, MemberScope};
use crate::result::MigrationResult;
use crate::strategy::{call_remote, encode, MigrationStrategy};

/// Migrates project metadata, resolving the owning namespace (group or
/// user) through the id maps built by earlier phases.
pub struct ProjectMigrationStrategy {
    ctx: Arc<MigrationContext>,
}

impl ProjectMigrationStrategy {
    pub fn new(ctx: Arc<MigrationContext>) -> Self {
        Self { ctx }
    }

    async fn find_existing(&self, project: &Project) -> ClientResult<Option<u64>> {
        let full_path = match (&project.path_with_namespace, &project.namespace) {
            (Some(full), _) => full.clone(),
            (None, Some(ns)) => format!("{}/{}", ns.path, project.path),
            (None, None) => project.path.clone(),
        };
        let endpoint = format!("/projects/{}", encode(&full_path));
        match call_remote(|| self.ctx.destination.get(&endpoint)).await {
            Ok(response) => Ok(response.body.get("id").and_then(Value::as_u64)),
            Err(ClientError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve the destination namespace id, or explain why it cannot be.
    async fn resolve_namespace(
        &self,
        project: &Project,
        result: &mut MigrationResult,
    ) -> std::result::Result<Option<u64>, String> {
        let Some(reference) = &project.namespace else {
            return Ok(None);
        };

        match reference.to_namespace() {
            Namespace::Group(group_id) => {
                match self.ctx.maps.resolve(EntityKind::Group, group_id) {
                    Some(destination_group) => Ok(Some(destination_group)),
                    None => Err(format!(
                        "group namespace {} (id {group_id}) was not migrated: resource not found",
                        reference.path
                    )),
                }
            }
            Namespace::User(user_id) => {
                let Some(destination_user) = self.ctx.maps.resolve(EntityKind::User, user_id)
                else {
                    return Err(format!(
                        "user namespace {} (id {user_id}) was not migrated: resource not found",
                        reference.path
                    ));
                };
                if self.ctx.dry_run {
                    return Ok(Some(destination_user));
                }
                // A user's personal namespace id usually equals the user
                // id, but the API is allowed to say otherwise.
                let endpoint = format!("/users/{destination_user}");
                match call_remote(|| self.ctx.destination.get(&endpoint)).await {
                    Ok(response) => Ok(Some(
                        response
                            .body
                            .get("namespace_id")
                            .and_then(Value::as_u64)
                            .unwrap_or(destination_user),
                    )),
                    Err(e) => {
                        result.warn(format!(
                            "could not look up namespace for user {destination_user}: {e}"
                        ));
                        Ok(Some(destination_user))
                    }
                }
            }
        }
    }

    async fn create(&self, payload: &NewProject) -> ClientResult<ApiResponse> {
        call_remote(|| self.ctx.destination.post("/projects", payload)).await
    }

    async fn finish_create(
        &self,
        mut result: MigrationResult,
        project: &Project,
        response: ApiResponse,
    ) -> MigrationResult {
        let created = response.body.get("id").and_then(Value::as_u64);
        let mapped = created.or_else(|| self.ctx.dry_run.then_some(project.id));
        if let Some(id) = mapped {
            self.ctx.maps.record(EntityKind::Project, project.id, id);
            sync_members(&self.ctx, MemberScope::Project, project.id, id, &mut result).await;
        }
        info!(path = %project.path, destination_id = ?mapped, "project migrated");
        result.succeed(mapped)
    }

    async fn retry_with_new_path(
        &self,
        mut result: MigrationResult,
        project: &Project,
        namespace_id: Option<u64>,
    ) -> MigrationResult {
        let candidate = self.ctx.resolver.disambiguate(&project.path);
        let mut payload = NewProject::from_project(project, namespace_id);
        payload.path = candidate.clone();
        match self.create(&payload).await {
            Ok(response) => {
                result.warn(format!("path conflict: created as {candidate}"));
                self.finish_create(result, project, response).await
            }
            Err(e) if self.ctx.resolver.classify_error(&e).is_some() => result.fail(format!(
                "path conflict persisted after disambiguation: {e}"
            )),
            Err(e) => result.fail(format!("failed to create project {candidate}: {e}")),
        }
    }
}

#[async_trait]
impl MigrationStrategy for ProjectMigrationStrategy {
    type Entity = Project;

    fn kind(&self) -> EntityKind {
        EntityKind::Project
    }

    async fn validate_prerequisites(&self) -> Result<()> {
        call_remote(|| self.ctx.destination.get("/projects?per_page=1"))
            .await
            .map_err(|e| EngineError::Prerequisites {
                kind: EntityKind::Project,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn migrate(&self, project: Project) -> MigrationResult {
        let label = project
            .path_with_namespace
            .clone()
            .unwrap_or_else(|| project.path.clone());
        let mut result = MigrationResult::begin(EntityKind::Project, project.id, &label);
        info!(path = %label, id = project.id, "migrating project");

        match self.find_existing(&project).await {
            Ok(Some(existing_id)) => {
                self.ctx
                    .maps
                    .record(EntityKind::Project, project.id, existing_id);
                result.destination_id = Some(existing_id);
                sync_members(
                    &self.ctx,
                    MemberScope::Project,
                    project.id,
                    existing_id,
                    &mut result,
                )
                .await;
                result.skip("already exists on destination")
            }
            Ok(None) => {
                let namespace_id = match self.resolve_namespace(&project, &mut result).await {
                    Ok(id) => id,
                    Err(reason) => {
                        warn!(path = %project.path, %reason, "namespace unresolved");
                        return result.fail(reason);
                    }
                };

                let payload = NewProject::from_project(&project, namespace_id);
                match self.create(&payload).await {
                    Ok(response) => self.finish_create(result, &project, response).await,
                    Err(e) => match self.ctx.resolver.classify_error(&e) {
                        Some(ConflictClass::Storage) => {
                            warn!(path = %project.path, error = %e, "storage conflict, skipping");
                            result.skip(format!("storage conflict on destination: {e}"))
                        }
                        Some(ConflictClass::Path) => {
                            self.retry_with_new_path(result, &project, namespace_id).await
                        }
                        None => {
                            result.fail(format!("failed to create project {}: {e}", project.path))
                        }
                    },
                }
            }
            Err(e) => result.fail(format!("destination lookup failed: {e}")),
        }
    }
}
