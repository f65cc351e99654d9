//! Repository content migration strategy.
//!
//! Metadata was handled by the project phase; this phase moves git data
//! through the mirror transport and then propagates repository settings
//! (default branch, protected branches) as best-effort warnings.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use gitferry_git::{MirrorTransport, Workspace};
use gitferry_types::{ConflictClass, EntityKind, GitSettings, Repository};

use crate::context::MigrationContext;
use crate::error::{EngineError, Result};
use crate::result::MigrationResult;
use crate::strategy::{call_remote, MigrationStrategy};

pub struct RepositoryMigrationStrategy {
    ctx: Arc<MigrationContext>,
    transport: Arc<dyn MirrorTransport>,
    git: GitSettings,
    source_token: String,
    destination_token: String,
}

impl RepositoryMigrationStrategy {
    pub fn new(
        ctx: Arc<MigrationContext>,
        transport: Arc<dyn MirrorTransport>,
        git: GitSettings,
        source_token: impl Into<String>,
        destination_token: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            transport,
            git,
            source_token: source_token.into(),
            destination_token: destination_token.into(),
        }
    }

    async fn destination_clone_url(&self, destination_project: u64) -> Option<String> {
        let endpoint = format!("/projects/{destination_project}");
        match call_remote(|| self.ctx.destination.get(&endpoint)).await {
            Ok(response) => response
                .body
                .get("http_url_to_repo")
                .and_then(Value::as_str)
                .map(String::from),
            Err(e) => {
                warn!(destination_project, error = %e, "could not fetch destination project");
                None
            }
        }
    }

    /// Default branch and protected branches, after the push. Failures are
    /// warnings: the content is already across.
    async fn propagate_settings(
        &self,
        repo: &Repository,
        destination_project: u64,
        result: &mut MigrationResult,
    ) {
        if let Some(branch) = &repo.default_branch {
            let endpoint = format!("/projects/{destination_project}");
            let payload = json!({ "default_branch": branch });
            if let Err(e) = call_remote(|| self.ctx.destination.put(&endpoint, &payload)).await {
                result.warn(format!("could not set default branch {branch}: {e}"));
            }
        }

        let source_endpoint = format!("/projects/{}/protected_branches", repo.project_id);
        let protected = match call_remote(|| self.ctx.source.get(&source_endpoint)).await {
            Ok(response) => match response.body {
                Value::Array(items) => items,
                _ => Vec::new(),
            },
            Err(e) => {
                debug!(error = %e, "no protected branch data from source");
                Vec::new()
            }
        };

        let destination_endpoint = format!("/projects/{destination_project}/protected_branches");
        for branch in protected {
            let Some(name) = branch.get("name").and_then(Value::as_str) else {
                continue;
            };
            let payload = json!({
                "name": name,
                "push_access_level": first_access_level(&branch, "push_access_levels"),
                "merge_access_level": first_access_level(&branch, "merge_access_levels"),
            });
            if let Err(e) =
                call_remote(|| self.ctx.destination.post(&destination_endpoint, &payload)).await
            {
                result.warn(format!("could not protect branch {name}: {e}"));
            }
        }
    }
}

fn first_access_level(branch: &Value, key: &str) -> u64 {
    branch
        .get(key)
        .and_then(Value::as_array)
        .and_then(|levels| levels.first())
        .and_then(|level| level.get("access_level"))
        .and_then(Value::as_u64)
        .unwrap_or(40)
}

#[async_trait]
impl MigrationStrategy for RepositoryMigrationStrategy {
    type Entity = Repository;

    fn kind(&self) -> EntityKind {
        EntityKind::Repository
    }

    async fn validate_prerequisites(&self) -> Result<()> {
        call_remote(|| self.ctx.source.get("/projects?per_page=1"))
            .await
            .map_err(|e| EngineError::Prerequisites {
                kind: EntityKind::Repository,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn migrate(&self, repo: Repository) -> MigrationResult {
        let mut result = MigrationResult::begin(EntityKind::Repository, repo.project_id, &repo.path);
        info!(path = %repo.path, project_id = repo.project_id, "migrating repository");

        let Some(destination_project) = self.ctx.maps.resolve(EntityKind::Project, repo.project_id)
        else {
            return result.fail(format!(
                "project {} was not migrated; repository has no destination",
                repo.project_id
            ));
        };

        if self.ctx.dry_run {
            debug!(path = %repo.path, "dry run: skipping git transfer");
            self.ctx
                .maps
                .record(EntityKind::Repository, repo.project_id, destination_project);
            return result.succeed(Some(destination_project));
        }

        if repo.empty_repo {
            result.warn("source repository is empty; nothing to transfer");
            self.ctx
                .maps
                .record(EntityKind::Repository, repo.project_id, destination_project);
            return result.succeed(Some(destination_project));
        }

        let Some(source_url) = repo.http_url_to_repo.clone() else {
            return result.fail("source project reports no clone url");
        };
        let Some(destination_url) = self.destination_clone_url(destination_project).await else {
            return result.fail(format!(
                "destination project {destination_project} has no clone url"
            ));
        };

        let workspace = match Workspace::create(&self.git) {
            Ok(workspace) => workspace,
            Err(e) => return result.fail(format!("could not create git workdir: {e}")),
        };

        let clone = match self
            .transport
            .clone_mirror(&source_url, &self.source_token, workspace.path())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                return match self.ctx.resolver.classify(e.detail()) {
                    Some(ConflictClass::Storage) => {
                        result.skip(format!("storage conflict during clone: {e}"))
                    }
                    _ => result.fail(format!("clone failed: {e}")),
                };
            }
        };
        for warning in clone.warnings {
            result.warn(warning);
        }

        let push = match self
            .transport
            .push_mirror(workspace.path(), &destination_url, &self.destination_token)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                return match self.ctx.resolver.classify(e.detail()) {
                    Some(ConflictClass::Storage) => {
                        result.skip(format!("storage conflict during push: {e}"))
                    }
                    _ => result.fail(format!("push failed: {e}")),
                };
            }
        };
        for warning in push.warnings {
            result.warn(warning);
        }

        self.propagate_settings(&repo, destination_project, &mut result)
            .await;

        info!(
            path = %repo.path,
            branches = clone.branches,
            tags = clone.tags,
            "repository content transferred"
        );
        self.ctx
            .maps
            .record(EntityKind::Repository, repo.project_id, destination_project);
        result.succeed(Some(destination_project))
    }
}
