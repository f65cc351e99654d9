//! Top-level migration coordinator.
//!
//! Drives the fixed dependency order Users → Groups → Projects →
//! Repositories. A phase starts only after the previous phase's results
//! (including its id-map entries) are in; individual failures never block
//! the transition, since later phases degrade by recording warnings for
//! unresolvable cross-references.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gitferry_client::GitLabClient;
use gitferry_git::{GitCli, MirrorTransport};
use gitferry_types::{Config, EntityKind, Group, Project, Repository, User};

use crate::conflict::ConflictResolver;
use crate::context::MigrationContext;
use crate::error::{EngineError, Result};
use crate::group::GroupMigrationStrategy;
use crate::idmap::IdMap;
use crate::orchestrator::run_batch;
use crate::progress::MigrationProgress;
use crate::project::ProjectMigrationStrategy;
use crate::repository::RepositoryMigrationStrategy;
use crate::result::{MigrationResult, MigrationSummary};
use crate::user::UserMigrationStrategy;

/// Engine state machine over entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    NotStarted,
    Users,
    Groups,
    Projects,
    Repositories,
    Done,
}

impl From<EntityKind> for MigrationPhase {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::User => Self::Users,
            EntityKind::Group => Self::Groups,
            EntityKind::Project => Self::Projects,
            EntityKind::Repository => Self::Repositories,
        }
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Users => write!(f, "migrating users"),
            Self::Groups => write!(f, "migrating groups"),
            Self::Projects => write!(f, "migrating projects"),
            Self::Repositories => write!(f, "migrating repositories"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Coordinates a full migration run between two instances.
pub struct MigrationEngine {
    config: Config,
    context: Arc<MigrationContext>,
    transport: Arc<dyn MirrorTransport>,
    progress: Arc<MigrationProgress>,
    cancel: CancellationToken,
    phase: Mutex<MigrationPhase>,
}

impl MigrationEngine {
    /// Build an engine from validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let dry_run = config.migration.dry_run;
        let source = Arc::new(GitLabClient::new(&config.source, false)?);
        let destination = Arc::new(GitLabClient::new(&config.destination, dry_run)?);
        let resolver = ConflictResolver::with_patterns(&config.migration.conflict_patterns);
        let context = Arc::new(MigrationContext::new(source, destination, resolver, dry_run));
        let transport: Arc<dyn MirrorTransport> = Arc::new(GitCli::new(&config.git));

        Ok(Self {
            config,
            context,
            transport,
            progress: Arc::new(MigrationProgress::new()),
            cancel: CancellationToken::new(),
            phase: Mutex::new(MigrationPhase::NotStarted),
        })
    }

    /// Replace the repository transport (tests use a double here).
    pub fn with_transport(mut self, transport: Arc<dyn MirrorTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Attach a progress reporter.
    pub fn with_progress(mut self, progress: MigrationProgress) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Token for cooperative cancellation. A requested stop finishes the
    /// in-flight phase, then halts before the next one starts.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn current_phase(&self) -> MigrationPhase {
        *self.phase.lock()
    }

    /// The run-scoped identifier map.
    pub fn id_map(&self) -> Arc<IdMap> {
        Arc::clone(&self.context.maps)
    }

    /// Execute the migration and return the final report.
    pub async fn run(&self) -> Result<MigrationSummary> {
        info!(dry_run = self.config.migration.dry_run, "starting migration run");
        let mut summary = MigrationSummary::new();
        let mut projects_cache: Vec<Project> = Vec::new();

        for kind in EntityKind::PHASE_ORDER {
            if !self.kind_enabled(kind) {
                debug!(%kind, "phase disabled in configuration");
                continue;
            }
            if self.cancel.is_cancelled() {
                info!(%kind, "stop requested; halting before phase");
                break;
            }

            *self.phase.lock() = kind.into();
            self.connectivity_precheck().await?;

            let results = match kind {
                EntityKind::User => self.run_users().await?,
                EntityKind::Group => self.run_groups().await?,
                EntityKind::Project => {
                    let (results, projects) = self.run_projects().await?;
                    projects_cache = projects;
                    results
                }
                EntityKind::Repository => self.run_repositories(&projects_cache).await?,
            };
            summary.record_phase(kind, results);
        }

        *self.phase.lock() = MigrationPhase::Done;
        summary.finish();
        info!(
            succeeded = summary.total_succeeded(),
            failed = summary.total_failed(),
            skipped = summary.total_skipped(),
            "migration run finished"
        );
        Ok(summary)
    }

    fn kind_enabled(&self, kind: EntityKind) -> bool {
        let settings = &self.config.migration;
        match kind {
            EntityKind::User => settings.users,
            EntityKind::Group => settings.groups,
            EntityKind::Project => settings.projects,
            EntityKind::Repository => settings.repositories,
        }
    }

    /// Both remotes must answer before any entity of a phase is attempted.
    async fn connectivity_precheck(&self) -> Result<()> {
        self.context
            .source
            .ping()
            .await
            .map_err(|e| EngineError::Connectivity {
                instance: "source",
                source: e,
            })?;
        self.context
            .destination
            .ping()
            .await
            .map_err(|e| EngineError::Connectivity {
                instance: "destination",
                source: e,
            })?;
        Ok(())
    }

    async fn run_users(&self) -> Result<Vec<MigrationResult>> {
        let raw = self.context.source.get_paginated("/users").await?;
        let users: Vec<User> = parse_entities(raw, "user");
        let strategy = Arc::new(UserMigrationStrategy::new(Arc::clone(&self.context)));
        run_batch(
            strategy,
            users,
            self.config.migration.user_concurrency,
            &self.progress,
        )
        .await
    }

    async fn run_groups(&self) -> Result<Vec<MigrationResult>> {
        let raw = self.context.source.get_paginated("/groups").await?;
        let groups: Vec<Group> = parse_entities(raw, "group");
        let strategy = Arc::new(GroupMigrationStrategy::new(Arc::clone(&self.context)));
        run_batch(
            strategy,
            groups,
            self.config.migration.group_concurrency,
            &self.progress,
        )
        .await
    }

    async fn run_projects(&self) -> Result<(Vec<MigrationResult>, Vec<Project>)> {
        let raw = self.context.source.get_paginated("/projects").await?;
        let projects: Vec<Project> = parse_entities(raw, "project");
        let strategy = Arc::new(ProjectMigrationStrategy::new(Arc::clone(&self.context)));
        let results = run_batch(
            strategy,
            projects.clone(),
            self.config.migration.project_concurrency,
            &self.progress,
        )
        .await?;
        Ok((results, projects))
    }

    async fn run_repositories(&self, projects: &[Project]) -> Result<Vec<MigrationResult>> {
        // Only projects that actually mapped get a repository attempt.
        let repos: Vec<Repository> = projects
            .iter()
            .filter(|p| {
                self.context
                    .maps
                    .resolve(EntityKind::Project, p.id)
                    .is_some()
            })
            .map(Repository::from_project)
            .collect();

        let strategy = Arc::new(RepositoryMigrationStrategy::new(
            Arc::clone(&self.context),
            Arc::clone(&self.transport),
            self.config.git.clone(),
            self.config.source.token.clone(),
            self.config.destination.token.clone(),
        ));
        run_batch(
            strategy,
            repos,
            self.config.migration.repository_concurrency,
            &self.progress,
        )
        .await
    }
}

fn parse_entities<T: DeserializeOwned>(raw: Vec<Value>, label: &str) -> Vec<T> {
    let mut entities = Vec::with_capacity(raw.len());
    for item in raw {
        match serde_json::from_value::<T>(item) {
            Ok(entity) => entities.push(entity),
            Err(e) => warn!(kind = label, error = %e, "skipping unparseable source entry"),
        }
    }
    entities
}
