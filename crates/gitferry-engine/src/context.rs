//! Shared context threaded through every strategy.

use std::sync::Arc;

use gitferry_client::GitLabClient;

use crate::conflict::ConflictResolver;
use crate::idmap::IdMap;

/// Clients and cross-phase state shared by all strategies of a run.
///
/// One instance per run; strategies hold it behind an `Arc`. The id map is
/// the only member mutated during a phase, and its own locking covers that.
pub struct MigrationContext {
    pub source: Arc<GitLabClient>,
    pub destination: Arc<GitLabClient>,
    pub maps: Arc<IdMap>,
    pub resolver: Arc<ConflictResolver>,
    /// Mirrors the destination client's dry-run flag for layers above the
    /// client (e.g. the repository transport, which never goes through it).
    pub dry_run: bool,
}

impl MigrationContext {
    pub fn new(
        source: Arc<GitLabClient>,
        destination: Arc<GitLabClient>,
        resolver: ConflictResolver,
        dry_run: bool,
    ) -> Self {
        Self {
            source,
            destination,
            maps: Arc::new(IdMap::new()),
            resolver: Arc::new(resolver),
            dry_run,
        }
    }
}
