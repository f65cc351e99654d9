//! Common types used throughout `gitferry`.
//!
//! This crate provides the entity model and configuration types for the
//! GitFerry migration tool. Entities mirror the GitLab v4 API JSON shapes
//! they are deserialized from; configuration types are plain serde structs
//! validated before a run starts.

pub mod config;
pub mod entity;

pub use config::{
    Config, ConfigError, ConflictPattern, GitSettings, InstanceConfig, MigrationSettings,
};
pub use entity::{
    Group, Member, Namespace, NamespaceRef, NewGroup, NewMember, NewProject, NewUser, Project,
    Repository, User,
};

use serde::{Deserialize, Serialize};

/// A category of migrated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
    Project,
    Repository,
}

impl EntityKind {
    /// The fixed dependency order of migration phases.
    ///
    /// Projects need resolved group/user namespaces, repositories need
    /// resolved projects, and members need resolved users.
    pub const PHASE_ORDER: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::Group,
        EntityKind::Project,
        EntityKind::Repository,
    ];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
            Self::Project => write!(f, "project"),
            Self::Repository => write!(f, "repository"),
        }
    }
}

/// Membership access level, ordered so upgrade comparisons work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum AccessLevel {
    Guest,
    Reporter,
    Developer,
    Maintainer,
    Owner,
}

impl AccessLevel {
    /// Numeric value as used by the GitLab API.
    pub fn as_u64(self) -> u64 {
        match self {
            Self::Guest => 10,
            Self::Reporter => 20,
            Self::Developer => 30,
            Self::Maintainer => 40,
            Self::Owner => 50,
        }
    }

    /// Map a raw API value onto the nearest known level.
    ///
    /// GitLab reports a few intermediate levels (e.g. minimal access = 5);
    /// anything below Reporter is treated as Guest.
    pub fn from_raw(value: u64) -> Self {
        match value {
            v if v >= 50 => Self::Owner,
            v if v >= 40 => Self::Maintainer,
            v if v >= 30 => Self::Developer,
            v if v >= 20 => Self::Reporter,
            _ => Self::Guest,
        }
    }
}

impl From<u64> for AccessLevel {
    fn from(value: u64) -> Self {
        Self::from_raw(value)
    }
}

impl From<AccessLevel> for u64 {
    fn from(level: AccessLevel) -> Self {
        level.as_u64()
    }
}

/// Lifecycle of a single entity migration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Skipped,
}

impl MigrationStatus {
    /// Terminal statuses are write-once and never overwritten.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Classification of a destination-side collision.
///
/// Path collisions can be retried under a disambiguated path; storage
/// collisions indicate a destination-side inconsistency that renaming
/// cannot resolve, so the entity is skipped instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictClass {
    Path,
    Storage,
}
