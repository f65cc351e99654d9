//! Run configuration types.
//!
//! Loading (YAML file, environment overrides) happens in the CLI crate;
//! this module only defines the shapes and their validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ConflictClass;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{instance} url must start with http:// or https://: {url}")]
    InvalidUrl { instance: &'static str, url: String },

    #[error("{instance} access token is empty")]
    MissingToken { instance: &'static str },

    #[error("{instance} requests_per_second must be positive, got {value}")]
    InvalidRate { instance: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    InvalidConcurrency { field: &'static str },

    #[error("timeout must be greater than zero")]
    InvalidTimeout,
}

/// Connection settings for one GitLab instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Instance base URL, e.g. `https://gitlab.example.com`.
    pub url: String,
    /// Personal access token.
    pub token: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Outbound request budget for this instance.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_requests_per_second() -> f64 {
    10.0
}

impl InstanceConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }

    fn validate(&self, instance: &'static str) -> Result<(), ConfigError> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl {
                instance,
                url: self.url.clone(),
            });
        }
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken { instance });
        }
        if self.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRate {
                instance,
                value: self.requests_per_second,
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// An operator-supplied addition to the conflict pattern set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictPattern {
    /// Substring matched case-insensitively against error text.
    pub pattern: String,
    pub class: ConflictClass,
}

/// What to migrate and how wide to run each phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSettings {
    #[serde(default = "default_true")]
    pub users: bool,
    #[serde(default = "default_true")]
    pub groups: bool,
    #[serde(default = "default_true")]
    pub projects: bool,
    #[serde(default = "default_true")]
    pub repositories: bool,

    /// Short-circuit mutating calls to synthetic successes.
    #[serde(default)]
    pub dry_run: bool,

    /// Concurrent migration attempts per entity kind.
    #[serde(default = "default_user_concurrency")]
    pub user_concurrency: usize,
    #[serde(default = "default_group_concurrency")]
    pub group_concurrency: usize,
    #[serde(default = "default_project_concurrency")]
    pub project_concurrency: usize,
    #[serde(default = "default_repository_concurrency")]
    pub repository_concurrency: usize,

    /// Extra collision phrasings, evaluated before the built-in set.
    #[serde(default)]
    pub conflict_patterns: Vec<ConflictPattern>,
}

fn default_true() -> bool {
    true
}

fn default_user_concurrency() -> usize {
    10
}

fn default_group_concurrency() -> usize {
    5
}

fn default_project_concurrency() -> usize {
    5
}

fn default_repository_concurrency() -> usize {
    2
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            users: true,
            groups: true,
            projects: true,
            repositories: true,
            dry_run: false,
            user_concurrency: default_user_concurrency(),
            group_concurrency: default_group_concurrency(),
            project_concurrency: default_project_concurrency(),
            repository_concurrency: default_repository_concurrency(),
            conflict_patterns: Vec::new(),
        }
    }
}

impl MigrationSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("user_concurrency", self.user_concurrency),
            ("group_concurrency", self.group_concurrency),
            ("project_concurrency", self.project_concurrency),
            ("repository_concurrency", self.repository_concurrency),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidConcurrency { field });
            }
        }
        Ok(())
    }
}

/// Git transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSettings {
    /// Base directory for mirror workdirs; system temp when unset.
    #[serde(default)]
    pub temp_dir: Option<std::path::PathBuf>,
    /// Timeout for a single git operation in seconds.
    #[serde(default = "default_git_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempt LFS object transfer for LFS-enabled repositories.
    #[serde(default = "default_true")]
    pub lfs_enabled: bool,
}

fn default_git_timeout_secs() -> u64 {
    3600
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            temp_dir: None,
            timeout_secs: default_git_timeout_secs(),
            lfs_enabled: true,
        }
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: InstanceConfig,
    pub destination: InstanceConfig,
    #[serde(default)]
    pub migration: MigrationSettings,
    #[serde(default)]
    pub git: GitSettings,
}

impl Config {
    /// Check the configuration before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate("source")?;
        self.destination.validate("destination")?;
        self.migration.validate()?;
        if self.git.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}
