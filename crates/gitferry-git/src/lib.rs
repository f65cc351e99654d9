//! Repository content transport for GitFerry.
//!
//! The migration core treats moving git data as an opaque operation with a
//! narrow contract: mirror-clone from the source, mirror-push to the
//! destination, full fidelity (all branches and tags) or a clearly
//! reported failure. The [`MirrorTransport`] trait is that contract;
//! [`GitCli`] implements it by shelling out to the `git` binary.

mod cli;

pub use cli::GitCli;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use gitferry_types::GitSettings;

/// Transport errors. Failed operations carry the git stderr text so the
/// conflict resolver can pattern-match disk-conflict-shaped messages.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git binary unavailable: {0}")]
    Unavailable(String),

    #[error("failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("git clone failed: {stderr}")]
    CloneFailed { stderr: String },

    #[error("git push failed: {stderr}")]
    PushFailed { stderr: String },
}

impl GitError {
    /// Error text suitable for conflict-pattern matching.
    pub fn detail(&self) -> &str {
        match self {
            Self::CloneFailed { stderr } | Self::PushFailed { stderr } => stderr,
            Self::Unavailable(msg) => msg,
            _ => "",
        }
    }
}

/// Result of a mirror clone.
#[derive(Debug, Clone, Default)]
pub struct CloneOutcome {
    pub branches: usize,
    pub tags: usize,
    pub warnings: Vec<String>,
}

/// Result of a mirror push.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub warnings: Vec<String>,
}

/// Full-fidelity repository transfer between two remotes.
#[async_trait]
pub trait MirrorTransport: Send + Sync {
    /// Mirror-clone `source_url` into `workdir`, authenticating with
    /// `token`. All branches and tags, or an error.
    async fn clone_mirror(
        &self,
        source_url: &str,
        token: &str,
        workdir: &Path,
    ) -> Result<CloneOutcome, GitError>;

    /// Mirror-push the clone in `workdir` to `destination_url`.
    async fn push_mirror(
        &self,
        workdir: &Path,
        destination_url: &str,
        token: &str,
    ) -> Result<PushOutcome, GitError>;
}

/// Scratch directory for one repository transfer, removed on drop.
pub struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    /// Create a scratch directory, honoring a configured base directory.
    pub fn create(settings: &GitSettings) -> Result<Self, GitError> {
        let dir = match &settings.temp_dir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                tempfile::Builder::new().prefix("gitferry-").tempdir_in(base)?
            }
            None => tempfile::Builder::new().prefix("gitferry-").tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location of the bare mirror inside the workspace.
    pub fn repo_path(&self) -> PathBuf {
        self.dir.path().join("repo.git")
    }
}
