//! Fatal errors that abort a migration run.
//!
//! Entity-local failures never surface here; they are captured as `failed`
//! migration results. Only systemic preconditions abort the run.

use thiserror::Error;

use gitferry_client::ClientError;
use gitferry_types::{ConfigError, EntityKind};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("connectivity check failed for {instance} instance: {source}")]
    Connectivity {
        instance: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("prerequisites not met for {kind} migration: {reason}")]
    Prerequisites { kind: EntityKind, reason: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
