//! # GitFerry Migration Engine
//!
//! The orchestration core: scheduling, rate-limited remote access, retry,
//! dependency ordering, and conflict handling for migrating users, groups,
//! projects, and repositories between two GitLab instances.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gitferry_engine::MigrationEngine;
//! use gitferry_types::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config: Config = serde_yaml::from_str(&std::fs::read_to_string("gitferry.yml")?)?;
//!     let engine = MigrationEngine::new(config)?;
//!     let summary = engine.run().await?;
//!     println!("{} migrated", summary.total_succeeded());
//!     Ok(())
//! }
//! ```

pub mod conflict;
pub mod context;
pub mod engine;
pub mod error;
pub mod group;
pub mod idmap;
mod members;
pub mod orchestrator;
pub mod progress;
pub mod project;
pub mod repository;
pub mod result;
pub mod strategy;
pub mod user;

pub use conflict::ConflictResolver;
pub use context::MigrationContext;
pub use engine::{MigrationEngine, MigrationPhase};
pub use error::{EngineError, Result};
pub use group::GroupMigrationStrategy;
pub use idmap::IdMap;
pub use orchestrator::run_batch;
pub use progress::{MigrationProgress, ProgressCallback, ProgressUpdate};
pub use project::ProjectMigrationStrategy;
pub use repository::RepositoryMigrationStrategy;
pub use result::{MigrationResult, MigrationSummary, PhaseTally};
pub use strategy::MigrationStrategy;
pub use user::UserMigrationStrategy;
