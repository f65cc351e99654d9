//! User migration strategy.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use gitferry_client::Result as ClientResult;
use gitferry_types::{EntityKind, NewUser, User};

use crate::context::MigrationContext;
use crate::error::{EngineError, Result};
use crate::result::MigrationResult;
use crate::strategy::{call_remote, encode, MigrationStrategy};

/// Accounts that exist on every instance and must never be migrated.
const SYSTEM_USERNAMES: &[&str] = &["root", "ghost", "support-bot", "alert-bot"];

/// Migrates user accounts, matching pre-existing destination users by
/// email first and username second.
pub struct UserMigrationStrategy {
    ctx: Arc<MigrationContext>,
}

impl UserMigrationStrategy {
    pub fn new(ctx: Arc<MigrationContext>) -> Self {
        Self { ctx }
    }

    fn skip_reason(user: &User) -> Option<&'static str> {
        if user.bot || user.username.to_lowercase().contains("_bot") {
            return Some("bot account");
        }
        if SYSTEM_USERNAMES.contains(&user.username.to_lowercase().as_str()) {
            return Some("system account");
        }
        if user.state == "blocked_pending_approval" {
            return Some("account blocked pending approval");
        }
        None
    }

    /// Find a matching destination user by unique key.
    async fn find_existing(&self, user: &User, email: &str) -> ClientResult<Option<u64>> {
        let by_email = format!("/users?search={}", encode(email));
        let response = call_remote(|| self.ctx.destination.get(&by_email)).await?;
        if let Value::Array(items) = &response.body {
            for item in items {
                if item.get("email").and_then(Value::as_str) == Some(email) {
                    return Ok(item.get("id").and_then(Value::as_u64));
                }
            }
        }

        let by_username = format!("/users?username={}", encode(&user.username));
        let response = call_remote(|| self.ctx.destination.get(&by_username)).await?;
        if let Value::Array(items) = &response.body {
            for item in items {
                if item.get("username").and_then(Value::as_str) == Some(user.username.as_str()) {
                    return Ok(item.get("id").and_then(Value::as_u64));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl MigrationStrategy for UserMigrationStrategy {
    type Entity = User;

    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    async fn validate_prerequisites(&self) -> Result<()> {
        let response = call_remote(|| self.ctx.destination.get("/user"))
            .await
            .map_err(|e| EngineError::Prerequisites {
                kind: EntityKind::User,
                reason: e.to_string(),
            })?;
        if !response
            .body
            .get("is_admin")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            warn!("destination token is not admin; user creation may fail");
        }
        Ok(())
    }

    async fn migrate(&self, user: User) -> MigrationResult {
        let mut result = MigrationResult::begin(EntityKind::User, user.id, &user.username);
        info!(username = %user.username, id = user.id, "migrating user");

        if let Some(reason) = Self::skip_reason(&user) {
            return result.skip(reason);
        }
        let Some(email) = user.email.clone().filter(|e| e.contains('@')) else {
            return result.skip("no usable email address");
        };

        match self.find_existing(&user, &email).await {
            Ok(Some(existing_id)) => {
                self.ctx.maps.record(EntityKind::User, user.id, existing_id);
                result.destination_id = Some(existing_id);
                result.skip("already exists on destination")
            }
            Ok(None) => {
                let payload = NewUser::from_user(&user, &email);
                match call_remote(|| self.ctx.destination.post("/users", &payload)).await {
                    Ok(response) => {
                        let created = response.body.get("id").and_then(Value::as_u64);
                        // Dry run returns no id; map the source id onto
                        // itself so later phases can still resolve it.
                        let mapped = created.or_else(|| self.ctx.dry_run.then_some(user.id));
                        if let Some(id) = mapped {
                            self.ctx.maps.record(EntityKind::User, user.id, id);
                        }
                        info!(username = %user.username, destination_id = ?mapped, "user migrated");
                        result.succeed(mapped)
                    }
                    Err(e) => {
                        warn!(username = %user.username, error = %e, "user creation failed");
                        result.fail(format!("failed to create user {}: {e}", user.username))
                    }
                }
            }
            Err(e) => result.fail(format!("destination lookup failed: {e}")),
        }
    }
}
