//! Member binding migration, shared by the group and project strategies.
//!
//! A binding is never created twice for the same (entity, user) pair: the
//! destination membership list is consulted first, lower access levels are
//! upgraded in place, and equal-or-higher levels are left untouched.
//! Member problems degrade to warnings on the owning entity's result;
//! they never fail the entity itself.

use std::collections::HashMap;

use serde_json::json;
use tracing::debug;

use gitferry_client::ClientError;
use gitferry_types::{AccessLevel, EntityKind, Member, NewMember};

use crate::context::MigrationContext;
use crate::result::MigrationResult;
use crate::strategy::call_remote;

/// Which kind of entity owns the memberships.
#[derive(Debug, Clone, Copy)]
pub(crate) enum MemberScope {
    Group,
    Project,
}

impl MemberScope {
    fn prefix(self) -> &'static str {
        match self {
            Self::Group => "groups",
            Self::Project => "projects",
        }
    }
}

/// Copy memberships of one source entity onto its destination counterpart.
pub(crate) async fn sync_members(
    ctx: &MigrationContext,
    scope: MemberScope,
    source_owner_id: u64,
    destination_owner_id: u64,
    result: &mut MigrationResult,
) {
    let source_endpoint = format!("/{}/{}/members", scope.prefix(), source_owner_id);
    let raw = match call_remote(|| ctx.source.get_paginated(&source_endpoint)).await {
        Ok(items) => items,
        Err(e) => {
            result.warn(format!("could not list source members: {e}"));
            return;
        }
    };

    let mut members = Vec::new();
    for item in raw {
        match serde_json::from_value::<Member>(item) {
            Ok(member) => members.push(member),
            Err(e) => result.warn(format!("unparseable source member entry: {e}")),
        }
    }
    if members.is_empty() {
        return;
    }

    let destination_endpoint = format!("/{}/{}/members", scope.prefix(), destination_owner_id);
    let existing: HashMap<u64, AccessLevel> =
        match call_remote(|| ctx.destination.get_paginated(&destination_endpoint)).await {
            Ok(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<Member>(item).ok())
                .map(|m| (m.id, m.access_level))
                .collect(),
            Err(ClientError::NotFound { .. }) => HashMap::new(),
            Err(e) => {
                result.warn(format!("could not list destination members: {e}"));
                return;
            }
        };

    for member in members {
        let Some(destination_uid) = ctx.maps.resolve(EntityKind::User, member.id) else {
            result.warn(format!(
                "member {} was not migrated; binding skipped",
                member.username
            ));
            continue;
        };

        match existing.get(&destination_uid) {
            None => {
                let payload = NewMember {
                    user_id: destination_uid,
                    access_level: member.access_level.as_u64(),
                    expires_at: member.expires_at.clone(),
                };
                if let Err(e) =
                    call_remote(|| ctx.destination.post(&destination_endpoint, &payload)).await
                {
                    result.warn(format!("failed to add member {}: {e}", member.username));
                }
            }
            Some(current) if *current < member.access_level => {
                debug!(
                    member = %member.username,
                    from = current.as_u64(),
                    to = member.access_level.as_u64(),
                    "upgrading member access level"
                );
                let endpoint = format!("{destination_endpoint}/{destination_uid}");
                let payload = json!({ "access_level": member.access_level.as_u64() });
                if let Err(e) = call_remote(|| ctx.destination.put(&endpoint, &payload)).await {
                    result.warn(format!("failed to upgrade member {}: {e}", member.username));
                }
            }
            Some(current) if *current > member.access_level => {
                result.warn(format!(
                    "member {} already has a higher access level on destination",
                    member.username
                ));
            }
            Some(_) => {}
        }
    }
}
