//! Entity models mirroring the GitLab v4 API JSON shapes.

use serde::{Deserialize, Serialize};

use crate::AccessLevel;

/// The owning container of a project: a group or a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Group(u64),
    User(u64),
}

impl Namespace {
    /// Source-side id of the owning entity.
    pub fn source_id(self) -> u64 {
        match self {
            Self::Group(id) | Self::User(id) => id,
        }
    }
}

/// Raw namespace reference as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceRef {
    pub id: u64,
    pub kind: String,
    pub path: String,
}

impl NamespaceRef {
    /// Interpret the raw reference as a typed namespace.
    ///
    /// GitLab reports `kind` as `"group"` or `"user"`; anything else is
    /// treated as a user namespace, matching the API's own fallback.
    pub fn to_namespace(&self) -> Namespace {
        if self.kind == "group" {
            Namespace::Group(self.id)
        } else {
            Namespace::User(self.id)
        }
    }
}

/// A GitLab user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub state: String,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub can_create_group: Option<bool>,
    #[serde(default)]
    pub can_create_project: Option<bool>,
    #[serde(default)]
    pub external: Option<bool>,
}

/// Payload for creating a user on the destination.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_create_group: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_create_project: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    /// New accounts get a random password and must reset it on first login.
    pub force_random_password: bool,
    pub reset_password: bool,
    pub skip_confirmation: bool,
}

impl NewUser {
    /// Build a creation payload from a source user.
    pub fn from_user(user: &User, email: &str) -> Self {
        Self {
            username: user.username.clone(),
            name: user.name.clone(),
            email: email.to_string(),
            bio: user.bio.clone(),
            location: user.location.clone(),
            organization: user.organization.clone(),
            can_create_group: user.can_create_group,
            can_create_project: user.can_create_project,
            external: user.external,
            force_random_password: true,
            reset_password: true,
            skip_confirmation: true,
        }
    }
}

/// A GitLab group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub full_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

fn default_visibility() -> String {
    "private".to_string()
}

/// Payload for creating a group on the destination.
#[derive(Debug, Clone, Serialize)]
pub struct NewGroup {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub visibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
}

impl NewGroup {
    pub fn from_group(group: &Group, parent_id: Option<u64>) -> Self {
        Self {
            name: group.name.clone(),
            path: group.path.clone(),
            description: group.description.clone(),
            visibility: group.visibility.clone(),
            parent_id,
        }
    }
}

/// A GitLab project (the metadata half; repository content is separate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default)]
    pub namespace: Option<NamespaceRef>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub http_url_to_repo: Option<String>,
    #[serde(default)]
    pub issues_enabled: Option<bool>,
    #[serde(default)]
    pub merge_requests_enabled: Option<bool>,
    #[serde(default)]
    pub wiki_enabled: Option<bool>,
    #[serde(default)]
    pub snippets_enabled: Option<bool>,
    #[serde(default)]
    pub lfs_enabled: Option<bool>,
    #[serde(default)]
    pub empty_repo: Option<bool>,
}

/// Payload for creating a project on the destination.
#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub visibility: String,
    pub issues_enabled: bool,
    pub merge_requests_enabled: bool,
    pub wiki_enabled: bool,
    pub snippets_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lfs_enabled: Option<bool>,
}

impl NewProject {
    pub fn from_project(project: &Project, namespace_id: Option<u64>) -> Self {
        Self {
            name: project.name.clone(),
            path: project.path.clone(),
            namespace_id,
            description: project.description.clone(),
            visibility: project.visibility.clone(),
            issues_enabled: project.issues_enabled.unwrap_or(true),
            merge_requests_enabled: project.merge_requests_enabled.unwrap_or(true),
            wiki_enabled: project.wiki_enabled.unwrap_or(true),
            snippets_enabled: project.snippets_enabled.unwrap_or(true),
            lfs_enabled: project.lfs_enabled,
        }
    }
}

/// Repository content descriptor, derived from a migrated project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub project_id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub http_url_to_repo: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub lfs_enabled: bool,
    #[serde(default)]
    pub empty_repo: bool,
}

impl Repository {
    /// Derive a repository descriptor from project metadata.
    pub fn from_project(project: &Project) -> Self {
        Self {
            project_id: project.id,
            name: project.name.clone(),
            path: project.path.clone(),
            http_url_to_repo: project.http_url_to_repo.clone(),
            default_branch: project.default_branch.clone(),
            lfs_enabled: project.lfs_enabled.unwrap_or(false),
            empty_repo: project.empty_repo.unwrap_or(false),
        }
    }
}

/// A group or project membership as reported by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub username: String,
    pub access_level: AccessLevel,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Payload for adding a member on the destination.
#[derive(Debug, Clone, Serialize)]
pub struct NewMember {
    pub user_id: u64,
    pub access_level: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_ref_to_namespace() {
        let group = NamespaceRef {
            id: 7,
            kind: "group".to_string(),
            path: "devs".to_string(),
        };
        assert_eq!(group.to_namespace(), Namespace::Group(7));

        let user = NamespaceRef {
            id: 3,
            kind: "user".to_string(),
            path: "alice".to_string(),
        };
        assert_eq!(user.to_namespace(), Namespace::User(3));
    }

    #[test]
    fn user_deserializes_from_api_shape() {
        let json = r#"{
            "id": 12,
            "username": "alice",
            "name": "Alice",
            "email": "alice@example.com",
            "state": "active",
            "web_url": "https://gitlab.example.com/alice"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, 12);
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert!(!user.bot);
    }

    #[test]
    fn member_access_level_from_raw_int() {
        let json = r#"{"id": 4, "username": "bob", "access_level": 40}"#;
        let member: Member = serde_json::from_str(json).unwrap();
        assert_eq!(member.access_level, AccessLevel::Maintainer);
    }

    #[test]
    fn new_project_defaults_feature_flags_on() {
        let project: Project = serde_json::from_str(
            r#"{"id": 1, "name": "app", "path": "app", "visibility": "internal"}"#,
        )
        .unwrap();
        let payload = NewProject::from_project(&project, Some(9));
        assert!(payload.issues_enabled);
        assert!(payload.wiki_enabled);
        assert_eq!(payload.namespace_id, Some(9));
    }

    #[test]
    fn repository_from_project_carries_clone_url() {
        let project: Project = serde_json::from_str(
            r#"{
                "id": 5,
                "name": "app",
                "path": "app",
                "http_url_to_repo": "https://gitlab.example.com/devs/app.git",
                "default_branch": "main",
                "lfs_enabled": true
            }"#,
        )
        .unwrap();
        let repo = Repository::from_project(&project);
        assert_eq!(repo.project_id, 5);
        assert!(repo.lfs_enabled);
        assert_eq!(repo.default_branch.as_deref(), Some("main"));
    }
}
