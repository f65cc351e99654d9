//! Destination-side collision detection and path disambiguation.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use gitferry_client::ClientError;
use gitferry_types::{ConflictClass, ConflictPattern};

/// Classifies destination error text and computes disambiguated paths.
///
/// Detection is an ordered list of `(substring, class)` rules evaluated
/// top to bottom, case-insensitively. Operator-supplied patterns run
/// before the built-in set so deployments can adapt to their instance's
/// phrasing without a rebuild.
pub struct ConflictResolver {
    rules: Vec<(String, ConflictClass)>,
}

/// Known GitLab collision phrasings. Storage rules come first: a
/// storage-level message may also mention the path, and renaming cannot
/// fix a storage-level inconsistency.
const BUILTIN_RULES: &[(&str, ConflictClass)] = &[
    (
        "there is already a repository with that name on disk",
        ConflictClass::Storage,
    ),
    ("repository with that name on disk", ConflictClass::Storage),
    ("repository already exists on disk", ConflictClass::Storage),
    ("uncaught throw :abort", ConflictClass::Storage),
    ("disk conflict", ConflictClass::Storage),
    ("repository path conflict", ConflictClass::Storage),
    ("has already been taken", ConflictClass::Path),
    ("already been taken", ConflictClass::Path),
    ("path is already in use", ConflictClass::Path),
    ("name already exists", ConflictClass::Path),
];

impl ConflictResolver {
    /// Resolver with only the built-in pattern set.
    pub fn new() -> Self {
        Self::with_patterns(&[])
    }

    /// Resolver with operator-supplied patterns evaluated first.
    pub fn with_patterns(extra: &[ConflictPattern]) -> Self {
        let mut rules: Vec<(String, ConflictClass)> = extra
            .iter()
            .map(|p| (p.pattern.to_lowercase(), p.class))
            .collect();
        rules.extend(
            BUILTIN_RULES
                .iter()
                .map(|(pattern, class)| (pattern.to_string(), *class)),
        );
        Self { rules }
    }

    /// Classify raw error text, if it matches a known collision phrasing.
    pub fn classify(&self, message: &str) -> Option<ConflictClass> {
        if message.is_empty() {
            return None;
        }
        let lower = message.to_lowercase();
        self.rules
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, class)| *class)
    }

    /// Classify a client error, if it is collision-shaped at all.
    pub fn classify_error(&self, error: &ClientError) -> Option<ConflictClass> {
        match error {
            ClientError::Conflict { message } | ClientError::Api { message, .. } => {
                self.classify(message)
            }
            _ => None,
        }
    }

    /// Produce a disambiguated candidate path: the original with a short
    /// unique suffix derived from a timestamp and a random token.
    pub fn disambiguate(&self, path: &str) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(4)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        let candidate = format!("{path}-{}-{token}", Utc::now().timestamp());
        debug!(path, candidate, "disambiguated conflicting path");
        candidate
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_path_collisions() {
        let resolver = ConflictResolver::new();
        assert_eq!(
            resolver.classify("Path has already been taken"),
            Some(ConflictClass::Path)
        );
        assert_eq!(
            resolver.classify("NAME ALREADY EXISTS"),
            Some(ConflictClass::Path)
        );
    }

    #[test]
    fn classifies_storage_collisions() {
        let resolver = ConflictResolver::new();
        assert_eq!(
            resolver.classify("There is already a repository with that name on disk"),
            Some(ConflictClass::Storage)
        );
        assert_eq!(
            resolver.classify("uncaught throw :abort"),
            Some(ConflictClass::Storage)
        );
    }

    #[test]
    fn unknown_text_is_not_a_collision() {
        let resolver = ConflictResolver::new();
        assert_eq!(resolver.classify("email is invalid"), None);
        assert_eq!(resolver.classify(""), None);
    }

    #[test]
    fn operator_patterns_take_precedence() {
        let resolver = ConflictResolver::with_patterns(&[ConflictPattern {
            pattern: "has already been taken".to_string(),
            class: ConflictClass::Storage,
        }]);
        assert_eq!(
            resolver.classify("path has already been taken"),
            Some(ConflictClass::Storage)
        );
    }

    #[test]
    fn classify_error_reads_conflict_and_api_variants() {
        let resolver = ConflictResolver::new();
        let conflict = ClientError::Conflict {
            message: "has already been taken".to_string(),
        };
        assert_eq!(resolver.classify_error(&conflict), Some(ConflictClass::Path));

        let api = ClientError::Api {
            status: 400,
            message: "disk conflict".to_string(),
        };
        assert_eq!(resolver.classify_error(&api), Some(ConflictClass::Storage));

        let not_found = ClientError::NotFound {
            endpoint: "/x".to_string(),
        };
        assert_eq!(resolver.classify_error(&not_found), None);
    }

    #[test]
    fn disambiguated_paths_are_distinct_and_prefixed() {
        let resolver = ConflictResolver::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            let candidate = resolver.disambiguate("devtools");
            assert!(candidate.starts_with("devtools-"));
            assert!(candidate.len() > "devtools-".len());
            assert!(seen.insert(candidate));
        }
    }
}
