//! Configuration loading: YAML file plus environment overrides.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context};

use gitferry_types::{Config, InstanceConfig};

/// Environment variables recognized as overrides.
const ENV_SOURCE_URL: &str = "GITFERRY_SOURCE_URL";
const ENV_SOURCE_TOKEN: &str = "GITFERRY_SOURCE_TOKEN";
const ENV_DESTINATION_URL: &str = "GITFERRY_DESTINATION_URL";
const ENV_DESTINATION_TOKEN: &str = "GITFERRY_DESTINATION_TOKEN";
const ENV_DRY_RUN: &str = "GITFERRY_DRY_RUN";

/// Load configuration from `path`, overlaying environment variables.
///
/// The file may be absent entirely when both instances are fully described
/// by the environment.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let env: HashMap<String, String> = std::env::vars().collect();

    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
    } else if env.contains_key(ENV_SOURCE_URL) && env.contains_key(ENV_DESTINATION_URL) {
        Config {
            source: InstanceConfig::new("", ""),
            destination: InstanceConfig::new("", ""),
            migration: Default::default(),
            git: Default::default(),
        }
    } else {
        bail!(
            "configuration file {} not found (and no {ENV_SOURCE_URL}/{ENV_DESTINATION_URL} set); \
             run `gitferry init-config` to create a template",
            path.display()
        );
    };

    apply_env_overrides(&mut config, &env);
    config.validate()?;
    Ok(config)
}

/// Overlay recognized environment variables onto a parsed configuration.
fn apply_env_overrides(config: &mut Config, env: &HashMap<String, String>) {
    if let Some(url) = env.get(ENV_SOURCE_URL) {
        config.source.url = url.clone();
    }
    if let Some(token) = env.get(ENV_SOURCE_TOKEN) {
        config.source.token = token.clone();
    }
    if let Some(url) = env.get(ENV_DESTINATION_URL) {
        config.destination.url = url.clone();
    }
    if let Some(token) = env.get(ENV_DESTINATION_TOKEN) {
        config.destination.token = token.clone();
    }
    if let Some(flag) = env.get(ENV_DRY_RUN) {
        config.migration.dry_run = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
    }
}

/// Configuration template written by `gitferry init-config`.
pub const TEMPLATE: &str = r#"# GitFerry configuration
source:
  url: https://gitlab-source.example.com
  token: your-source-personal-access-token
  timeout_secs: 30
  requests_per_second: 10.0

destination:
  url: https://gitlab-dest.example.com
  token: your-destination-personal-access-token
  timeout_secs: 30
  requests_per_second: 10.0

migration:
  users: true
  groups: true
  projects: true
  repositories: true
  dry_run: false
  user_concurrency: 10
  group_concurrency: 5
  project_concurrency: 5
  repository_concurrency: 2
  # Extra collision phrasings, evaluated before the built-in set:
  # conflict_patterns:
  #   - pattern: "name clash"
  #     class: path
  conflict_patterns: []

git:
  # temp_dir: /var/tmp/gitferry
  timeout_secs: 3600
  lfs_enabled: true
"#;
