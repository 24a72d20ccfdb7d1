//! Application configuration.
//!
//! Process settings come from environment variables ([`Config`]); the
//! repository layout of the depot comes from a JSON document
//! ([`DepotConfiguration`]) that is validated before it becomes a snapshot.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::formats::LayoutRegistry;
use crate::models::job::ScheduledJob;
use crate::models::repository::{
    RemoteRepository, RepositoryDescriptor, RepositoryKey, RepositoryPolicy, RepositoryType,
};
use crate::models::routing::{RoutingMatchMode, RoutingRules, RoutingRulesConfig};
use crate::services::access_policy::AccessSettings;
use crate::services::configuration_service::ConfigurationSnapshot;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log output format: "text" or "json"
    pub log_format: String,

    /// Path to the JSON repository configuration document
    pub depot_config_path: Option<PathBuf>,

    /// Parent directory for storages that do not name their own base directory
    pub storage_root: PathBuf,

    /// Remote fetch timeout for proxies that do not configure one
    pub proxy_timeout_secs: u64,

    /// Routing pattern semantics for rule sets that do not choose one
    pub routing_match_mode: RoutingMatchMode,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            depot_config_path: env::var("DEPOT_CONFIG").ok().map(PathBuf::from),
            storage_root: env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "/var/lib/artifact-depot/storages".into())
                .into(),
            proxy_timeout_secs: env::var("PROXY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            routing_match_mode: match env::var("ROUTING_MATCH_MODE") {
                Ok(value) => value.parse().map_err(AppError::Config)?,
                Err(_) => RoutingMatchMode::default(),
            },
        })
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".into(),
            log_format: "text".into(),
            depot_config_path: None,
            storage_root: PathBuf::from("/var/lib/artifact-depot/storages"),
            proxy_timeout_secs: 60,
            routing_match_mode: RoutingMatchMode::Full,
        }
    }
}

/// Repository configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepotConfiguration {
    #[serde(default)]
    pub storages: Vec<StorageConfig>,
    #[serde(default)]
    pub jobs: Vec<ScheduledJob>,
    #[serde(default)]
    pub access: AccessSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub id: String,
    /// Defaults to `<STORAGE_ROOT>/<id>`.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub repo_type: RepositoryType,
    pub layout: String,
    /// Defaults to `<storage base>/<id>`.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub policy: RepositoryPolicy,
    #[serde(default)]
    pub remote: Option<RemoteRepository>,
    /// Member references, `repo` or `storage:repo`, in resolution order.
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default = "default_trash_enabled")]
    pub trash_enabled: bool,
    #[serde(default)]
    pub routing: Option<RoutingRulesConfig>,
}

fn default_trash_enabled() -> bool {
    true
}

impl DepotConfiguration {
    /// Read the configuration document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::Config(format!("Invalid repository configuration: {}", e)))
    }

    /// Build and validate the repository snapshot described by this document.
    pub fn to_snapshot(
        &self,
        config: &Config,
        layouts: &LayoutRegistry,
    ) -> Result<ConfigurationSnapshot> {
        let mut seen_storages = HashSet::new();
        let mut descriptors = Vec::new();
        let mut routing = Vec::new();

        for storage in &self.storages {
            if storage.id.is_empty() || storage.id.contains(':') {
                return Err(AppError::Config(format!("Invalid storage id: '{}'", storage.id)));
            }
            if !seen_storages.insert(storage.id.as_str()) {
                return Err(AppError::Config(format!("Duplicate storage: {}", storage.id)));
            }
            let storage_dir = storage
                .base_dir
                .clone()
                .unwrap_or_else(|| config.storage_root.join(&storage.id));

            let mut seen_repositories = HashSet::new();
            for repo in &storage.repositories {
                if !seen_repositories.insert(repo.id.as_str()) {
                    return Err(AppError::Config(format!(
                        "Duplicate repository: {}:{}",
                        storage.id, repo.id
                    )));
                }
                let descriptor = repo.to_descriptor(&storage.id, &storage_dir, layouts)?;

                if let Some(rules) = &repo.routing {
                    if !descriptor.is_group() {
                        return Err(AppError::Config(format!(
                            "Routing rules are only allowed on groups: {}",
                            descriptor.key
                        )));
                    }
                    let compiled =
                        RoutingRules::compile(&descriptor.key, rules, config.routing_match_mode)?;
                    routing.push((descriptor.key.clone(), compiled));
                }
                descriptors.push(descriptor);
            }
        }

        let snapshot = ConfigurationSnapshot::new(descriptors, routing);
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl RepositoryConfig {
    fn to_descriptor(
        &self,
        storage_id: &str,
        storage_dir: &Path,
        layouts: &LayoutRegistry,
    ) -> Result<RepositoryDescriptor> {
        let key = RepositoryKey::parse_reference(&self.id, storage_id)?;
        if key.storage_id != storage_id {
            return Err(AppError::Config(format!("Invalid repository id: '{}'", self.id)));
        }
        layouts.require(&self.layout)?;

        let remote = match (self.repo_type, &self.remote) {
            (RepositoryType::Proxy, Some(remote)) => {
                if !(remote.url.starts_with("http://") || remote.url.starts_with("https://")) {
                    return Err(AppError::Config(format!(
                        "Proxy {} has an invalid remote URL: {}",
                        key, remote.url
                    )));
                }
                Some(remote.clone())
            }
            (RepositoryType::Proxy, None) => {
                return Err(AppError::Config(format!("Proxy {} has no remote", key)));
            }
            (_, Some(_)) => {
                return Err(AppError::Config(format!(
                    "Only proxy repositories may configure a remote: {}",
                    key
                )));
            }
            (_, None) => None,
        };

        let members = self
            .members
            .iter()
            .map(|m| RepositoryKey::parse_reference(m, storage_id))
            .collect::<Result<Vec<_>>>()?;

        Ok(RepositoryDescriptor {
            base_dir: self
                .base_dir
                .clone()
                .unwrap_or_else(|| storage_dir.join(&self.id)),
            key,
            repo_type: self.repo_type,
            layout: self.layout.clone(),
            policy: self.policy,
            remote,
            members,
            trash_enabled: self.trash_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            storage_root: PathBuf::from("/srv/depot"),
            ..Config::default()
        }
    }

    const DOCUMENT: &str = r#"{
        "storages": [{
            "id": "storage0",
            "repositories": [
                {"id": "releases", "type": "hosted", "layout": "maven", "policy": "release"},
                {"id": "central", "type": "proxy", "layout": "maven",
                 "remote": {"url": "https://repo.maven.apache.org/maven2", "timeout_secs": 5}},
                {"id": "public", "type": "group", "layout": "maven",
                 "members": ["releases", "central", "storage1:thirdparty"],
                 "routing": {"denied": [{"pattern": "com/internal/.*", "repositories": ["central"]}]}}
            ]
        }, {
            "id": "storage1",
            "base_dir": "/mnt/other",
            "repositories": [
                {"id": "thirdparty", "type": "hosted", "layout": "maven", "trash_enabled": false}
            ]
        }],
        "jobs": [{"name": "purge", "cron": "0 3 * * *", "task": "purge_trash"}]
    }"#;

    #[test]
    fn test_document_to_snapshot() {
        let document = DepotConfiguration::from_json(DOCUMENT).unwrap();
        let snapshot = document
            .to_snapshot(&config(), &LayoutRegistry::with_core_layouts())
            .unwrap();

        let releases = snapshot.repository("storage0", "releases").unwrap();
        assert_eq!(releases.base_dir, PathBuf::from("/srv/depot/storage0/releases"));
        assert_eq!(releases.policy, RepositoryPolicy::Release);
        assert!(releases.trash_enabled);

        let thirdparty = snapshot.repository("storage1", "thirdparty").unwrap();
        assert_eq!(thirdparty.base_dir, PathBuf::from("/mnt/other/thirdparty"));
        assert!(!thirdparty.trash_enabled);

        let public = snapshot.repository("storage0", "public").unwrap();
        assert_eq!(public.members[2], RepositoryKey::new("storage1", "thirdparty"));
        let rules = snapshot.routing_rules(&public.key).unwrap();
        assert_eq!(rules.denied.len(), 1);
        assert_eq!(document.jobs.len(), 1);
    }

    #[test]
    fn test_proxy_without_remote_rejected() {
        let document = DepotConfiguration::from_json(
            r#"{"storages": [{"id": "s", "repositories": [
                {"id": "central", "type": "proxy", "layout": "maven"}
            ]}]}"#,
        )
        .unwrap();
        let err = document
            .to_snapshot(&config(), &LayoutRegistry::with_core_layouts())
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let document = DepotConfiguration::from_json(
            r#"{"storages": [{"id": "s", "repositories": [
                {"id": "r", "type": "hosted", "layout": "docker"}
            ]}]}"#,
        )
        .unwrap();
        assert!(document
            .to_snapshot(&config(), &LayoutRegistry::with_core_layouts())
            .is_err());
    }

    #[test]
    fn test_cyclic_groups_rejected() {
        let document = DepotConfiguration::from_json(
            r#"{"storages": [{"id": "s", "repositories": [
                {"id": "g1", "type": "group", "layout": "raw", "members": ["g2"]},
                {"id": "g2", "type": "group", "layout": "raw", "members": ["g1"]}
            ]}]}"#,
        )
        .unwrap();
        let err = document
            .to_snapshot(&config(), &LayoutRegistry::with_core_layouts())
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_bad_routing_pattern_rejected() {
        let document = DepotConfiguration::from_json(
            r#"{"storages": [{"id": "s", "repositories": [
                {"id": "r", "type": "hosted", "layout": "raw"},
                {"id": "g", "type": "group", "layout": "raw", "members": ["r"],
                 "routing": {"accepted": [{"pattern": "([", "repositories": ["r"]}]}}
            ]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            document.to_snapshot(&config(), &LayoutRegistry::with_core_layouts()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            DepotConfiguration::from_json("{\"storages\": 3}"),
            Err(AppError::Config(_))
        ));
    }
}
