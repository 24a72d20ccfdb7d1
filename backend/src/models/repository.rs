//! Repository model.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Fully qualified repository identity: `storage_id:repository_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RepositoryKey {
    pub storage_id: String,
    pub repository_id: String,
}

impl RepositoryKey {
    pub fn new(storage_id: impl Into<String>, repository_id: impl Into<String>) -> Self {
        Self {
            storage_id: storage_id.into(),
            repository_id: repository_id.into(),
        }
    }

    /// Parse a member reference. A bare `repo` is resolved inside
    /// `default_storage`; `storage:repo` names a repository in another storage.
    pub fn parse_reference(reference: &str, default_storage: &str) -> Result<Self, AppError> {
        let reference = reference.trim();
        let (storage, repository) = match reference.split_once(':') {
            Some((storage, repository)) => (storage, repository),
            None => (default_storage, reference),
        };

        if storage.is_empty() || repository.is_empty() || repository.contains(':') {
            return Err(AppError::Config(format!(
                "Invalid repository reference: '{}'",
                reference
            )));
        }

        Ok(Self::new(storage, repository))
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage_id, self.repository_id)
    }
}

/// Repository type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// Stores artifacts directly; the authoritative copy.
    Hosted,
    /// Caches artifacts fetched on demand from a remote repository.
    Proxy,
    /// Virtual repository aggregating other repositories in configured order.
    Group,
}

impl RepositoryType {
    /// Check if this repository type keeps files on disk (hosted or proxy cache)
    pub fn has_storage(&self) -> bool {
        matches!(self, RepositoryType::Hosted | RepositoryType::Proxy)
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosted => write!(f, "hosted"),
            Self::Proxy => write!(f, "proxy"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Version policy of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryPolicy {
    Release,
    Snapshot,
    #[default]
    Mixed,
}

impl RepositoryPolicy {
    /// Whether an artifact with the given snapshot flag may be stored.
    pub fn accepts(&self, is_snapshot: bool) -> bool {
        match self {
            Self::Release => !is_snapshot,
            Self::Snapshot => is_snapshot,
            Self::Mixed => true,
        }
    }
}

impl FromStr for RepositoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "release" => Ok(Self::Release),
            "snapshot" => Ok(Self::Snapshot),
            "mixed" => Ok(Self::Mixed),
            _ => Err(format!("Unknown repository policy: {}", s)),
        }
    }
}

/// Remote endpoint of a proxy repository.
#[derive(Clone, Deserialize)]
pub struct RemoteRepository {
    /// Base URL; artifact paths are appended to it.
    pub url: String,
    /// Fetch timeout in seconds; falls back to the process-wide default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

redacted_debug!(RemoteRepository {
    show url,
    show timeout_secs,
    show username,
    redact_option password,
});

impl RemoteRepository {
    /// Effective fetch timeout for this remote.
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}

/// Immutable description of one repository, as held by a configuration snapshot.
#[derive(Debug, Clone)]
pub struct RepositoryDescriptor {
    pub key: RepositoryKey,
    pub repo_type: RepositoryType,
    /// Layout key into the layout registry (e.g. "maven", "npm").
    pub layout: String,
    /// Directory holding the repository contents.
    pub base_dir: PathBuf,
    pub policy: RepositoryPolicy,
    /// Present for proxy repositories only.
    pub remote: Option<RemoteRepository>,
    /// Ordered members; only meaningful for group repositories.
    pub members: Vec<RepositoryKey>,
    /// When false, every delete is a permanent delete.
    pub trash_enabled: bool,
}

impl RepositoryDescriptor {
    pub fn storage_id(&self) -> &str {
        &self.key.storage_id
    }

    pub fn repository_id(&self) -> &str {
        &self.key.repository_id
    }

    pub fn is_group(&self) -> bool {
        self.repo_type == RepositoryType::Group
    }
}
