//! Repository layouts.
//!
//! A layout maps the identity of an artifact (its coordinates) to a relative
//! path inside a repository and back. Every layout is a [`LayoutProvider`];
//! the [`LayoutRegistry`] is an explicit table built at startup.

pub mod maven;
pub mod npm;
pub mod nuget;
pub mod p2;
pub mod pypi;
pub mod raw;
pub mod rpm;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::checksum::DigestAlgorithm;

/// Layout-specific artifact identity.
///
/// Equality and hashing follow the identity fields of each variant, never the
/// rendered path. For every valid value `c`, `parse(c.to_path()) == c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum ArtifactCoordinates {
    Maven(maven::MavenCoordinates),
    Npm(npm::NpmCoordinates),
    Pypi(pypi::PypiCoordinates),
    Nuget(nuget::NugetCoordinates),
    Rpm(rpm::RpmCoordinates),
    P2(p2::P2Coordinates),
    Raw(raw::RawCoordinates),
}

impl ArtifactCoordinates {
    /// Relative path of the artifact inside its repository.
    pub fn to_path(&self) -> String {
        match self {
            Self::Maven(c) => c.to_path(),
            Self::Npm(c) => c.to_path(),
            Self::Pypi(c) => c.to_path(),
            Self::Nuget(c) => c.to_path(),
            Self::Rpm(c) => c.to_path(),
            Self::P2(c) => c.to_path(),
            Self::Raw(c) => c.to_path(),
        }
    }

    pub fn layout_key(&self) -> &'static str {
        match self {
            Self::Maven(_) => maven::LAYOUT_KEY,
            Self::Npm(_) => npm::LAYOUT_KEY,
            Self::Pypi(_) => pypi::LAYOUT_KEY,
            Self::Nuget(_) => nuget::LAYOUT_KEY,
            Self::Rpm(_) => rpm::LAYOUT_KEY,
            Self::P2(_) => p2::LAYOUT_KEY,
            Self::Raw(_) => raw::LAYOUT_KEY,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Maven(c) => Some(&c.version),
            Self::Npm(c) => Some(&c.version),
            Self::Pypi(c) => Some(&c.version),
            Self::Nuget(c) => Some(&c.version),
            Self::Rpm(c) => Some(&c.version),
            Self::P2(c) => Some(&c.version),
            Self::Raw(_) => None,
        }
    }

    /// Only Maven distinguishes snapshot versions.
    pub fn is_snapshot(&self) -> bool {
        match self {
            Self::Maven(c) => c.is_snapshot(),
            _ => false,
        }
    }
}

/// A derived document aggregating several artifacts (e.g. `maven-metadata.xml`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateMetadata {
    /// Relative path the document is written to.
    pub path: String,
    /// Rendered document.
    pub content: String,
    /// Content identity without volatile fields such as timestamps. Two
    /// documents with the same fingerprint describe the same state.
    pub fingerprint: String,
}

/// Directories that determine a set of aggregate documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetadataScope {
    /// Every artifact feeding the documents lives under this directory.
    pub artifact_dir: String,
    /// Every document derived from those artifacts lives under this directory.
    pub document_dir: String,
}

/// Layout capability set.
pub trait LayoutProvider: Send + Sync {
    /// Registry key of this layout.
    fn layout_key(&self) -> &'static str;

    /// Parse a relative path into coordinates.
    ///
    /// Fails with `AppError::InvalidPath` when the path does not address an
    /// artifact of this layout.
    fn parse(&self, path: &str) -> Result<ArtifactCoordinates>;

    /// Digests maintained as side files for every artifact of this layout.
    fn digest_algorithms(&self) -> &'static [DigestAlgorithm];

    /// Whether `path` is a derived metadata document rather than an artifact.
    fn is_metadata_file(&self, _path: &str) -> bool {
        false
    }

    /// Scope of the aggregate documents an artifact contributes to. `None`
    /// for layouts without aggregate documents.
    fn metadata_scope(&self, _coordinates: &ArtifactCoordinates) -> Option<MetadataScope> {
        None
    }

    /// Scope a metadata document belongs to, derived from its path alone so
    /// that documents left without artifacts can still be found.
    fn document_scope(&self, _path: &str) -> Option<MetadataScope> {
        None
    }

    /// Aggregate documents derived from the artifacts present on disk.
    fn aggregate_metadata(&self, _artifacts: &[ArtifactCoordinates]) -> Vec<AggregateMetadata> {
        Vec::new()
    }

    /// Fingerprint of an existing document, comparable with
    /// [`AggregateMetadata::fingerprint`]. `None` when it cannot be read.
    fn metadata_fingerprint(&self, _content: &[u8]) -> Option<String> {
        None
    }
}

/// Layout key → provider table.
pub struct LayoutRegistry {
    providers: HashMap<&'static str, Arc<dyn LayoutProvider>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry with every built-in layout.
    pub fn with_core_layouts() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(maven::MavenLayout::new()));
        registry.register(Arc::new(npm::NpmLayout::new()));
        registry.register(Arc::new(pypi::PypiLayout::new()));
        registry.register(Arc::new(nuget::NugetLayout::new()));
        registry.register(Arc::new(rpm::RpmLayout::new()));
        registry.register(Arc::new(p2::P2Layout::new()));
        registry.register(Arc::new(raw::RawLayout::new()));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn LayoutProvider>) {
        self.providers.insert(provider.layout_key(), provider);
    }

    pub fn get(&self, layout_key: &str) -> Option<Arc<dyn LayoutProvider>> {
        self.providers.get(layout_key).cloned()
    }

    /// Provider for a configured layout key; unknown keys are configuration errors.
    pub fn require(&self, layout_key: &str) -> Result<Arc<dyn LayoutProvider>> {
        self.get(layout_key)
            .ok_or_else(|| AppError::Config(format!("Unknown repository layout: {}", layout_key)))
    }

    /// List registered layout keys, sorted.
    pub fn layout_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = self.providers.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::with_core_layouts()
    }
}

/// Last segment of a relative path.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Build the error returned for paths a layout cannot parse.
pub(crate) fn invalid(layout: &str, path: &str, reason: &str) -> AppError {
    AppError::InvalidPath(format!("Invalid {} path '{}': {}", layout, path, reason))
}
