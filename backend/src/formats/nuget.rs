//! NuGet layout.
//!
//! Follows the v3 flat container convention: packages are stored at
//! `<id>/<version>/<id>.<version>.nupkg` with lowercase ids and versions, and
//! `<id>/index.json` lists the available versions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formats::maven::compare_versions;
use crate::formats::{
    invalid, AggregateMetadata, ArtifactCoordinates, LayoutProvider, MetadataScope,
};
use crate::models::checksum::DigestAlgorithm;

pub const LAYOUT_KEY: &str = "nuget";

const DIGESTS: &[DigestAlgorithm] = &[DigestAlgorithm::Sha512];

const INDEX_FILE: &str = "index.json";

/// NuGet layout provider
pub struct NugetLayout;

impl NugetLayout {
    pub fn new() -> Self {
        Self
    }

    /// Parse a package path: <id>/<version>/<id>.<version>.nupkg
    pub fn parse_path(path: &str) -> Result<NugetCoordinates> {
        let parts: Vec<&str> = path.split('/').collect();
        let [id, version, filename] = parts.as_slice() else {
            return Err(invalid(
                LAYOUT_KEY,
                path,
                "expected <id>/<version>/<id>.<version>.nupkg",
            ));
        };

        if id.is_empty() || version.is_empty() {
            return Err(invalid(LAYOUT_KEY, path, "empty id or version"));
        }
        if *id != Self::normalize_id(id) || *version != Self::normalize_id(version) {
            return Err(invalid(LAYOUT_KEY, path, "id and version must be lowercase"));
        }

        let coords = NugetCoordinates {
            id: id.to_string(),
            version: version.to_string(),
        };
        if *filename != coords.filename() {
            return Err(invalid(LAYOUT_KEY, path, "filename does not match id and version"));
        }

        Ok(coords)
    }

    /// Normalize package ID (lowercase)
    pub fn normalize_id(id: &str) -> String {
        id.to_lowercase()
    }
}

impl Default for NugetLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProvider for NugetLayout {
    fn layout_key(&self) -> &'static str {
        LAYOUT_KEY
    }

    fn parse(&self, path: &str) -> Result<ArtifactCoordinates> {
        Self::parse_path(path).map(ArtifactCoordinates::Nuget)
    }

    fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        DIGESTS
    }

    fn is_metadata_file(&self, path: &str) -> bool {
        matches!(path.split_once('/'), Some((_, INDEX_FILE)))
    }

    fn metadata_scope(&self, coordinates: &ArtifactCoordinates) -> Option<MetadataScope> {
        match coordinates {
            ArtifactCoordinates::Nuget(c) => Some(MetadataScope {
                artifact_dir: c.id.clone(),
                document_dir: c.id.clone(),
            }),
            _ => None,
        }
    }

    fn document_scope(&self, path: &str) -> Option<MetadataScope> {
        match path.split_once('/') {
            Some((id, INDEX_FILE)) if !id.is_empty() => Some(MetadataScope {
                artifact_dir: id.to_string(),
                document_dir: id.to_string(),
            }),
            _ => None,
        }
    }

    fn aggregate_metadata(&self, artifacts: &[ArtifactCoordinates]) -> Vec<AggregateMetadata> {
        let mut packages: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for artifact in artifacts {
            if let ArtifactCoordinates::Nuget(coords) = artifact {
                packages
                    .entry(coords.id.as_str())
                    .or_default()
                    .insert(coords.version.as_str());
            }
        }

        packages
            .into_iter()
            .filter_map(|(id, versions)| {
                let mut versions: Vec<String> = versions.into_iter().map(str::to_string).collect();
                versions.sort_by(|a, b| compare_versions(a, b));
                let index = FlatContainerIndex { versions };
                let content = serde_json::to_string_pretty(&index).ok()?;
                Some(AggregateMetadata {
                    path: format!("{}/{}", id, INDEX_FILE),
                    content,
                    fingerprint: index.versions.join(","),
                })
            })
            .collect()
    }

    fn metadata_fingerprint(&self, content: &[u8]) -> Option<String> {
        let index: FlatContainerIndex = serde_json::from_slice(content).ok()?;
        Some(index.versions.join(","))
    }
}

/// Flat container version listing (`<id>/index.json`).
#[derive(Debug, Serialize, Deserialize)]
struct FlatContainerIndex {
    versions: Vec<String>,
}

/// NuGet package coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NugetCoordinates {
    /// Lowercased package id.
    pub id: String,
    /// Lowercased version.
    pub version: String,
}

impl NugetCoordinates {
    pub fn filename(&self) -> String {
        format!("{}.{}.nupkg", self.id, self.version)
    }

    pub fn to_path(&self) -> String {
        format!("{}/{}/{}", self.id, self.version, self.filename())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id() {
        assert_eq!(NugetLayout::normalize_id("Newtonsoft.Json"), "newtonsoft.json");
        assert_eq!(NugetLayout::normalize_id(""), "");
    }

    #[test]
    fn test_parse_package_path() {
        let coords = NugetLayout::parse_path("serilog/3.1.1/serilog.3.1.1.nupkg").unwrap();
        assert_eq!(coords.id, "serilog");
        assert_eq!(coords.version, "3.1.1");
    }

    #[test]
    fn test_parse_prerelease() {
        let path = "my.package/1.0.0-beta.2/my.package.1.0.0-beta.2.nupkg";
        let coords = NugetLayout::parse_path(path).unwrap();
        assert_eq!(coords.version, "1.0.0-beta.2");
        assert_eq!(coords.to_path(), path);
    }

    #[test]
    fn test_rejects_invalid_paths() {
        assert!(NugetLayout::parse_path("Serilog/3.1.1/Serilog.3.1.1.nupkg").is_err());
        assert!(NugetLayout::parse_path("serilog/3.1.1/serilog.3.1.2.nupkg").is_err());
        assert!(NugetLayout::parse_path("serilog/serilog.3.1.1.nupkg").is_err());
        assert!(NugetLayout::parse_path("serilog/index.json").is_err());
    }

    #[test]
    fn test_version_index() {
        let layout = NugetLayout::new();
        let artifacts: Vec<ArtifactCoordinates> = [
            "serilog/3.10.0/serilog.3.10.0.nupkg",
            "serilog/3.9.0/serilog.3.9.0.nupkg",
        ]
        .iter()
        .map(|p| layout.parse(p).unwrap())
        .collect();

        let docs = layout.aggregate_metadata(&artifacts);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "serilog/index.json");
        assert!(layout.is_metadata_file(&docs[0].path));
        assert_eq!(docs[0].fingerprint, "3.9.0,3.10.0");
        assert_eq!(
            layout.metadata_fingerprint(docs[0].content.as_bytes()),
            Some(docs[0].fingerprint.clone())
        );
    }
}
