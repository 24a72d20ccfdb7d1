//! npm layout.
//!
//! Tarballs live at `package/-/package-version.tgz` or
//! `@scope/package/-/package-version.tgz`. Any other path under a package is
//! registry metadata (the package document) and is not an artifact.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formats::{invalid, ArtifactCoordinates, LayoutProvider};
use crate::models::checksum::DigestAlgorithm;

pub const LAYOUT_KEY: &str = "npm";

const DIGESTS: &[DigestAlgorithm] = &[DigestAlgorithm::Sha1, DigestAlgorithm::Sha512];

const TARBALL_SUFFIX: &str = ".tgz";

/// npm layout provider
pub struct NpmLayout;

impl NpmLayout {
    pub fn new() -> Self {
        Self
    }

    /// Parse npm tarball path
    /// Formats: @scope/package/-/package-version.tgz
    ///          package/-/package-version.tgz
    pub fn parse_path(path: &str) -> Result<NpmCoordinates> {
        let parts: Vec<&str> = path.split('/').collect();

        let (scope, rest) = match parts.first() {
            Some(first) if first.starts_with('@') => {
                let scope = first.trim_start_matches('@');
                if scope.is_empty() {
                    return Err(invalid(LAYOUT_KEY, path, "empty scope"));
                }
                (Some(scope.to_string()), &parts[1..])
            }
            _ => (None, &parts[..]),
        };

        let [name, dash, filename] = rest else {
            return Err(invalid(LAYOUT_KEY, path, "expected package/-/package-version.tgz"));
        };
        if name.is_empty() || *dash != "-" {
            return Err(invalid(LAYOUT_KEY, path, "expected package/-/package-version.tgz"));
        }

        let version = Self::extract_version_from_filename(filename, name)
            .ok_or_else(|| invalid(LAYOUT_KEY, path, "tarball name does not match package"))?;

        Ok(NpmCoordinates {
            scope,
            name: name.to_string(),
            version,
        })
    }

    fn extract_version_from_filename(filename: &str, name: &str) -> Option<String> {
        // Filename format: name-version.tgz
        let version = filename
            .strip_prefix(name)?
            .strip_prefix('-')?
            .strip_suffix(TARBALL_SUFFIX)?;

        if version.is_empty() {
            return None;
        }
        Some(version.to_string())
    }
}

impl Default for NpmLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProvider for NpmLayout {
    fn layout_key(&self) -> &'static str {
        LAYOUT_KEY
    }

    fn parse(&self, path: &str) -> Result<ArtifactCoordinates> {
        Self::parse_path(path).map(ArtifactCoordinates::Npm)
    }

    fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        DIGESTS
    }

    fn is_metadata_file(&self, path: &str) -> bool {
        !path.contains("/-/")
    }
}

/// npm package coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NpmCoordinates {
    pub scope: Option<String>,
    pub name: String,
    pub version: String,
}

impl NpmCoordinates {
    /// Registry name, `@scope/name` for scoped packages.
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}/{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    pub fn to_path(&self) -> String {
        format!(
            "{}/-/{}-{}{}",
            self.full_name(),
            self.name,
            self.version,
            TARBALL_SUFFIX
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unscoped_tarball() {
        let coords = NpmLayout::parse_path("lodash/-/lodash-4.17.21.tgz").unwrap();
        assert_eq!(coords.scope, None);
        assert_eq!(coords.name, "lodash");
        assert_eq!(coords.version, "4.17.21");
        assert_eq!(coords.full_name(), "lodash");
    }

    #[test]
    fn test_parse_scoped_tarball() {
        let coords = NpmLayout::parse_path("@types/node/-/node-20.10.0.tgz").unwrap();
        assert_eq!(coords.scope.as_deref(), Some("types"));
        assert_eq!(coords.full_name(), "@types/node");
        assert_eq!(coords.version, "20.10.0");
        assert_eq!(coords.to_path(), "@types/node/-/node-20.10.0.tgz");
    }

    #[test]
    fn test_prerelease_version() {
        let coords = NpmLayout::parse_path("my-pkg/-/my-pkg-1.0.0-beta.1.tgz").unwrap();
        assert_eq!(coords.name, "my-pkg");
        assert_eq!(coords.version, "1.0.0-beta.1");
    }

    #[test]
    fn test_rejects_non_tarballs() {
        assert!(NpmLayout::parse_path("lodash").is_err());
        assert!(NpmLayout::parse_path("lodash/-/underscore-1.0.0.tgz").is_err());
        assert!(NpmLayout::parse_path("lodash/-/lodash-.tgz").is_err());
        assert!(NpmLayout::parse_path("@/x/-/x-1.0.0.tgz").is_err());
        assert!(NpmLayout::parse_path("a/b/-/b-1.0.0.tgz").is_err());
    }

    #[test]
    fn test_metadata_detection() {
        let layout = NpmLayout::new();
        assert!(layout.is_metadata_file("lodash"));
        assert!(layout.is_metadata_file("@types/node"));
        assert!(!layout.is_metadata_file("lodash/-/lodash-4.17.21.tgz"));
    }
}
