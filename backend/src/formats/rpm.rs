//! RPM layout.
//!
//! Packages may live in any directory of the repository and are identified by
//! their `<name>-<version>-<release>.<arch>.rpm` filename. Everything under
//! `repodata/` is repository metadata.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formats::{file_name, invalid, ArtifactCoordinates, LayoutProvider};
use crate::models::checksum::DigestAlgorithm;

pub const LAYOUT_KEY: &str = "rpm";

const DIGESTS: &[DigestAlgorithm] = &[DigestAlgorithm::Sha256];

/// RPM layout provider
pub struct RpmLayout;

impl RpmLayout {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_path(path: &str) -> Result<RpmCoordinates> {
        if path.split('/').any(|segment| segment == "repodata") {
            return Err(invalid(LAYOUT_KEY, path, "repodata is not a package"));
        }

        let filename = file_name(path);
        let directory = path
            .strip_suffix(filename)
            .and_then(|d| d.strip_suffix('/'))
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let mut coords = Self::parse_rpm_filename(filename)
            .ok_or_else(|| invalid(LAYOUT_KEY, path, "expected <name>-<version>-<release>.<arch>.rpm"))?;
        coords.directory = directory;
        Ok(coords)
    }

    /// Parse RPM filename
    /// Format: <name>-<version>-<release>.<arch>.rpm
    pub fn parse_rpm_filename(filename: &str) -> Option<RpmCoordinates> {
        let name = filename.strip_suffix(".rpm")?;

        // Split off architecture
        let (name_ver_rel, arch) = name.rsplit_once('.')?;

        // Split name-version-release on the last two hyphens
        let parts: Vec<&str> = name_ver_rel.rsplitn(3, '-').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) || arch.is_empty() {
            return None;
        }

        Some(RpmCoordinates {
            directory: None,
            name: parts[2].to_string(),
            version: parts[1].to_string(),
            release: parts[0].to_string(),
            arch: arch.to_string(),
        })
    }
}

impl Default for RpmLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProvider for RpmLayout {
    fn layout_key(&self) -> &'static str {
        LAYOUT_KEY
    }

    fn parse(&self, path: &str) -> Result<ArtifactCoordinates> {
        Self::parse_path(path).map(ArtifactCoordinates::Rpm)
    }

    fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        DIGESTS
    }

    fn is_metadata_file(&self, path: &str) -> bool {
        path.split('/').any(|segment| segment == "repodata")
    }
}

/// RPM package coordinates (NVRA).
///
/// The directory only places the package inside the repository; two packages
/// with the same NVRA are the same package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpmCoordinates {
    pub directory: Option<String>,
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl RpmCoordinates {
    pub fn filename(&self) -> String {
        format!(
            "{}-{}-{}.{}.rpm",
            self.name, self.version, self.release, self.arch
        )
    }

    pub fn to_path(&self) -> String {
        match &self.directory {
            Some(dir) => format!("{}/{}", dir, self.filename()),
            None => self.filename(),
        }
    }
}

impl PartialEq for RpmCoordinates {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.release == other.release
            && self.arch == other.arch
    }
}

impl Eq for RpmCoordinates {}

impl Hash for RpmCoordinates {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.release.hash(state);
        self.arch.hash(state);
    }
}
