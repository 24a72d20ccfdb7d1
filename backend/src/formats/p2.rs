use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formats::{invalid, ArtifactCoordinates, LayoutProvider};
use crate::models::checksum::DigestAlgorithm;

pub const LAYOUT_KEY: &str = "p2";

const DIGESTS: &[DigestAlgorithm] = &[DigestAlgorithm::Md5, DigestAlgorithm::Sha1];

const METADATA_FILES: &[&str] = &[
    "content.xml",
    "content.jar",
    "artifacts.xml",
    "artifacts.jar",
    "compositeContent.xml",
    "compositeArtifacts.xml",
    "p2.index",
];

/// Kind of installable unit in a P2 (Eclipse) repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum P2Kind {
    Plugin,
    Feature,
}

impl P2Kind {
    fn directory(&self) -> &'static str {
        match self {
            Self::Plugin => "plugins",
            Self::Feature => "features",
        }
    }
}

/// P2 repository layout provider
pub struct P2Layout;

impl P2Layout {
    pub fn new() -> Self {
        Self
    }

    /// Parse a bundle path: plugins/<id>_<version>.jar or features/<id>_<version>.jar
    pub fn parse_path(path: &str) -> Result<P2Coordinates> {
        let (kind, filename) = if let Some(f) = path.strip_prefix("plugins/") {
            (P2Kind::Plugin, f)
        } else if let Some(f) = path.strip_prefix("features/") {
            (P2Kind::Feature, f)
        } else {
            return Err(invalid(LAYOUT_KEY, path, "expected plugins/ or features/"));
        };

        let (id, version) = filename
            .strip_suffix(".jar")
            .filter(|base| !base.contains('/'))
            .and_then(|base| base.rsplit_once('_'))
            .filter(|(id, version)| !id.is_empty() && !version.is_empty())
            .ok_or_else(|| invalid(LAYOUT_KEY, path, "expected <id>_<version>.jar"))?;

        Ok(P2Coordinates {
            kind,
            id: id.to_string(),
            version: version.to_string(),
        })
    }
}

impl Default for P2Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProvider for P2Layout {
    fn layout_key(&self) -> &'static str {
        LAYOUT_KEY
    }

    fn parse(&self, path: &str) -> Result<ArtifactCoordinates> {
        Self::parse_path(path).map(ArtifactCoordinates::P2)
    }

    fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        DIGESTS
    }

    fn is_metadata_file(&self, path: &str) -> bool {
        METADATA_FILES.contains(&path)
    }
}

/// P2 bundle coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct P2Coordinates {
    pub kind: P2Kind,
    pub id: String,
    pub version: String,
}

impl P2Coordinates {
    pub fn to_path(&self) -> String {
        format!("{}/{}_{}.jar", self.kind.directory(), self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_jar() {
        let coords = P2Layout::parse_path("plugins/org.eclipse.core_1.0.0.jar").unwrap();
        assert_eq!(coords.kind, P2Kind::Plugin);
        assert_eq!(coords.id, "org.eclipse.core");
        assert_eq!(coords.version, "1.0.0");
    }

    #[test]
    fn test_parse_feature_jar() {
        let path = "features/org.eclipse.platform_4.30.0.v20231201.jar";
        let coords = P2Layout::parse_path(path).unwrap();
        assert_eq!(coords.kind, P2Kind::Feature);
        assert_eq!(coords.version, "4.30.0.v20231201");
        assert_eq!(coords.to_path(), path);
    }

    #[test]
    fn test_parse_id_with_underscores() {
        let coords = P2Layout::parse_path("plugins/my_plugin_name_2.0.0.jar").unwrap();
        assert_eq!(coords.id, "my_plugin_name");
        assert_eq!(coords.version, "2.0.0");
    }

    #[test]
    fn test_invalid_paths() {
        assert!(P2Layout::parse_path("content.xml").is_err());
        assert!(P2Layout::parse_path("plugins/noversion.jar").is_err());
        assert!(P2Layout::parse_path("plugins/org.eclipse.core_1.0.0.zip").is_err());
        assert!(P2Layout::parse_path("plugins/nested/x_1.0.jar").is_err());
        assert!(P2Layout::parse_path("random/path.txt").is_err());
    }

    #[test]
    fn test_metadata_files() {
        let layout = P2Layout::new();
        assert!(layout.is_metadata_file("content.xml"));
        assert!(layout.is_metadata_file("artifacts.jar"));
        assert!(!layout.is_metadata_file("plugins/org.eclipse.core_1.0.0.jar"));
    }
}
