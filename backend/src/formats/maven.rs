//! Maven layout.
//!
//! Implements the Maven 2 repository layout and `maven-metadata.xml`
//! generation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use quick_xml::escape::escape;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formats::{
    file_name, invalid, AggregateMetadata, ArtifactCoordinates, LayoutProvider, MetadataScope,
};
use crate::models::checksum::DigestAlgorithm;

pub const LAYOUT_KEY: &str = "maven";

pub const METADATA_FILE: &str = "maven-metadata.xml";

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

const DIGESTS: &[DigestAlgorithm] = &[DigestAlgorithm::Md5, DigestAlgorithm::Sha1];

/// Maven layout provider
pub struct MavenLayout;

impl MavenLayout {
    pub fn new() -> Self {
        Self
    }

    /// Parse Maven coordinates from path
    /// Path format: groupId/artifactId/version/artifactId-version[-classifier].extension
    pub fn parse_coordinates(path: &str) -> Result<MavenCoordinates> {
        let parts: Vec<&str> = path.split('/').collect();

        if parts.len() < 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid(
                LAYOUT_KEY,
                path,
                "expected groupId/artifactId/version/filename",
            ));
        }

        let filename = parts[parts.len() - 1];
        let version = parts[parts.len() - 2];
        let artifact_id = parts[parts.len() - 3];
        let group_id = parts[..parts.len() - 3].join(".");

        if filename == METADATA_FILE {
            return Err(invalid(LAYOUT_KEY, path, "metadata is not an artifact"));
        }

        let (snapshot_version, classifier, extension) =
            Self::parse_filename(filename, artifact_id, version)
                .ok_or_else(|| invalid(LAYOUT_KEY, path, "filename does not match coordinates"))?;

        Ok(MavenCoordinates {
            group_id,
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            snapshot_version,
            classifier,
            extension,
        })
    }

    /// Split a filename into (timestamped snapshot version, classifier, extension).
    fn parse_filename(
        filename: &str,
        artifact_id: &str,
        version: &str,
    ) -> Option<(Option<String>, Option<String>, String)> {
        let expected_prefix = format!("{}-{}", artifact_id, version);

        // Deployed snapshots are named after their build timestamp:
        // artifact-1.0.0-20260211.124623-1.jar instead of artifact-1.0.0-SNAPSHOT.jar
        let (snapshot_version, remainder) = if let Some(rest) = filename.strip_prefix(&expected_prefix) {
            (None, rest)
        } else {
            let base_version = version.strip_suffix(SNAPSHOT_SUFFIX)?;
            let rest = filename.strip_prefix(&format!("{}-{}-", artifact_id, base_version))?;
            let stamp = timestamp_regex().find(rest)?;
            (Some(stamp.as_str().to_string()), &rest[stamp.end()..])
        };

        if let Some(rest) = remainder.strip_prefix('-') {
            let dot = rest.find('.')?;
            let (classifier, extension) = (&rest[..dot], &rest[dot + 1..]);
            if classifier.is_empty() || extension.is_empty() {
                return None;
            }
            return Some((snapshot_version, Some(classifier.to_string()), extension.to_string()));
        }

        let extension = remainder.strip_prefix('.')?;
        if extension.is_empty() {
            return None;
        }
        Some((snapshot_version, None, extension.to_string()))
    }

    pub fn is_pom(path: &str) -> bool {
        path.ends_with(".pom")
    }
}

impl Default for MavenLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProvider for MavenLayout {
    fn layout_key(&self) -> &'static str {
        LAYOUT_KEY
    }

    fn parse(&self, path: &str) -> Result<ArtifactCoordinates> {
        Self::parse_coordinates(path).map(ArtifactCoordinates::Maven)
    }

    fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        DIGESTS
    }

    fn is_metadata_file(&self, path: &str) -> bool {
        file_name(path) == METADATA_FILE
    }

    fn metadata_scope(&self, coordinates: &ArtifactCoordinates) -> Option<MetadataScope> {
        match coordinates {
            ArtifactCoordinates::Maven(c) => {
                let dir = format!("{}/{}", c.group_id.replace('.', "/"), c.artifact_id);
                Some(MetadataScope {
                    artifact_dir: dir.clone(),
                    document_dir: dir,
                })
            }
            _ => None,
        }
    }

    fn document_scope(&self, path: &str) -> Option<MetadataScope> {
        let dir = path.strip_suffix(METADATA_FILE)?.strip_suffix('/')?;
        // Snapshot version directories hold version-level documents
        let dir = match dir.rsplit_once('/') {
            Some((parent, version)) if version.ends_with(SNAPSHOT_SUFFIX) => parent,
            _ => dir,
        };
        if !dir.contains('/') {
            return None;
        }
        Some(MetadataScope {
            artifact_dir: dir.to_string(),
            document_dir: dir.to_string(),
        })
    }

    fn aggregate_metadata(&self, artifacts: &[ArtifactCoordinates]) -> Vec<AggregateMetadata> {
        let maven: Vec<&MavenCoordinates> = artifacts
            .iter()
            .filter_map(|c| match c {
                ArtifactCoordinates::Maven(m) => Some(m),
                _ => None,
            })
            .collect();

        let mut by_artifact: BTreeMap<(&str, &str), BTreeSet<&str>> = BTreeMap::new();
        let mut snapshot_builds: BTreeMap<(&str, &str, &str), Vec<&str>> = BTreeMap::new();
        for coords in &maven {
            by_artifact
                .entry((coords.group_id.as_str(), coords.artifact_id.as_str()))
                .or_default()
                .insert(coords.version.as_str());
            if let Some(stamp) = &coords.snapshot_version {
                snapshot_builds
                    .entry((
                        coords.group_id.as_str(),
                        coords.artifact_id.as_str(),
                        coords.version.as_str(),
                    ))
                    .or_default()
                    .push(stamp.as_str());
            }
        }

        let mut documents = Vec::new();

        for ((group_id, artifact_id), versions) in by_artifact {
            let mut versions: Vec<String> = versions.into_iter().map(str::to_string).collect();
            versions.sort_by(|a, b| compare_versions(a, b));
            let latest = versions.last().cloned();
            let release = versions
                .iter()
                .rev()
                .find(|v| !v.ends_with(SNAPSHOT_SUFFIX))
                .cloned();

            let metadata = MavenMetadata {
                group_id: Some(group_id.to_string()),
                artifact_id: Some(artifact_id.to_string()),
                version: None,
                versioning: Some(MavenVersioning {
                    latest,
                    release,
                    versions: Some(MavenVersions { version: versions }),
                    snapshot: None,
                    last_updated: None,
                }),
            };
            documents.push(AggregateMetadata {
                path: format!(
                    "{}/{}/{}",
                    group_id.replace('.', "/"),
                    artifact_id,
                    METADATA_FILE
                ),
                content: render_metadata(&metadata),
                fingerprint: metadata.fingerprint(),
            });
        }

        for ((group_id, artifact_id, version), mut builds) in snapshot_builds {
            builds.sort_by(|a, b| compare_versions(a, b));
            let Some(newest) = builds.last() else {
                continue;
            };
            let Some((timestamp, build_number)) = newest.rsplit_once('-') else {
                continue;
            };

            let metadata = MavenMetadata {
                group_id: Some(group_id.to_string()),
                artifact_id: Some(artifact_id.to_string()),
                version: Some(version.to_string()),
                versioning: Some(MavenVersioning {
                    latest: None,
                    release: None,
                    versions: None,
                    snapshot: Some(MavenSnapshot {
                        timestamp: Some(timestamp.to_string()),
                        build_number: Some(build_number.to_string()),
                    }),
                    last_updated: None,
                }),
            };
            documents.push(AggregateMetadata {
                path: format!(
                    "{}/{}/{}/{}",
                    group_id.replace('.', "/"),
                    artifact_id,
                    version,
                    METADATA_FILE
                ),
                content: render_metadata(&metadata),
                fingerprint: metadata.fingerprint(),
            });
        }

        documents
    }

    fn metadata_fingerprint(&self, content: &[u8]) -> Option<String> {
        let text = std::str::from_utf8(content).ok()?;
        let metadata: MavenMetadata = quick_xml::de::from_str(text).ok()?;
        Some(metadata.fingerprint())
    }
}

/// Maven coordinates (GAV)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MavenCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    /// Build timestamp of a deployed snapshot, e.g. `20260211.124623-1`.
    pub snapshot_version: Option<String>,
    pub classifier: Option<String>,
    pub extension: String,
}

impl MavenCoordinates {
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT_SUFFIX)
    }

    /// Get the repository path for these coordinates
    pub fn to_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// Get the standard filename for these coordinates
    pub fn filename(&self) -> String {
        let version = match &self.snapshot_version {
            Some(stamp) => format!(
                "{}-{}",
                self.version.trim_end_matches(SNAPSHOT_SUFFIX),
                stamp
            ),
            None => self.version.clone(),
        };
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.artifact_id, version, c, self.extension),
            None => format!("{}-{}.{}", self.artifact_id, version, self.extension),
        }
    }
}

/// `maven-metadata.xml` document model
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenMetadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub versioning: Option<MavenVersioning>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenVersioning {
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Option<MavenVersions>,
    pub snapshot: Option<MavenSnapshot>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MavenVersions {
    #[serde(default)]
    pub version: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenSnapshot {
    pub timestamp: Option<String>,
    pub build_number: Option<String>,
}

impl MavenMetadata {
    /// Identity of the document, ignoring `lastUpdated`.
    pub fn fingerprint(&self) -> String {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let versioning = self.versioning.clone().unwrap_or_default();
        let versions = versioning
            .versions
            .map(|v| v.version.join(","))
            .unwrap_or_default();
        let snapshot = versioning
            .snapshot
            .map(|s| format!("{}-{}", opt(&s.timestamp), opt(&s.build_number)))
            .unwrap_or_default();

        format!(
            "{}:{}:{}:[{}]:{}:{}:{}",
            opt(&self.group_id),
            opt(&self.artifact_id),
            opt(&self.version),
            versions,
            opt(&versioning.latest),
            opt(&versioning.release),
            snapshot
        )
    }
}

/// Render maven-metadata.xml content
fn render_metadata(metadata: &MavenMetadata) -> String {
    let element = |indent: &str, name: &str, value: &Option<String>| match value {
        Some(v) => format!("{}<{}>{}</{}>\n", indent, name, escape(v.as_str()), name),
        None => String::new(),
    };

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
    xml.push_str(&element("  ", "groupId", &metadata.group_id));
    xml.push_str(&element("  ", "artifactId", &metadata.artifact_id));
    xml.push_str(&element("  ", "version", &metadata.version));

    if let Some(versioning) = &metadata.versioning {
        xml.push_str("  <versioning>\n");
        xml.push_str(&element("    ", "latest", &versioning.latest));
        xml.push_str(&element("    ", "release", &versioning.release));
        if let Some(snapshot) = &versioning.snapshot {
            xml.push_str("    <snapshot>\n");
            xml.push_str(&element("      ", "timestamp", &snapshot.timestamp));
            xml.push_str(&element("      ", "buildNumber", &snapshot.build_number));
            xml.push_str("    </snapshot>\n");
        }
        if let Some(versions) = &versioning.versions {
            xml.push_str("    <versions>\n");
            for v in &versions.version {
                xml.push_str(&format!("      <version>{}</version>\n", escape(v.as_str())));
            }
            xml.push_str("    </versions>\n");
        }
        xml.push_str(&format!(
            "    <lastUpdated>{}</lastUpdated>\n",
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        ));
        xml.push_str("  </versioning>\n");
    }

    xml.push_str("</metadata>\n");
    xml
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{8}\.\d{6}-\d+").expect("valid snapshot timestamp regex"))
}

/// Order versions segment by segment, comparing digit runs numerically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let tokens = |s: &str| -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut digits = false;
        for ch in s.chars() {
            if ch == '.' || ch == '-' || ch == '_' {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                continue;
            }
            if !current.is_empty() && ch.is_ascii_digit() != digits {
                out.push(std::mem::take(&mut current));
            }
            digits = ch.is_ascii_digit();
            current.push(ch);
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    };

    let (left, right) = (tokens(a), tokens(b));
    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            // Numeric segments sort after qualifiers: 1.0-alpha < 1.0.1
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => l.to_lowercase().cmp(&r.to_lowercase()),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}
