//! PyPI layout.
//!
//! Distributions are stored at `packages/<normalized-name>/<version>/<filename>`
//! and a PEP 503 simple index is generated per project at
//! `simple/<normalized-name>/index.html`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formats::{
    invalid, AggregateMetadata, ArtifactCoordinates, LayoutProvider, MetadataScope,
};
use crate::models::checksum::DigestAlgorithm;

pub const LAYOUT_KEY: &str = "pypi";

const PACKAGES_DIR: &str = "packages";
const SIMPLE_DIR: &str = "simple";

const DIGESTS: &[DigestAlgorithm] = &[DigestAlgorithm::Sha256, DigestAlgorithm::Md5];

/// PyPI layout provider
pub struct PypiLayout;

impl PypiLayout {
    pub fn new() -> Self {
        Self
    }

    /// Parse a distribution path: packages/<name>/<version>/<filename>
    pub fn parse_path(path: &str) -> Result<PypiCoordinates> {
        let parts: Vec<&str> = path.split('/').collect();
        let [PACKAGES_DIR, name, version, filename] = parts.as_slice() else {
            return Err(invalid(
                LAYOUT_KEY,
                path,
                "expected packages/<name>/<version>/<filename>",
            ));
        };

        let (distribution, file_version) = Self::parse_filename(filename)
            .ok_or_else(|| invalid(LAYOUT_KEY, path, "unknown distribution filename"))?;

        if *name != Self::normalize_name(distribution) || *name != Self::normalize_name(name) {
            return Err(invalid(LAYOUT_KEY, path, "project name does not match filename"));
        }
        if *version != file_version {
            return Err(invalid(LAYOUT_KEY, path, "version does not match filename"));
        }

        Ok(PypiCoordinates {
            name: name.to_string(),
            version: version.to_string(),
            filename: filename.to_string(),
        })
    }

    /// Split a distribution filename into (distribution, version).
    pub fn parse_filename(filename: &str) -> Option<(&str, &str)> {
        if let Some(stem) = filename.strip_suffix(".whl") {
            Self::parse_wheel_stem(stem)
        } else if let Some(stem) = filename.strip_suffix(".tar.gz") {
            Self::parse_sdist_stem(stem)
        } else if let Some(stem) = filename.strip_suffix(".zip") {
            Self::parse_sdist_stem(stem)
        } else {
            None
        }
    }

    /// Parse wheel filename according to PEP 427
    /// Format: {distribution}-{version}(-{build tag})?-{python tag}-{abi tag}-{platform tag}.whl
    fn parse_wheel_stem(stem: &str) -> Option<(&str, &str)> {
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() < 5 || parts.len() > 6 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some((parts[0], parts[1]))
    }

    /// Parse source distribution filename
    /// Format: {name}-{version}.tar.gz
    fn parse_sdist_stem(stem: &str) -> Option<(&str, &str)> {
        let (name, version) = stem.rsplit_once('-')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some((name, version))
    }

    /// Normalize package name according to PEP 503
    pub fn normalize_name(name: &str) -> String {
        let mut result = String::new();
        let mut last_was_separator = true;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                result.push(c.to_ascii_lowercase());
                last_was_separator = false;
            } else if !last_was_separator {
                result.push('-');
                last_was_separator = true;
            }
        }

        // Remove trailing separator
        if result.ends_with('-') {
            result.pop();
        }

        result
    }
}

impl Default for PypiLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProvider for PypiLayout {
    fn layout_key(&self) -> &'static str {
        LAYOUT_KEY
    }

    fn parse(&self, path: &str) -> Result<ArtifactCoordinates> {
        Self::parse_path(path).map(ArtifactCoordinates::Pypi)
    }

    fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        DIGESTS
    }

    fn is_metadata_file(&self, path: &str) -> bool {
        path.starts_with("simple/") && path.ends_with("/index.html")
    }

    fn metadata_scope(&self, coordinates: &ArtifactCoordinates) -> Option<MetadataScope> {
        match coordinates {
            ArtifactCoordinates::Pypi(c) => Some(MetadataScope {
                artifact_dir: format!("{}/{}", PACKAGES_DIR, c.name),
                document_dir: format!("{}/{}", SIMPLE_DIR, c.name),
            }),
            _ => None,
        }
    }

    fn document_scope(&self, path: &str) -> Option<MetadataScope> {
        let name = path
            .strip_prefix("simple/")?
            .strip_suffix("/index.html")?;
        if name.is_empty() || name.contains('/') {
            return None;
        }
        Some(MetadataScope {
            artifact_dir: format!("{}/{}", PACKAGES_DIR, name),
            document_dir: format!("{}/{}", SIMPLE_DIR, name),
        })
    }

    fn aggregate_metadata(&self, artifacts: &[ArtifactCoordinates]) -> Vec<AggregateMetadata> {
        let mut projects: BTreeMap<&str, BTreeSet<&PypiCoordinates>> = BTreeMap::new();
        for artifact in artifacts {
            if let ArtifactCoordinates::Pypi(coords) = artifact {
                projects.entry(coords.name.as_str()).or_default().insert(coords);
            }
        }

        projects
            .into_iter()
            .map(|(name, files)| {
                let filenames: Vec<&str> = files.iter().map(|c| c.filename.as_str()).collect();
                AggregateMetadata {
                    path: format!("{}/{}/index.html", SIMPLE_DIR, name),
                    content: generate_simple_package_index(name, &files),
                    fingerprint: fingerprint(name, filenames),
                }
            })
            .collect()
    }

    fn metadata_fingerprint(&self, content: &[u8]) -> Option<String> {
        let html = std::str::from_utf8(content).ok()?;
        let name = title_regex().captures(html)?.get(1)?.as_str();
        let filenames = link_regex()
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect::<BTreeSet<_>>();
        Some(fingerprint(name, filenames))
    }
}

/// PyPI distribution coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PypiCoordinates {
    /// PEP 503 normalized project name.
    pub name: String,
    pub version: String,
    /// Distribution filename as uploaded (wheel or sdist).
    pub filename: String,
}

impl PypiCoordinates {
    pub fn to_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            PACKAGES_DIR, self.name, self.version, self.filename
        )
    }
}

fn fingerprint<'a>(name: &str, filenames: impl IntoIterator<Item = &'a str>) -> String {
    let mut sorted: Vec<&str> = filenames.into_iter().collect();
    sorted.sort_unstable();
    format!("{}:[{}]", name, sorted.join(","))
}

/// Generate simple index HTML for a project
fn generate_simple_package_index(name: &str, files: &BTreeSet<&PypiCoordinates>) -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta name=\"pypi:repository-version\" content=\"1.0\"/>\n");
    html.push_str(&format!("<title>Links for {}</title>\n", name));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>Links for {}</h1>\n", name));

    for file in files {
        html.push_str(&format!(
            "<a href=\"../../{}\">{}</a><br/>\n",
            file.to_path(),
            file.filename
        ));
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<h1>Links for ([^<]+)</h1>").expect("valid title regex"))
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<a href="[^"]*">([^<]+)</a>"#).expect("valid link regex"))
}
