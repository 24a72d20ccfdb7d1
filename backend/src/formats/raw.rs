//! Raw binary layout: the path is the identity.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formats::{invalid, ArtifactCoordinates, LayoutProvider};
use crate::models::checksum::DigestAlgorithm;

pub const LAYOUT_KEY: &str = "raw";

const DIGESTS: &[DigestAlgorithm] = &[
    DigestAlgorithm::Md5,
    DigestAlgorithm::Sha1,
    DigestAlgorithm::Sha256,
];

pub struct RawLayout;

impl RawLayout {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RawLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProvider for RawLayout {
    fn layout_key(&self) -> &'static str {
        LAYOUT_KEY
    }

    fn parse(&self, path: &str) -> Result<ArtifactCoordinates> {
        if path.is_empty() || path.split('/').any(str::is_empty) {
            return Err(invalid(LAYOUT_KEY, path, "empty path segment"));
        }
        Ok(ArtifactCoordinates::Raw(RawCoordinates {
            path: path.to_string(),
        }))
    }

    fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        DIGESTS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawCoordinates {
    pub path: String,
}

impl RawCoordinates {
    pub fn to_path(&self) -> String {
        self.path.clone()
    }
}
