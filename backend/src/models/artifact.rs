//! Artifact model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::formats::ArtifactCoordinates;
use crate::models::checksum::ChecksumSet;
use crate::models::repository::RepositoryKey;

/// Artifact entity record, keyed by repository and coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub repository: RepositoryKey,
    pub coordinates: ArtifactCoordinates,
    pub path: String,
    pub size_bytes: u64,
    pub checksums: ChecksumSet,
    /// False once the file has been deleted or moved to trash.
    pub present: bool,
    pub download_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ArtifactEntry {
    pub fn new(
        repository: RepositoryKey,
        coordinates: ArtifactCoordinates,
        size_bytes: u64,
        checksums: ChecksumSet,
    ) -> Self {
        let path = coordinates.to_path();
        Self {
            repository,
            coordinates,
            path,
            size_bytes,
            checksums,
            present: true,
            download_count: 0,
            last_used: None,
            updated_at: Utc::now(),
        }
    }
}
