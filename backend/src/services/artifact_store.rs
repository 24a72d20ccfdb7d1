//! Artifact entity records.
//!
//! The engine does not depend on these records for resolution; they carry
//! bookkeeping (sizes, checksums, download counters, presence) for the
//! layers above it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::formats::ArtifactCoordinates;
use crate::models::artifact::ArtifactEntry;
use crate::models::repository::RepositoryKey;

/// Key-value store of artifact entries.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Insert or update an entry. Counters of an existing entry are kept.
    async fn upsert(&self, entry: ArtifactEntry) -> Result<()>;

    async fn find(
        &self,
        repository: &RepositoryKey,
        coordinates: &ArtifactCoordinates,
    ) -> Result<Option<ArtifactEntry>>;

    /// Count a download and stamp the last-used time. Unknown entries are ignored.
    async fn record_download(
        &self,
        repository: &RepositoryKey,
        coordinates: &ArtifactCoordinates,
    ) -> Result<()>;

    /// Flag an entry whose file is gone (deleted or trashed).
    async fn mark_removed(
        &self,
        repository: &RepositoryKey,
        coordinates: &ArtifactCoordinates,
    ) -> Result<()>;
}

type EntryKey = (RepositoryKey, ArtifactCoordinates);

/// Process-local store.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    entries: RwLock<HashMap<EntryKey, ArtifactEntry>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn upsert(&self, mut entry: ArtifactEntry) -> Result<()> {
        let key = (entry.repository.clone(), entry.coordinates.clone());
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&key) {
            entry.download_count = existing.download_count;
            entry.last_used = existing.last_used;
        }
        entry.updated_at = Utc::now();
        entries.insert(key, entry);
        Ok(())
    }

    async fn find(
        &self,
        repository: &RepositoryKey,
        coordinates: &ArtifactCoordinates,
    ) -> Result<Option<ArtifactEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(repository.clone(), coordinates.clone()))
            .cloned())
    }

    async fn record_download(
        &self,
        repository: &RepositoryKey,
        coordinates: &ArtifactCoordinates,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&(repository.clone(), coordinates.clone())) {
            entry.download_count += 1;
            entry.last_used = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_removed(
        &self,
        repository: &RepositoryKey,
        coordinates: &ArtifactCoordinates,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&(repository.clone(), coordinates.clone())) {
            entry.present = false;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }
}
