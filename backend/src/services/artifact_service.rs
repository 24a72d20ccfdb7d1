//! Artifact service.
//!
//! Orchestrates writes to hosted repositories (deploy, delete, undelete) and
//! downloads through the resolution engine, keeping side files, aggregate
//! metadata and artifact records consistent.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::formats::{LayoutProvider, LayoutRegistry};
use crate::models::checksum::{ChecksumSet, DigestAlgorithm};
use crate::models::repository::{RepositoryDescriptor, RepositoryPolicy, RepositoryType};
use crate::services::artifact_store::ArtifactStore;
use crate::services::checksum_service;
use crate::services::configuration_service::ConfigurationService;
use crate::services::metadata_service::MetadataService;
use crate::services::resolution_service::{ResolutionResult, ResolutionService};
use crate::services::trash_service::{DeleteOutcome, TrashService};
use crate::storage::filesystem::RepositoryFilesystem;
use crate::storage::path_resolver::RepositoryPaths;

/// What a deploy did with the uploaded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Stored; side files and metadata were regenerated.
    Stored {
        size_bytes: u64,
        checksums: ChecksumSet,
    },
    /// An uploaded checksum matched the stored artifact.
    ChecksumVerified,
    /// An uploaded document the repository generates itself; discarded.
    MetadataIgnored,
}

pub struct ArtifactService {
    configuration: Arc<ConfigurationService>,
    layouts: Arc<LayoutRegistry>,
    resolution: Arc<ResolutionService>,
    metadata: Arc<MetadataService>,
    trash: Arc<TrashService>,
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactService {
    pub fn new(
        configuration: Arc<ConfigurationService>,
        layouts: Arc<LayoutRegistry>,
        resolution: Arc<ResolutionService>,
        metadata: Arc<MetadataService>,
        trash: Arc<TrashService>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            configuration,
            layouts,
            resolution,
            metadata,
            trash,
            store,
        }
    }

    /// Store `data` at `path` in a hosted repository.
    pub async fn deploy(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        data: Bytes,
    ) -> Result<DeployOutcome> {
        let descriptor = self
            .configuration
            .repository_descriptor(storage_id, repository_id)?;
        if descriptor.repo_type != RepositoryType::Hosted {
            return Err(AppError::Validation(format!(
                "Repository {} does not accept uploads",
                descriptor.key
            )));
        }
        let layout = self.layouts.require(&descriptor.layout)?;
        let repository = RepositoryFilesystem::new(RepositoryPaths::for_descriptor(&descriptor));
        // Validates the path before anything else looks at it
        let destination = repository.paths().artifact(path)?;

        if let Some((artifact, algorithm)) = DigestAlgorithm::parse_side_file(path) {
            let _lock = self.metadata.lock_path(&descriptor.key, artifact).await;
            return verify_uploaded_checksum(&repository, artifact, algorithm, &data).await;
        }

        if layout.is_metadata_file(path) && layout.document_scope(path).is_some() {
            debug!(repository = %descriptor.key, path, "Ignoring uploaded metadata document");
            return Ok(DeployOutcome::MetadataIgnored);
        }

        // Concurrent deploys of one path are serialized from the policy check
        // to the last side file, so the digests describe the stored content
        let lock = self.metadata.lock_path(&descriptor.key, path).await;
        if !layout.is_metadata_file(path) {
            check_policy(&descriptor, layout.as_ref(), path, &repository).await?;
        }
        let checksums = self
            .metadata
            .store_file(&lock, storage_id, repository_id, path, &data)
            .await?;
        drop(lock);
        self.metadata
            .refresh_metadata(storage_id, repository_id, path)
            .await?;

        info!(
            repository = %descriptor.key,
            path,
            size_bytes = data.len(),
            location = %destination.display(),
            "Artifact deployed"
        );
        Ok(DeployOutcome::Stored {
            size_bytes: data.len() as u64,
            checksums,
        })
    }

    /// Resolve `path` for download and count the download against the
    /// repository that served it.
    pub async fn download(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<ResolutionResult> {
        let result = self
            .resolution
            .resolve(storage_id, repository_id, path)
            .await?;

        if let ResolutionResult::Found(found) = &result {
            let served_by = &found.repository;
            if let Err(e) = self
                .record_download(&served_by.storage_id, &served_by.repository_id, path)
                .await
            {
                warn!(repository = %served_by, path, error = %e, "Failed to record download");
            }
        }
        Ok(result)
    }

    /// Delete through the trash and refresh the metadata the file fed.
    pub async fn delete(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        force: bool,
    ) -> Result<DeleteOutcome> {
        let outcome = self
            .trash
            .delete(storage_id, repository_id, path, force)
            .await?;
        self.metadata
            .refresh_metadata(storage_id, repository_id, path)
            .await?;
        Ok(outcome)
    }

    /// Restore from the trash and refresh the metadata the file feeds.
    pub async fn undelete(&self, storage_id: &str, repository_id: &str, path: &str) -> Result<()> {
        self.trash.undelete(storage_id, repository_id, path).await?;
        self.metadata
            .refresh_metadata(storage_id, repository_id, path)
            .await?;
        Ok(())
    }

    async fn record_download(&self, storage_id: &str, repository_id: &str, path: &str) -> Result<()> {
        if DigestAlgorithm::is_side_file(path) {
            return Ok(());
        }
        let descriptor = self
            .configuration
            .repository_descriptor(storage_id, repository_id)?;
        let layout = self.layouts.require(&descriptor.layout)?;
        if let Ok(coordinates) = layout.parse(path) {
            self.store
                .record_download(&descriptor.key, &coordinates)
                .await?;
        }
        Ok(())
    }
}

/// Policy checks for an artifact upload.
async fn check_policy(
    descriptor: &RepositoryDescriptor,
    layout: &dyn LayoutProvider,
    path: &str,
    repository: &RepositoryFilesystem,
) -> Result<()> {
    let coordinates = layout.parse(path)?;
    let is_snapshot = coordinates.is_snapshot();

    if coordinates.version().is_some() && !descriptor.policy.accepts(is_snapshot) {
        return Err(AppError::Validation(format!(
            "Repository {} with {:?} policy does not accept {} artifacts",
            descriptor.key,
            descriptor.policy,
            if is_snapshot { "snapshot" } else { "release" }
        )));
    }

    if descriptor.policy == RepositoryPolicy::Release && !is_snapshot && repository.exists(path).await? {
        return Err(AppError::Conflict(format!(
            "{} already exists in release repository {}",
            path, descriptor.key
        )));
    }

    Ok(())
}

/// Compare an uploaded checksum against the digest of the stored artifact.
async fn verify_uploaded_checksum(
    repository: &RepositoryFilesystem,
    artifact: &str,
    algorithm: DigestAlgorithm,
    data: &[u8],
) -> Result<DeployOutcome> {
    let uploaded = std::str::from_utf8(data)
        .ok()
        .and_then(checksum_service::parse_side_file_content)
        .ok_or_else(|| AppError::Validation(format!("Malformed {:?} checksum", algorithm)))?;

    if !repository.exists(artifact).await? {
        return Err(AppError::Validation(format!(
            "Checksum uploaded for missing artifact {}",
            artifact
        )));
    }

    let location = repository.paths().artifact(artifact)?;
    let computed = checksum_service::compute_file(&location, &[algorithm]).await?;
    if computed.get(algorithm) != Some(uploaded.as_str()) {
        return Err(AppError::Validation(format!(
            "Uploaded {:?} checksum of {} does not match the stored content",
            algorithm, artifact
        )));
    }

    repository
        .write_atomic(&algorithm.side_file(artifact), uploaded.as_bytes())
        .await?;
    Ok(DeployOutcome::ChecksumVerified)
}
