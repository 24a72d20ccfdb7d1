//! Soft deletion.
//!
//! Deleting from a repository with trash enabled moves the file and its
//! checksum side files to `.trash/<path>`; undelete moves them back. Purging
//! empties the trash.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::formats::LayoutRegistry;
use crate::models::artifact::ArtifactEntry;
use crate::models::checksum::DigestAlgorithm;
use crate::models::repository::RepositoryDescriptor;
use crate::services::artifact_store::ArtifactStore;
use crate::services::checksum_service;
use crate::services::configuration_service::ConfigurationService;
use crate::services::path_lock::PathLocks;
use crate::storage::filesystem::{move_file, RepositoryFilesystem};
use crate::storage::path_resolver::RepositoryPaths;

/// What a delete did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Moved to the repository trash.
    Trashed,
    /// Removed permanently.
    Removed,
}

/// Outcome of a purge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub purged: usize,
    /// Entries that disappeared before they could be removed.
    pub vanished: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
}

impl PurgeReport {
    fn merge(&mut self, other: PurgeReport) {
        self.purged += other.purged;
        self.vanished += other.vanished;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }
}

pub struct TrashService {
    configuration: Arc<ConfigurationService>,
    layouts: Arc<LayoutRegistry>,
    store: Arc<dyn ArtifactStore>,
    path_locks: Arc<PathLocks>,
}

impl TrashService {
    pub fn new(
        configuration: Arc<ConfigurationService>,
        layouts: Arc<LayoutRegistry>,
        store: Arc<dyn ArtifactStore>,
        path_locks: Arc<PathLocks>,
    ) -> Self {
        Self {
            configuration,
            layouts,
            store,
            path_locks,
        }
    }

    /// Delete a file or directory. With `force`, or when the repository has
    /// trash disabled, the content is removed permanently. An older trashed
    /// copy at the same path is replaced.
    pub async fn delete(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        force: bool,
    ) -> Result<DeleteOutcome> {
        let descriptor = self.descriptor_with_storage(storage_id, repository_id)?;
        let paths = RepositoryPaths::for_descriptor(&descriptor);
        let location = paths.artifact(path)?;
        let _lock = self
            .path_locks
            .lock((descriptor.key.clone(), path.to_string()))
            .await;

        let Some(is_dir) = entry_kind(&location).await? else {
            return Err(AppError::NotFound(format!(
                "{} not found in {}",
                path, descriptor.key
            )));
        };

        let outcome = if descriptor.trash_enabled && !force {
            let trashed = paths.trash(path)?;
            remove_entry(&trashed).await?;
            move_file(&location, &trashed).await?;
            if !is_dir {
                move_side_files(&paths, path, SideFileDirection::ToTrash).await?;
            }
            DeleteOutcome::Trashed
        } else {
            remove_entry(&location).await?;
            if !is_dir {
                checksum_service::remove_side_files(&RepositoryFilesystem::new(paths), path).await?;
            }
            DeleteOutcome::Removed
        };

        if !is_dir {
            self.mark_removed(&descriptor, path).await?;
        }
        info!(repository = %descriptor.key, path, outcome = ?outcome, "Deleted");
        Ok(outcome)
    }

    /// Restore a trashed file or directory to its original location.
    ///
    /// Fails with `Conflict` when the original location is occupied and with
    /// `NotFound` when there is no trashed copy.
    pub async fn undelete(&self, storage_id: &str, repository_id: &str, path: &str) -> Result<()> {
        let descriptor = self.descriptor_with_storage(storage_id, repository_id)?;
        let paths = RepositoryPaths::for_descriptor(&descriptor);
        let location = paths.artifact(path)?;
        let trashed = paths.trash(path)?;
        let _lock = self
            .path_locks
            .lock((descriptor.key.clone(), path.to_string()))
            .await;

        if entry_kind(&location).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "{} already exists in {}",
                path, descriptor.key
            )));
        }
        let Some(is_dir) = entry_kind(&trashed).await? else {
            return Err(AppError::NotFound(format!(
                "{} is not in the trash of {}",
                path, descriptor.key
            )));
        };

        move_file(&trashed, &location).await?;
        if !is_dir {
            move_side_files(&paths, path, SideFileDirection::FromTrash).await?;
            self.record_restored(&descriptor, &paths, path).await?;
        }

        info!(repository = %descriptor.key, path, "Restored from trash");
        Ok(())
    }

    /// Empty the trash of one repository. Only entries present when the
    /// purge starts are removed.
    pub async fn purge_trash(&self, storage_id: &str, repository_id: &str) -> Result<PurgeReport> {
        let descriptor = self.descriptor_with_storage(storage_id, repository_id)?;
        let paths = RepositoryPaths::for_descriptor(&descriptor);
        let report = purge_directory(&paths.trash_root()).await?;
        info!(
            repository = %descriptor.key,
            purged = report.purged,
            failed = report.failed,
            "Trash purged"
        );
        Ok(report)
    }

    /// Empty the trash of every repository that has storage.
    pub async fn purge_all_trash(&self) -> Result<PurgeReport> {
        let snapshot = self.configuration.snapshot();
        let mut report = PurgeReport::default();
        for descriptor in snapshot.repositories().filter(|d| d.repo_type.has_storage()) {
            match self
                .purge_trash(descriptor.storage_id(), descriptor.repository_id())
                .await
            {
                Ok(r) => report.merge(r),
                Err(e) => {
                    warn!(repository = %descriptor.key, error = %e, "Trash purge failed");
                    report.failed += 1;
                    report.failures.push((descriptor.key.to_string(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn descriptor_with_storage(
        &self,
        storage_id: &str,
        repository_id: &str,
    ) -> Result<Arc<RepositoryDescriptor>> {
        let descriptor = self
            .configuration
            .repository_descriptor(storage_id, repository_id)?;
        if !descriptor.repo_type.has_storage() {
            return Err(AppError::Validation(format!(
                "Repository {} is a group and holds no files",
                descriptor.key
            )));
        }
        Ok(descriptor)
    }

    async fn mark_removed(&self, descriptor: &RepositoryDescriptor, path: &str) -> Result<()> {
        if DigestAlgorithm::is_side_file(path) {
            return Ok(());
        }
        let layout = self.layouts.require(&descriptor.layout)?;
        if let Ok(coordinates) = layout.parse(path) {
            self.store.mark_removed(&descriptor.key, &coordinates).await?;
        }
        Ok(())
    }

    async fn record_restored(
        &self,
        descriptor: &RepositoryDescriptor,
        paths: &RepositoryPaths,
        path: &str,
    ) -> Result<()> {
        if DigestAlgorithm::is_side_file(path) {
            return Ok(());
        }
        let layout = self.layouts.require(&descriptor.layout)?;
        let Ok(coordinates) = layout.parse(path) else {
            return Ok(());
        };
        let repository = RepositoryFilesystem::new(paths.clone());
        let checksums =
            checksum_service::read_side_files(&repository, path, layout.digest_algorithms()).await?;
        let size = fs::metadata(paths.artifact(path)?).await?.len();
        self.store
            .upsert(ArtifactEntry::new(
                descriptor.key.clone(),
                coordinates,
                size,
                checksums,
            ))
            .await
    }
}

#[derive(Debug, Clone, Copy)]
enum SideFileDirection {
    ToTrash,
    FromTrash,
}

/// Move whichever side files of `path` exist. A side file already present at
/// the destination is left alone on restore.
async fn move_side_files(paths: &RepositoryPaths, path: &str, direction: SideFileDirection) -> Result<()> {
    for algorithm in DigestAlgorithm::ALL {
        let side_file = algorithm.side_file(path);
        let live = paths.artifact(&side_file)?;
        let trashed = paths.trash(&side_file)?;
        let (from, to) = match direction {
            SideFileDirection::ToTrash => (live, trashed),
            SideFileDirection::FromTrash => (trashed, live),
        };
        if entry_kind(&from).await? != Some(false) {
            continue;
        }
        match direction {
            SideFileDirection::ToTrash => remove_entry(&to).await?,
            SideFileDirection::FromTrash if entry_kind(&to).await?.is_some() => {
                remove_entry(&from).await?;
                continue;
            }
            SideFileDirection::FromTrash => {}
        }
        move_file(&from, &to).await?;
    }
    Ok(())
}

/// `Some(true)` for a directory, `Some(false)` for a file, `None` when absent.
async fn entry_kind(path: &Path) -> Result<Option<bool>> {
    match fs::symlink_metadata(path).await {
        Ok(meta) => Ok(Some(meta.is_dir())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Remove a file or directory tree; absent entries are fine.
async fn remove_entry(path: &Path) -> Result<()> {
    let result = match entry_kind(path).await? {
        Some(true) => fs::remove_dir_all(path).await,
        Some(false) => fs::remove_file(path).await,
        None => return Ok(()),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Remove the entries of `dir` that exist right now.
async fn purge_directory(dir: &Path) -> Result<PurgeReport> {
    let mut report = PurgeReport::default();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(AppError::Io(e)),
    };
    let mut snapshot = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        snapshot.push(entry.path());
    }

    for path in snapshot {
        let result = match entry_kind(&path).await {
            Ok(Some(true)) => fs::remove_dir_all(&path).await,
            Ok(Some(false)) => fs::remove_file(&path).await,
            Ok(None) => {
                report.vanished += 1;
                continue;
            }
            Err(e) => {
                report.failed += 1;
                report.failures.push((path.display().to_string(), e.to_string()));
                continue;
            }
        };
        match result {
            Ok(()) => report.purged += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => report.vanished += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to purge trash entry");
                report.failed += 1;
                report.failures.push((path.display().to_string(), e.to_string()));
            }
        }
    }

    debug!(dir = %dir.display(), purged = report.purged, "Purged directory");
    Ok(report)
}
