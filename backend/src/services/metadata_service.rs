//! Metadata and checksum consistency.
//!
//! Regeneration walks a repository (or a sub-path of it), brings every
//! checksum side file up to date and recomputes the aggregate metadata
//! documents of the layout. Documents are compared by fingerprint, so two
//! consecutive runs without `force` leave the repository untouched.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::formats::{ArtifactCoordinates, LayoutProvider, LayoutRegistry, MetadataScope};
use crate::models::artifact::ArtifactEntry;
use crate::models::checksum::{ChecksumSet, DigestAlgorithm};
use crate::models::repository::{RepositoryDescriptor, RepositoryKey, RepositoryType};
use crate::services::artifact_store::ArtifactStore;
use crate::services::checksum_service::{self, SideFileOutcome};
use crate::services::configuration_service::ConfigurationService;
use crate::services::path_lock::{KeyedLocks, PathLockGuard, PathLocks};
use crate::storage::filesystem::{FileListing, RepositoryFilesystem};
use crate::storage::path_resolver::{validate_relative_path, RepositoryPaths};

/// A file that could not be regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerationFailure {
    pub path: String,
    pub cause: String,
}

/// Outcome of a regeneration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegenerationReport {
    /// Files whose side files were (re)written.
    pub succeeded: usize,
    /// Files whose side files were all present.
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RegenerationFailure>,
    /// Aggregate documents written.
    pub metadata_written: usize,
    /// Aggregate documents removed because no artifact backs them any more.
    pub metadata_removed: usize,
}

impl RegenerationReport {
    pub fn record_failure(&mut self, path: impl Into<String>, cause: impl ToString) {
        let path = path.into();
        let cause = cause.to_string();
        warn!(path = %path, cause = %cause, "Regeneration failed for file");
        self.failed += 1;
        self.failures.push(RegenerationFailure { path, cause });
    }

    pub fn merge(&mut self, other: RegenerationReport) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.failures.extend(other.failures);
        self.metadata_written += other.metadata_written;
        self.metadata_removed += other.metadata_removed;
    }

    /// Nothing was written or removed.
    pub fn is_noop(&self) -> bool {
        self.succeeded == 0 && self.metadata_written == 0 && self.metadata_removed == 0
    }
}

/// Repository-level context shared by every step of one run.
struct RegenerationContext {
    descriptor: Arc<RepositoryDescriptor>,
    layout: Arc<dyn LayoutProvider>,
    repository: RepositoryFilesystem,
}

impl RegenerationContext {
    /// Aggregate documents are derived for hosted content only; a proxy keeps
    /// the documents served by its remote.
    fn maintains_metadata(&self) -> bool {
        self.descriptor.repo_type == RepositoryType::Hosted
    }
}

pub struct MetadataService {
    configuration: Arc<ConfigurationService>,
    layouts: Arc<LayoutRegistry>,
    store: Arc<dyn ArtifactStore>,
    path_locks: Arc<PathLocks>,
    /// Keyed by repository and document directory.
    scope_locks: KeyedLocks<(RepositoryKey, String)>,
}

impl MetadataService {
    pub fn new(
        configuration: Arc<ConfigurationService>,
        layouts: Arc<LayoutRegistry>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            configuration,
            layouts,
            store,
            path_locks: Arc::new(PathLocks::new()),
            scope_locks: KeyedLocks::new(),
        }
    }

    /// Registry of per-path locks, shared with every other writer of
    /// repository files.
    pub fn path_locks(&self) -> Arc<PathLocks> {
        self.path_locks.clone()
    }

    /// Exclusive access to one path of a repository.
    pub async fn lock_path(&self, repository: &RepositoryKey, relative_path: &str) -> PathLockGuard<'_> {
        self.path_locks
            .lock((repository.clone(), relative_path.to_string()))
            .await
    }

    /// Write `content` to `relative_path` and bring its side files and
    /// artifact record up to date, all under the caller's path lock.
    /// Aggregate documents are left to [`refresh_metadata`](Self::refresh_metadata),
    /// to be called once the lock is released.
    pub async fn store_file(
        &self,
        lock: &PathLockGuard<'_>,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
        content: &[u8],
    ) -> Result<ChecksumSet> {
        let ctx = self.context(storage_id, repository_id)?;
        let (locked_repository, locked_path) = lock.key();
        if locked_repository != &ctx.descriptor.key || locked_path != relative_path {
            return Err(AppError::Internal(format!(
                "Lock for {}:{} does not cover {}:{}",
                locked_repository, locked_path, ctx.descriptor.key, relative_path
            )));
        }

        ctx.repository.write_atomic(relative_path, content).await?;
        if DigestAlgorithm::is_side_file(relative_path) {
            return Ok(ChecksumSet::new());
        }
        match self.refresh_side_files_locked(&ctx, relative_path, true).await? {
            SideFileOutcome::Written { checksums, .. } => Ok(checksums),
            SideFileOutcome::Skipped => Ok(ChecksumSet::new()),
        }
    }

    /// Regenerate side files and aggregate metadata of one repository,
    /// optionally limited to `base_path`.
    pub async fn regenerate(
        &self,
        storage_id: &str,
        repository_id: &str,
        base_path: Option<&str>,
        force: bool,
    ) -> Result<RegenerationReport> {
        let ctx = self.context(storage_id, repository_id)?;
        if let Some(base) = base_path {
            validate_relative_path(base)?;
        }

        info!(
            repository = %ctx.descriptor.key,
            base_path = base_path.unwrap_or(""),
            force,
            "Regenerating checksums and metadata"
        );

        let listing = ctx.repository.walk(base_path).await?;
        let mut report = RegenerationReport::default();
        for (path, cause) in &listing.errors {
            report.record_failure(path.clone(), cause);
        }

        let mut handled: HashSet<String> = HashSet::new();

        if ctx.maintains_metadata() {
            let scopes = self.collect_scopes(&ctx, &listing.files);
            // A full walk already holds every file a scope needs
            let full = base_path.is_none().then_some(&listing);
            for scope in &scopes {
                if let Err(e) = self
                    .regenerate_scope(&ctx, scope, full, force, &mut report, &mut handled)
                    .await
                {
                    report.record_failure(scope.document_dir.clone(), e);
                }
            }
        }

        for file in &listing.files {
            if DigestAlgorithm::is_side_file(file) || handled.contains(file) {
                continue;
            }
            match self.refresh_side_files(&ctx, file, force).await {
                Ok(SideFileOutcome::Written { .. }) => report.succeeded += 1,
                Ok(SideFileOutcome::Skipped) => report.skipped += 1,
                Err(e) => report.record_failure(file.clone(), e),
            }
        }

        info!(
            repository = %ctx.descriptor.key,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            metadata_written = report.metadata_written,
            metadata_removed = report.metadata_removed,
            "Regeneration finished"
        );
        Ok(report)
    }

    /// Regenerate every repository with storage in `storage_id`. Groups have
    /// nothing to regenerate and are skipped.
    pub async fn regenerate_storage(&self, storage_id: &str, force: bool) -> Result<RegenerationReport> {
        let snapshot = self.configuration.snapshot();
        if !snapshot.has_storage(storage_id) {
            return Err(AppError::Config(format!(
                "Storage {} is not configured",
                storage_id
            )));
        }

        let mut report = RegenerationReport::default();
        for descriptor in snapshot.storage_repositories(storage_id) {
            if !descriptor.repo_type.has_storage() {
                continue;
            }
            match self
                .regenerate(storage_id, descriptor.repository_id(), None, force)
                .await
            {
                Ok(r) => report.merge(r),
                Err(e) => report.record_failure(descriptor.key.to_string(), e),
            }
        }
        Ok(report)
    }

    /// Regenerate the subtree at `path`.
    pub async fn regenerate_path(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        force: bool,
    ) -> Result<RegenerationReport> {
        self.regenerate(storage_id, repository_id, Some(path), force)
            .await
    }

    /// Bring one freshly written file up to date: rewrite its side files and
    /// refresh the aggregate documents it contributes to.
    pub async fn refresh_file(
        &self,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
    ) -> Result<RegenerationReport> {
        let ctx = self.context(storage_id, repository_id)?;
        let mut report = RegenerationReport::default();
        let mut handled = HashSet::new();

        if !DigestAlgorithm::is_side_file(relative_path) {
            match self.refresh_side_files(&ctx, relative_path, true).await? {
                SideFileOutcome::Written { .. } => report.succeeded += 1,
                SideFileOutcome::Skipped => report.skipped += 1,
            }
        }

        if ctx.maintains_metadata() {
            if let Some(scope) = self.scope_of(&ctx, relative_path) {
                self.regenerate_scope(&ctx, &scope, None, false, &mut report, &mut handled)
                    .await?;
            }
        }
        Ok(report)
    }

    /// Refresh the aggregate documents `relative_path` contributed to, after
    /// the file has been removed.
    pub async fn refresh_metadata(
        &self,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
    ) -> Result<RegenerationReport> {
        let ctx = self.context(storage_id, repository_id)?;
        let mut report = RegenerationReport::default();
        if ctx.maintains_metadata() {
            if let Some(scope) = self.scope_of(&ctx, relative_path) {
                let mut handled = HashSet::new();
                self.regenerate_scope(&ctx, &scope, None, false, &mut report, &mut handled)
                    .await?;
            }
        }
        Ok(report)
    }

    fn context(&self, storage_id: &str, repository_id: &str) -> Result<RegenerationContext> {
        let descriptor = self
            .configuration
            .repository_descriptor(storage_id, repository_id)?;
        if !descriptor.repo_type.has_storage() {
            return Err(AppError::Validation(format!(
                "Repository {} is a group and has no files to regenerate",
                descriptor.key
            )));
        }
        let layout = self.layouts.require(&descriptor.layout)?;
        let repository = RepositoryFilesystem::new(RepositoryPaths::for_descriptor(&descriptor));
        Ok(RegenerationContext {
            descriptor,
            layout,
            repository,
        })
    }

    fn scope_of(&self, ctx: &RegenerationContext, path: &str) -> Option<MetadataScope> {
        if ctx.layout.is_metadata_file(path) {
            return ctx.layout.document_scope(path);
        }
        let coordinates = ctx.layout.parse(path).ok()?;
        ctx.layout.metadata_scope(&coordinates)
    }

    fn collect_scopes(&self, ctx: &RegenerationContext, files: &[String]) -> BTreeSet<MetadataScope> {
        files
            .iter()
            .filter(|f| !DigestAlgorithm::is_side_file(f))
            .filter_map(|f| self.scope_of(ctx, f))
            .collect()
    }

    /// Recompute the documents of one scope from the artifacts on disk.
    async fn regenerate_scope(
        &self,
        ctx: &RegenerationContext,
        scope: &MetadataScope,
        full: Option<&FileListing>,
        force: bool,
        report: &mut RegenerationReport,
        handled: &mut HashSet<String>,
    ) -> Result<()> {
        let layout = ctx.layout.as_ref();
        // Refreshes of one scope run one at a time, so the last to start sees
        // every artifact written before it
        let _lock = self
            .scope_locks
            .lock((ctx.descriptor.key.clone(), scope.document_dir.clone()))
            .await;

        let artifact_files = scope_files(&ctx.repository, full, &scope.artifact_dir).await?;
        let artifacts: Vec<ArtifactCoordinates> = artifact_files
            .iter()
            .filter(|f| !DigestAlgorithm::is_side_file(f) && !layout.is_metadata_file(f))
            .filter_map(|f| layout.parse(f).ok())
            .filter(|c| layout.metadata_scope(c).as_ref() == Some(scope))
            .collect();

        let documents = layout.aggregate_metadata(&artifacts);
        let generated: HashSet<&str> = documents.iter().map(|d| d.path.as_str()).collect();

        for document in &documents {
            let current = match ctx.repository.read(&document.path).await {
                Ok(content) => layout.metadata_fingerprint(&content),
                Err(AppError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            if !force && current.as_deref() == Some(document.fingerprint.as_str()) {
                debug!(path = %document.path, "Metadata unchanged");
                continue;
            }

            let _document_lock = self.lock_path(&ctx.descriptor.key, &document.path).await;
            ctx.repository
                .write_atomic(&document.path, document.content.as_bytes())
                .await?;
            checksum_service::regenerate_side_files(
                &ctx.repository,
                &document.path,
                layout.digest_algorithms(),
                true,
            )
            .await?;
            debug!(path = %document.path, "Metadata written");
            report.metadata_written += 1;
            handled.insert(document.path.clone());
        }

        let document_files = scope_files(&ctx.repository, full, &scope.document_dir).await?;
        for stale in document_files.iter().filter(|f| {
            layout.is_metadata_file(f)
                && !generated.contains(f.as_str())
                && layout.document_scope(f).as_ref() == Some(scope)
        }) {
            let _document_lock = self.lock_path(&ctx.descriptor.key, stale).await;
            let path = ctx.repository.paths().artifact(stale)?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::Io(e)),
            }
            checksum_service::remove_side_files(&ctx.repository, stale).await?;
            debug!(path = %stale, "Stale metadata removed");
            report.metadata_removed += 1;
            handled.insert(stale.clone());
        }

        Ok(())
    }

    async fn refresh_side_files(
        &self,
        ctx: &RegenerationContext,
        relative_path: &str,
        force: bool,
    ) -> Result<SideFileOutcome> {
        let _lock = self.lock_path(&ctx.descriptor.key, relative_path).await;
        self.refresh_side_files_locked(ctx, relative_path, force).await
    }

    /// Side files of one file plus its artifact record. The caller holds the
    /// path lock.
    async fn refresh_side_files_locked(
        &self,
        ctx: &RegenerationContext,
        relative_path: &str,
        force: bool,
    ) -> Result<SideFileOutcome> {
        let algorithms = ctx.layout.digest_algorithms();
        let outcome =
            checksum_service::regenerate_side_files(&ctx.repository, relative_path, algorithms, force)
                .await?;

        if ctx.layout.is_metadata_file(relative_path) {
            return Ok(outcome);
        }
        let Ok(coordinates) = ctx.layout.parse(relative_path) else {
            return Ok(outcome);
        };

        let checksums = match &outcome {
            SideFileOutcome::Written { .. } => {
                checksum_service::read_side_files(&ctx.repository, relative_path, algorithms).await?
            }
            SideFileOutcome::Skipped => {
                if self
                    .store
                    .find(&ctx.descriptor.key, &coordinates)
                    .await?
                    .is_some_and(|entry| entry.present)
                {
                    return Ok(outcome);
                }
                checksum_service::read_side_files(&ctx.repository, relative_path, algorithms).await?
            }
        };

        let size = fs::metadata(ctx.repository.paths().artifact(relative_path)?)
            .await?
            .len();
        self.store
            .upsert(ArtifactEntry::new(
                ctx.descriptor.key.clone(),
                coordinates,
                size,
                checksums,
            ))
            .await?;
        Ok(outcome)
    }
}

/// Files under `dir`, taken from a full listing when one is available.
async fn scope_files(
    repository: &RepositoryFilesystem,
    full: Option<&FileListing>,
    dir: &str,
) -> Result<Vec<String>> {
    match full {
        Some(listing) => Ok(listing
            .files
            .iter()
            .filter(|f| is_under(f, dir))
            .cloned()
            .collect()),
        None => Ok(repository.walk(Some(dir)).await?.files),
    }
}

fn is_under(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::repository::{RepositoryKey, RepositoryPolicy};
    use crate::services::artifact_store::InMemoryArtifactStore;
    use crate::services::configuration_service::ConfigurationSnapshot;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        service: MetadataService,
        store: Arc<InMemoryArtifactStore>,
        repo: RepositoryFilesystem,
    }

    async fn fixture(layout: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let base_dir = dir.path().join("releases");
        let descriptor = RepositoryDescriptor {
            key: RepositoryKey::new("storage0", "releases"),
            repo_type: RepositoryType::Hosted,
            layout: layout.to_string(),
            base_dir: base_dir.clone(),
            policy: RepositoryPolicy::Mixed,
            remote: None,
            members: vec![],
            trash_enabled: true,
        };
        let configuration = Arc::new(
            ConfigurationService::new(ConfigurationSnapshot::new(vec![descriptor], vec![]))
                .unwrap(),
        );
        let paths = RepositoryPaths::new(base_dir);
        paths.ensure_directory_structure().await.unwrap();

        let store = Arc::new(InMemoryArtifactStore::new());
        let service = MetadataService::new(
            configuration,
            Arc::new(LayoutRegistry::with_core_layouts()),
            store.clone(),
        );
        Fixture {
            _dir: dir,
            service,
            store,
            repo: RepositoryFilesystem::new(paths),
        }
    }

    #[tokio::test]
    async fn test_regeneration_is_idempotent() {
        let f = fixture("maven").await;
        f.repo
            .write_atomic("com/example/lib/1.0/lib-1.0.jar", b"one")
            .await
            .unwrap();
        f.repo
            .write_atomic("com/example/lib/1.1/lib-1.1.jar", b"two")
            .await
            .unwrap();

        let first = f
            .service
            .regenerate("storage0", "releases", None, false)
            .await
            .unwrap();
        assert_eq!(first.succeeded, 2);
        assert_eq!(first.metadata_written, 1);
        assert_eq!(first.failed, 0);

        let metadata = f.repo.read("com/example/lib/maven-metadata.xml").await.unwrap();
        let text = String::from_utf8(metadata.to_vec()).unwrap();
        assert!(text.contains("<release>1.1</release>"));
        assert!(f.repo.exists("com/example/lib/maven-metadata.xml.sha1").await.unwrap());

        let before = std::fs::metadata(
            f.repo
                .paths()
                .artifact("com/example/lib/maven-metadata.xml")
                .unwrap(),
        )
        .unwrap()
        .modified()
        .unwrap();

        let second = f
            .service
            .regenerate("storage0", "releases", None, false)
            .await
            .unwrap();
        assert!(second.is_noop(), "second run changed files: {:?}", second);
        assert_eq!(second.skipped, 3);

        let after = std::fs::metadata(
            f.repo
                .paths()
                .artifact("com/example/lib/maven-metadata.xml")
                .unwrap(),
        )
        .unwrap()
        .modified()
        .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_force_rewrites_everything() {
        let f = fixture("maven").await;
        f.repo
            .write_atomic("com/example/lib/1.0/lib-1.0.jar", b"one")
            .await
            .unwrap();
        f.service
            .regenerate("storage0", "releases", None, false)
            .await
            .unwrap();

        let forced = f
            .service
            .regenerate("storage0", "releases", None, true)
            .await
            .unwrap();
        assert_eq!(forced.metadata_written, 1);
        assert_eq!(forced.succeeded, 1);
    }

    #[tokio::test]
    async fn test_base_path_sees_whole_artifact() {
        let f = fixture("maven").await;
        f.repo
            .write_atomic("com/example/lib/1.0/lib-1.0.jar", b"one")
            .await
            .unwrap();
        f.repo
            .write_atomic("com/example/lib/2.0/lib-2.0.jar", b"two")
            .await
            .unwrap();

        let report = f
            .service
            .regenerate_path("storage0", "releases", "com/example/lib/2.0", false)
            .await
            .unwrap();
        // Only the file under the base path gets side files
        assert_eq!(report.succeeded, 1);
        assert!(!f.repo.exists("com/example/lib/1.0/lib-1.0.jar.sha1").await.unwrap());

        let text = String::from_utf8(
            f.repo
                .read("com/example/lib/maven-metadata.xml")
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap();
        assert!(text.contains("<version>1.0</version>"));
        assert!(text.contains("<version>2.0</version>"));
    }

    #[tokio::test]
    async fn test_stale_metadata_removed() {
        let f = fixture("nuget").await;
        f.repo
            .write_atomic("serilog/3.1.1/serilog.3.1.1.nupkg", b"pkg")
            .await
            .unwrap();
        f.service
            .regenerate("storage0", "releases", None, false)
            .await
            .unwrap();
        assert!(f.repo.exists("serilog/index.json").await.unwrap());

        std::fs::remove_file(
            f.repo
                .paths()
                .artifact("serilog/3.1.1/serilog.3.1.1.nupkg")
                .unwrap(),
        )
        .unwrap();
        let report = f
            .service
            .refresh_metadata("storage0", "releases", "serilog/3.1.1/serilog.3.1.1.nupkg")
            .await
            .unwrap();
        assert_eq!(report.metadata_removed, 1);
        assert!(!f.repo.exists("serilog/index.json").await.unwrap());
        assert!(!f.repo.exists("serilog/index.json.sha512").await.unwrap());
    }

    #[tokio::test]
    async fn test_failures_are_recorded_and_walk_continues() {
        let f = fixture("raw").await;
        f.repo.write_atomic("a.bin", b"a").await.unwrap();
        f.repo.write_atomic("b.bin", b"b").await.unwrap();
        // A directory where a side file should go makes that write fail
        std::fs::create_dir_all(f.repo.paths().artifact("a.bin.md5").unwrap().join("x")).unwrap();

        let report = f
            .service
            .regenerate("storage0", "releases", None, false)
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].path, "a.bin");
        assert_eq!(report.succeeded, 1);
        assert!(f.repo.exists("b.bin.sha256").await.unwrap());
    }

    #[tokio::test]
    async fn test_artifact_entries_upserted() {
        let f = fixture("raw").await;
        f.repo.write_atomic("tools/a.bin", b"hello").await.unwrap();
        f.service
            .regenerate("storage0", "releases", None, false)
            .await
            .unwrap();

        let layout = LayoutRegistry::with_core_layouts().require("raw").unwrap();
        let entry = f
            .store
            .find(
                &RepositoryKey::new("storage0", "releases"),
                &layout.parse("tools/a.bin").unwrap(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.size_bytes, 5);
        assert_eq!(
            entry.checksums.get(DigestAlgorithm::Sha1),
            Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
        );
    }

    #[tokio::test]
    async fn test_unknown_storage_is_config_error() {
        let f = fixture("raw").await;
        assert!(matches!(
            f.service.regenerate_storage("nope", false).await,
            Err(AppError::Config(_))
        ));
        assert!(f.service.regenerate_storage("storage0", false).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_file_requires_matching_lock() {
        let f = fixture("raw").await;
        let key = RepositoryKey::new("storage0", "releases");

        let other = f.service.lock_path(&key, "tools/b.bin").await;
        let err = f
            .service
            .store_file(&other, "storage0", "releases", "tools/a.bin", b"a")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!f.repo.exists("tools/a.bin").await.unwrap());
        drop(other);

        let lock = f.service.lock_path(&key, "tools/a.bin").await;
        let checksums = f
            .service
            .store_file(&lock, "storage0", "releases", "tools/a.bin", b"a")
            .await
            .unwrap();
        drop(lock);
        assert_eq!(
            checksums.get(DigestAlgorithm::Sha1),
            Some("86f7e437faa5a7fce15d1ddcb9eaeaea377667b8")
        );
        assert!(f.repo.exists("tools/a.bin.sha1").await.unwrap());
        assert!(f.service.path_locks().is_empty());
    }
}
