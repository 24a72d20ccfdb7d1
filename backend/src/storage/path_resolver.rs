//! Logical → physical path translation.
//!
//! Every repository keeps its contents under its base directory:
//!
//! ```text
//! <base>/<relative artifact path>
//! <base>/<relative artifact path>.<digest ext>
//! <base>/.trash/<relative artifact path>
//! <base>/.temp/<unique>.tmp
//! <base>/.index/...
//! ```
//!
//! The three dot-directories are reserved: they are never listed and a
//! relative path cannot address them.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs;

use crate::error::{AppError, Result};
use crate::models::repository::RepositoryDescriptor;
use crate::services::configuration_service::ConfigurationService;

pub const TRASH_DIR: &str = ".trash";
pub const TEMP_DIR: &str = ".temp";
pub const INDEX_DIR: &str = ".index";

pub const RESERVED_DIRS: [&str; 3] = [TRASH_DIR, TEMP_DIR, INDEX_DIR];

/// Reject relative paths that could escape the repository base directory or
/// address a reserved area.
pub fn validate_relative_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AppError::InvalidPath("empty path".to_string()));
    }
    if path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        return Err(AppError::InvalidPath(format!("path not allowed: {}", path)));
    }

    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(AppError::InvalidPath(format!(
                "unsafe path segment in: {}",
                path
            )));
        }
    }

    // Catches platform-specific prefixes the segment scan cannot see
    for component in Path::new(path).components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(AppError::InvalidPath(format!(
                "unsafe path component in: {}",
                path
            )));
        }
    }

    if let Some(first) = path.split('/').next() {
        if RESERVED_DIRS.contains(&first) {
            return Err(AppError::InvalidPath(format!(
                "reserved area not addressable: {}",
                path
            )));
        }
    }

    Ok(())
}

/// Physical locations of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPaths {
    base_dir: PathBuf,
}

impl RepositoryPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn for_descriptor(descriptor: &RepositoryDescriptor) -> Self {
        Self::new(descriptor.base_dir.clone())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Location of an artifact (or side file).
    pub fn artifact(&self, relative_path: &str) -> Result<PathBuf> {
        validate_relative_path(relative_path)?;
        Ok(self.base_dir.join(relative_path))
    }

    /// Location of the soft-deleted copy of an artifact.
    pub fn trash(&self, relative_path: &str) -> Result<PathBuf> {
        validate_relative_path(relative_path)?;
        Ok(self.trash_root().join(relative_path))
    }

    pub fn trash_root(&self) -> PathBuf {
        self.base_dir.join(TRASH_DIR)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.base_dir.join(TEMP_DIR)
    }

    pub fn index_root(&self) -> PathBuf {
        self.base_dir.join(INDEX_DIR)
    }

    /// A fresh, unique temp file location. Temp files live inside the
    /// repository so the final rename never crosses filesystems.
    pub fn temp_file(&self) -> PathBuf {
        self.temp_root()
            .join(format!("{}.tmp", uuid::Uuid::new_v4()))
    }

    /// Create base, trash, temp and index directories. Idempotent.
    pub async fn ensure_directory_structure(&self) -> Result<()> {
        for dir in [
            self.base_dir.clone(),
            self.trash_root(),
            self.temp_root(),
            self.index_root(),
        ] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

/// Resolves `(storage, repository, path)` against the current configuration.
pub struct PathResolver {
    configuration: Arc<ConfigurationService>,
}

impl PathResolver {
    pub fn new(configuration: Arc<ConfigurationService>) -> Self {
        Self { configuration }
    }

    pub fn repository_paths(&self, storage_id: &str, repository_id: &str) -> Result<RepositoryPaths> {
        let descriptor = self
            .configuration
            .repository_descriptor(storage_id, repository_id)?;
        Ok(RepositoryPaths::for_descriptor(&descriptor))
    }

    /// Physical location of `relative_path`. Pure: touches no files.
    pub fn resolve(&self, storage_id: &str, repository_id: &str, relative_path: &str) -> Result<PathBuf> {
        validate_relative_path(relative_path)?;
        self.repository_paths(storage_id, repository_id)?
            .artifact(relative_path)
    }
}
