//! Filesystem access for one repository.
//!
//! All writes land in `.temp/` first and are renamed into place, so readers
//! either see the previous file or the complete new one.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::path_resolver::{RepositoryPaths, RESERVED_DIRS};
use crate::error::{AppError, Result};
use crate::models::checksum::DigestAlgorithm;

/// Temp file that is deleted on drop unless persisted.
pub struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    /// Create an empty temp file inside the repository's temp area.
    pub async fn create(paths: &RepositoryPaths) -> Result<(Self, fs::File)> {
        let path = paths.temp_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = fs::File::create(&path).await?;
        Ok((
            Self {
                path,
                persisted: false,
            },
            file,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically move the temp file to `destination`.
    pub async fn persist(mut self, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&self.path, destination).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Files found by a repository walk.
#[derive(Debug, Default)]
pub struct FileListing {
    /// Relative paths, `/`-separated, sorted.
    pub files: Vec<String>,
    /// Entries that could not be read: (path, cause).
    pub errors: Vec<(String, String)>,
}

/// Filesystem operations scoped to one repository.
#[derive(Debug, Clone)]
pub struct RepositoryFilesystem {
    paths: RepositoryPaths,
}

impl RepositoryFilesystem {
    pub fn new(paths: RepositoryPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &RepositoryPaths {
        &self.paths
    }

    pub async fn exists(&self, relative_path: &str) -> Result<bool> {
        let path = self.paths.artifact(relative_path)?;
        Ok(is_file(&path).await?)
    }

    pub async fn read(&self, relative_path: &str) -> Result<Bytes> {
        let path = self.paths.artifact(relative_path)?;
        let content = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("File not found: {}", relative_path))
            } else {
                AppError::Io(e)
            }
        })?;
        Ok(Bytes::from(content))
    }

    /// Write `content` to `relative_path` through a temp file.
    pub async fn write_atomic(&self, relative_path: &str, content: &[u8]) -> Result<()> {
        let destination = self.paths.artifact(relative_path)?;
        write_atomic(&self.paths, &destination, content).await
    }

    /// Every regular file under `prefix` (or the whole repository), skipping
    /// reserved areas. Unreadable entries are reported, not fatal.
    pub async fn walk(&self, prefix: Option<&str>) -> Result<FileListing> {
        let base = self.paths.base_dir().to_path_buf();
        let root = match prefix {
            Some(p) => self.paths.artifact(p)?,
            None => base.clone(),
        };

        tokio::task::spawn_blocking(move || walk_sync(&base, &root))
            .await
            .map_err(|e| AppError::Internal(format!("Directory walk failed: {}", e)))
    }

    /// Artifact and metadata files, without checksum side files.
    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let listing = self.walk(prefix).await?;
        Ok(listing
            .files
            .into_iter()
            .filter(|f| !DigestAlgorithm::is_side_file(f))
            .collect())
    }
}

/// Write `content` to `destination` via a temp file in the repository.
pub async fn write_atomic(paths: &RepositoryPaths, destination: &Path, content: &[u8]) -> Result<()> {
    let (temp, mut file) = TempFile::create(paths).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);
    temp.persist(destination).await
}

const MOVE_ATTEMPTS: usize = 8;

/// Rename `from` to `to`, creating the parent directories of `to`.
///
/// A concurrent trash purge may remove the parents between their creation
/// and the rename; the move is retried while `from` still exists.
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    let mut attempt = 1;
    loop {
        let e = match rename_creating_parents(from, to).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let retry = e.kind() == std::io::ErrorKind::NotFound
            && attempt < MOVE_ATTEMPTS
            && fs::try_exists(from).await.unwrap_or(false);
        if !retry {
            return Err(AppError::Io(e));
        }
        tracing::debug!(
            to = %to.display(),
            attempt,
            "Destination parent vanished during move, retrying"
        );
        attempt += 1;
    }
}

async fn rename_creating_parents(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(from, to).await
}

/// Whether `path` is an existing regular file.
pub async fn is_file(path: &Path) -> std::io::Result<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn walk_sync(base: &Path, root: &Path) -> FileListing {
    let mut listing = FileListing::default();
    if !root.exists() {
        return listing;
    }

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_reserved(base, entry.path()));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if let Some(relative) = relative_path(base, entry.path()) {
                    listing.files.push(relative);
                }
            }
            Ok(_) => {}
            Err(e) => {
                let path = e
                    .path()
                    .and_then(|p| relative_path(base, p))
                    .unwrap_or_default();
                listing.errors.push((path, e.to_string()));
            }
        }
    }

    listing.files.sort();
    listing
}

fn is_reserved(base: &Path, path: &Path) -> bool {
    path.parent() == Some(base)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| RESERVED_DIRS.contains(&n))
            .unwrap_or(false)
}

fn relative_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, RepositoryFilesystem) {
        let dir = TempDir::new().unwrap();
        let paths = RepositoryPaths::new(dir.path().join("releases"));
        paths.ensure_directory_structure().await.unwrap();
        (dir, RepositoryFilesystem::new(paths))
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (_dir, repo) = setup().await;
        repo.write_atomic("com/x/1.0/x-1.0.jar", b"jar bytes")
            .await
            .unwrap();

        assert!(repo.exists("com/x/1.0/x-1.0.jar").await.unwrap());
        assert_eq!(
            repo.read("com/x/1.0/x-1.0.jar").await.unwrap(),
            Bytes::from_static(b"jar bytes")
        );
        // Temp area is empty after the rename
        let leftovers = std::fs::read_dir(repo.paths().temp_root()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, repo) = setup().await;
        assert!(matches!(
            repo.read("missing.bin").await,
            Err(AppError::NotFound(_))
        ));
        assert!(!repo.exists("missing.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_skips_reserved_and_side_files() {
        let (_dir, repo) = setup().await;
        repo.write_atomic("a/b.jar", b"1").await.unwrap();
        repo.write_atomic("a/b.jar.sha1", b"2").await.unwrap();
        repo.write_atomic("c.txt", b"3").await.unwrap();
        std::fs::write(repo.paths().trash_root().join("old.jar"), b"4").unwrap();
        std::fs::write(repo.paths().index_root().join("segments"), b"5").unwrap();

        assert_eq!(repo.list(None).await.unwrap(), vec!["a/b.jar", "c.txt"]);
        assert_eq!(repo.list(Some("a")).await.unwrap(), vec!["a/b.jar"]);

        let listing = repo.walk(None).await.unwrap();
        assert_eq!(listing.files, vec!["a/b.jar", "a/b.jar.sha1", "c.txt"]);
        assert!(listing.errors.is_empty());
    }

    #[tokio::test]
    async fn test_temp_file_removed_on_drop() {
        let (_dir, repo) = setup().await;
        let (temp, _file) = TempFile::create(repo.paths()).await.unwrap();
        let path = temp.path().to_path_buf();
        assert!(path.exists());
        drop(temp);
        assert!(!path.exists());
    }
}
