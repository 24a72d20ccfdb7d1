//! Checksum side files.
//!
//! A side file `<artifact>.<ext>` holds the lowercase hex digest of the
//! artifact. Side files are only ever written through a temp file and a
//! rename, so a reader never sees a partial digest.

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{AppError, Result};
use crate::models::checksum::{ChecksumSet, DigestAlgorithm};
use crate::storage::filesystem::{is_file, RepositoryFilesystem};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// What happened to the side files of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideFileOutcome {
    /// At least one side file was (re)written.
    Written { checksums: ChecksumSet, count: usize },
    /// Every side file already existed and regeneration was not forced.
    Skipped,
}

/// Compute every requested digest in a single streaming pass over `path`.
pub async fn compute_file(path: &Path, algorithms: &[DigestAlgorithm]) -> Result<ChecksumSet> {
    let mut file = fs::File::open(path).await?;
    let mut hashers: Vec<_> = algorithms.iter().map(|a| (*a, a.hasher())).collect();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buffer[..read]);
        }
    }

    let mut set = ChecksumSet::new();
    for (algorithm, hasher) in hashers {
        set.insert(algorithm, hasher.finalize_hex());
    }
    Ok(set)
}

/// Parse a side file body: the first token, lowercased. Some tools append
/// the file name after the digest.
pub fn parse_side_file_content(content: &str) -> Option<String> {
    content
        .split_whitespace()
        .next()
        .filter(|token| token.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_ascii_lowercase)
}

/// Read the digest stored in a side file, if present and well-formed.
pub async fn read_side_file(
    repository: &RepositoryFilesystem,
    relative_path: &str,
    algorithm: DigestAlgorithm,
) -> Result<Option<String>> {
    let path = repository
        .paths()
        .artifact(&algorithm.side_file(relative_path))?;
    match fs::read_to_string(&path).await {
        Ok(content) => Ok(parse_side_file_content(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Read every side file of `relative_path` that exists.
pub async fn read_side_files(
    repository: &RepositoryFilesystem,
    relative_path: &str,
    algorithms: &[DigestAlgorithm],
) -> Result<ChecksumSet> {
    let mut set = ChecksumSet::new();
    for algorithm in algorithms {
        if let Some(digest) = read_side_file(repository, relative_path, *algorithm).await? {
            set.insert(*algorithm, digest);
        }
    }
    Ok(set)
}

/// Bring the side files of one file up to date.
///
/// Without `force` only missing side files are written and the file is not
/// read at all when none are missing.
pub async fn regenerate_side_files(
    repository: &RepositoryFilesystem,
    relative_path: &str,
    algorithms: &[DigestAlgorithm],
    force: bool,
) -> Result<SideFileOutcome> {
    let artifact = repository.paths().artifact(relative_path)?;

    let mut targets = Vec::with_capacity(algorithms.len());
    for algorithm in algorithms {
        let side_file = repository
            .paths()
            .artifact(&algorithm.side_file(relative_path))?;
        if force || !is_file(&side_file).await? {
            targets.push(*algorithm);
        }
    }

    if targets.is_empty() {
        return Ok(SideFileOutcome::Skipped);
    }

    let checksums = compute_file(&artifact, &targets).await?;
    for (algorithm, digest) in checksums.iter() {
        repository
            .write_atomic(&algorithm.side_file(relative_path), digest.as_bytes())
            .await?;
    }

    Ok(SideFileOutcome::Written {
        count: checksums.len(),
        checksums,
    })
}

/// Remove every side file of `relative_path`. Missing side files are ignored.
pub async fn remove_side_files(repository: &RepositoryFilesystem, relative_path: &str) -> Result<()> {
    for algorithm in DigestAlgorithm::ALL {
        let path = repository
            .paths()
            .artifact(&algorithm.side_file(relative_path))?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AppError::Io(e)),
        }
    }
    Ok(())
}
