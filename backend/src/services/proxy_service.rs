//! Proxy repository caching.
//!
//! A cache miss triggers one remote fetch per `(storage, repository, path)`
//! no matter how many callers ask concurrently. The first caller registers
//! the fetch and spawns it; everyone else (including callers arriving while
//! the download is running) waits on the same `watch` channel and receives
//! the same outcome. The fetch runs in its own task, so a caller that gives
//! up never strands the others.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::checksum::DigestAlgorithm;
use crate::models::repository::{
    RemoteRepository, RepositoryDescriptor, RepositoryKey, RepositoryType,
};
use crate::services::metadata_service::MetadataService;
use crate::services::remote_client::{RemoteClient, RemoteResponse};
use crate::storage::filesystem::{is_file, TempFile};
use crate::storage::path_resolver::RepositoryPaths;

/// Identity of one remote fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub repository: RepositoryKey,
    pub path: String,
}

/// Error kinds that survive being shared between waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureKind {
    Transport,
    Timeout,
    InvalidPath,
    Io,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FetchFailureKind,
    pub message: String,
}

impl From<AppError> for FetchFailure {
    fn from(error: AppError) -> Self {
        let kind = match &error {
            AppError::Transport(_) => FetchFailureKind::Transport,
            AppError::Timeout(_) => FetchFailureKind::Timeout,
            AppError::InvalidPath(_) => FetchFailureKind::InvalidPath,
            AppError::Io(_) => FetchFailureKind::Io,
            _ => FetchFailureKind::Internal,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

impl From<FetchFailure> for AppError {
    fn from(failure: FetchFailure) -> Self {
        match failure.kind {
            FetchFailureKind::Transport => AppError::Transport(failure.message),
            FetchFailureKind::Timeout => AppError::Timeout(failure.message),
            FetchFailureKind::InvalidPath => AppError::InvalidPath(failure.message),
            FetchFailureKind::Io => AppError::Io(std::io::Error::other(failure.message)),
            FetchFailureKind::Internal => AppError::Internal(failure.message),
        }
    }
}

/// Outcome broadcast to every caller of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file is in the local cache at this location.
    Cached(PathBuf),
    /// The remote does not have the file.
    Missing,
    Failed(FetchFailure),
}

type InFlight = Arc<Mutex<HashMap<FetchKey, watch::Receiver<Option<FetchOutcome>>>>>;

/// Removes an in-flight entry when the fetch task ends, however it ends.
struct InFlightGuard {
    registry: InFlight,
    key: FetchKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct ProxyService {
    remote: Arc<dyn RemoteClient>,
    metadata: Arc<MetadataService>,
    default_timeout: Duration,
    in_flight: InFlight,
}

impl ProxyService {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        metadata: Arc<MetadataService>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            metadata,
            default_timeout,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Local path of `path` in a proxy repository, fetching it from the
    /// remote on a cache miss. `None` when the remote does not have it.
    pub async fn fetch(
        &self,
        descriptor: &RepositoryDescriptor,
        path: &str,
    ) -> Result<Option<PathBuf>> {
        if descriptor.repo_type != RepositoryType::Proxy {
            return Err(AppError::Validation(format!(
                "Repository {} is not a proxy",
                descriptor.key
            )));
        }

        let paths = RepositoryPaths::for_descriptor(descriptor);
        let destination = paths.artifact(path)?;
        if is_file(&destination).await? {
            debug!(repository = %descriptor.key, path, "Proxy cache hit");
            return Ok(Some(destination));
        }

        let key = FetchKey {
            repository: descriptor.key.clone(),
            path: path.to_string(),
        };
        let mut receiver = self.join_or_start(descriptor, key, paths, destination)?;

        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| AppError::Internal(format!("Remote fetch of {} was aborted", path)))?
            .clone();

        match outcome {
            Some(FetchOutcome::Cached(location)) => Ok(Some(location)),
            Some(FetchOutcome::Missing) | None => Ok(None),
            Some(FetchOutcome::Failed(failure)) => Err(failure.into()),
        }
    }

    /// Number of fetches currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn join_or_start(
        &self,
        descriptor: &RepositoryDescriptor,
        key: FetchKey,
        paths: RepositoryPaths,
        destination: PathBuf,
    ) -> Result<watch::Receiver<Option<FetchOutcome>>> {
        let remote_config = descriptor.remote.clone().ok_or_else(|| {
            AppError::Config(format!("Proxy {} has no remote configured", descriptor.key))
        })?;

        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(receiver) = in_flight.get(&key) {
            debug!(repository = %key.repository, path = %key.path, "Joining in-flight fetch");
            return Ok(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        in_flight.insert(key.clone(), receiver.clone());
        drop(in_flight);

        let guard = InFlightGuard {
            registry: self.in_flight.clone(),
            key: key.clone(),
        };
        let remote = self.remote.clone();
        let metadata = self.metadata.clone();
        let timeout = remote_config.timeout(self.default_timeout);

        tokio::spawn(async move {
            let guard = guard;
            let fetch = download(
                remote.as_ref(),
                &remote_config,
                &key.path,
                &paths,
                &destination,
                timeout,
            );
            let result = tokio::time::timeout(timeout, fetch).await;
            let outcome = match result {
                Ok(Ok(true)) => {
                    if !DigestAlgorithm::is_side_file(&key.path) {
                        if let Err(e) = metadata
                            .refresh_file(
                                &key.repository.storage_id,
                                &key.repository.repository_id,
                                &key.path,
                            )
                            .await
                        {
                            warn!(
                                repository = %key.repository,
                                path = %key.path,
                                error = %e,
                                "Checksum generation for cached file failed"
                            );
                        }
                    }
                    FetchOutcome::Cached(destination)
                }
                Ok(Ok(false)) => FetchOutcome::Missing,
                Ok(Err(e)) => {
                    warn!(repository = %key.repository, path = %key.path, error = %e, "Remote fetch failed");
                    FetchOutcome::Failed(e.into())
                }
                Err(_) => {
                    warn!(repository = %key.repository, path = %key.path, "Remote fetch timed out");
                    FetchOutcome::Failed(FetchFailure {
                        kind: FetchFailureKind::Timeout,
                        message: format!(
                            "Fetching {} from {} exceeded {:?}",
                            key.path, key.repository, timeout
                        ),
                    })
                }
            };
            // Publish before deregistering: a caller joining in between
            // reads the outcome instead of starting a second fetch
            sender.send_replace(Some(outcome));
            drop(guard);
        });

        Ok(receiver)
    }
}

/// Stream `path` from the remote into the cache. Returns false when the
/// remote does not have it.
async fn download(
    remote: &dyn RemoteClient,
    remote_config: &RemoteRepository,
    path: &str,
    paths: &RepositoryPaths,
    destination: &Path,
    timeout: Duration,
) -> Result<bool> {
    // A fetch that finished just before this one was registered
    if is_file(destination).await? {
        return Ok(true);
    }

    let mut body = match remote.get(remote_config, path, timeout).await? {
        RemoteResponse::Found(body) => body,
        RemoteResponse::NotFound => {
            debug!(path, "Remote does not have artifact");
            return Ok(false);
        }
    };

    let (temp, mut file) = TempFile::create(paths).await?;
    let mut size = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.sync_all().await?;
    drop(file);
    temp.persist(destination).await?;

    info!(path, size_bytes = size, "Cached remote artifact");
    Ok(true)
}
