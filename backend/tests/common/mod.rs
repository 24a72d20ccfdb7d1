//! Common test utilities for backend integration tests
//!
//! This module provides shared infrastructure for testing:
//! - A depot over a temporary storage root, built from a JSON document
//! - A scripted remote that counts the requests it receives

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::TempDir;

use artifact_depot_backend::api::{routes, AppState};
use artifact_depot_backend::config::{Config, DepotConfiguration};
use artifact_depot_backend::error::{AppError, Result};
use artifact_depot_backend::formats::LayoutRegistry;
use artifact_depot_backend::models::repository::RemoteRepository;
use artifact_depot_backend::services::access_policy::ConfiguredAccessPolicy;
use artifact_depot_backend::services::artifact_store::InMemoryArtifactStore;
use artifact_depot_backend::services::configuration_service::{
    ConfigurationService, ConfigurationSnapshot,
};
use artifact_depot_backend::services::remote_client::{RemoteClient, RemoteResponse};
use artifact_depot_backend::services::DepotServices;

/// What the fake remote does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMode {
    Serve,
    Fail,
}

/// Remote serving a fixed set of files after an optional delay.
pub struct FakeRemote {
    files: Mutex<HashMap<String, Bytes>>,
    mode: Mutex<RemoteMode>,
    delay: Duration,
    requests: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            mode: Mutex::new(RemoteMode::Serve),
            delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_file(self, path: &str, content: &'static [u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from_static(content));
        self
    }

    pub fn set_mode(&self, mode: RemoteMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn get(
        &self,
        remote: &RemoteRepository,
        path: &str,
        _timeout: Duration,
    ) -> Result<RemoteResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *self.mode.lock().unwrap() == RemoteMode::Fail {
            return Err(AppError::Transport(format!("{} refused connection", remote.url)));
        }
        let content = self.files.lock().unwrap().get(path).cloned();
        Ok(match content {
            Some(content) => {
                RemoteResponse::Found(futures::stream::once(async move { Ok(content) }).boxed())
            }
            None => RemoteResponse::NotFound,
        })
    }
}

/// A depot rooted in a temporary directory.
pub struct TestDepot {
    pub dir: TempDir,
    pub config: Config,
    pub services: DepotServices,
    pub remote: Arc<FakeRemote>,
}

impl TestDepot {
    pub async fn new(document: &str) -> Self {
        Self::with_remote(document, FakeRemote::new()).await
    }

    pub async fn with_remote(document: &str, remote: FakeRemote) -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config {
            storage_root: dir.path().to_path_buf(),
            proxy_timeout_secs: 5,
            ..Config::default()
        };
        let layouts = Arc::new(LayoutRegistry::with_core_layouts());
        let document = DepotConfiguration::from_json(document).unwrap();
        let snapshot = document.to_snapshot(&config, &layouts).unwrap();
        let remote = Arc::new(remote);

        let services = DepotServices::new(
            Arc::new(ConfigurationService::new(snapshot).unwrap()),
            layouts,
            Arc::new(InMemoryArtifactStore::new()),
            remote.clone(),
            Arc::new(ConfiguredAccessPolicy::new(document.access.clone())),
            config.proxy_timeout(),
        );
        services.ensure_directories().await.unwrap();

        Self {
            dir,
            config,
            services,
            remote,
        }
    }

    /// Parse another document against this depot's storage root.
    pub fn snapshot(&self, document: &str) -> ConfigurationSnapshot {
        DepotConfiguration::from_json(document)
            .unwrap()
            .to_snapshot(&self.config, &self.services.layouts)
            .unwrap()
    }

    /// On-disk location of `path` in `storage0/<repo>`.
    pub fn file(&self, repo: &str, path: &str) -> PathBuf {
        self.dir.path().join("storage0").join(repo).join(path)
    }

    pub fn put(&self, repo: &str, path: &str, content: &[u8]) {
        let file = self.file(repo, path);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, content).unwrap();
    }

    /// Wait until every finished proxy fetch has deregistered.
    pub async fn proxy_idle(&self) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.services.proxy.in_flight_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    pub fn router(&self) -> axum::Router {
        routes::create_router(Arc::new(AppState::new(
            self.config.clone(),
            self.services.clone(),
        )))
    }
}
