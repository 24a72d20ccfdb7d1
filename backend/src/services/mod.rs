//! Business logic services.

pub mod access_policy;
pub mod artifact_service;
pub mod artifact_store;
pub mod checksum_service;
pub mod configuration_service;
pub mod metadata_service;
pub mod path_lock;
pub mod proxy_service;
pub mod remote_client;
pub mod resolution_service;
pub mod routing_service;
pub mod scheduler_service;
pub mod trash_service;

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::formats::LayoutRegistry;
use crate::storage::path_resolver::{PathResolver, RepositoryPaths};

use access_policy::AccessPolicy;
use artifact_service::ArtifactService;
use artifact_store::ArtifactStore;
use configuration_service::{ConfigurationService, ConfigurationSnapshot};
use metadata_service::MetadataService;
use proxy_service::ProxyService;
use remote_client::RemoteClient;
use resolution_service::ResolutionService;
use routing_service::RoutingService;
use trash_service::TrashService;

/// Every service of a running depot, wired once at startup.
#[derive(Clone)]
pub struct DepotServices {
    pub configuration: Arc<ConfigurationService>,
    pub layouts: Arc<LayoutRegistry>,
    pub store: Arc<dyn ArtifactStore>,
    pub paths: Arc<PathResolver>,
    pub routing: Arc<RoutingService>,
    pub metadata: Arc<MetadataService>,
    pub proxy: Arc<ProxyService>,
    pub resolution: Arc<ResolutionService>,
    pub trash: Arc<TrashService>,
    pub artifacts: Arc<ArtifactService>,
    pub access: Arc<dyn AccessPolicy>,
}

impl DepotServices {
    pub fn new(
        configuration: Arc<ConfigurationService>,
        layouts: Arc<LayoutRegistry>,
        store: Arc<dyn ArtifactStore>,
        remote: Arc<dyn RemoteClient>,
        access: Arc<dyn AccessPolicy>,
        proxy_timeout: Duration,
    ) -> Self {
        let paths = Arc::new(PathResolver::new(configuration.clone()));
        let routing = Arc::new(RoutingService::new(configuration.clone()));
        let metadata = Arc::new(MetadataService::new(
            configuration.clone(),
            layouts.clone(),
            store.clone(),
        ));
        let proxy = Arc::new(ProxyService::new(remote, metadata.clone(), proxy_timeout));
        let resolution = Arc::new(ResolutionService::new(configuration.clone(), proxy.clone()));
        let trash = Arc::new(TrashService::new(
            configuration.clone(),
            layouts.clone(),
            store.clone(),
            metadata.path_locks(),
        ));
        let artifacts = Arc::new(ArtifactService::new(
            configuration.clone(),
            layouts.clone(),
            resolution.clone(),
            metadata.clone(),
            trash.clone(),
            store.clone(),
        ));

        Self {
            configuration,
            layouts,
            store,
            paths,
            routing,
            metadata,
            proxy,
            resolution,
            trash,
            artifacts,
            access,
        }
    }

    /// Create the directory structure of every repository that holds files.
    pub async fn ensure_directories(&self) -> Result<()> {
        let snapshot = self.configuration.snapshot();
        for descriptor in snapshot.repositories().filter(|d| d.repo_type.has_storage()) {
            RepositoryPaths::for_descriptor(descriptor)
                .ensure_directory_structure()
                .await?;
        }
        Ok(())
    }

    /// Swap in a new configuration and prepare the directories it names.
    pub async fn replace_configuration(&self, snapshot: ConfigurationSnapshot) -> Result<()> {
        self.configuration.replace(snapshot)?;
        self.ensure_directories().await
    }
}
