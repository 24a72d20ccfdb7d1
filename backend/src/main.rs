//! Artifact Depot - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use artifact_depot_backend::{
    api::{self, AppState},
    config::{Config, DepotConfiguration},
    error::Result,
    formats::LayoutRegistry,
    services::{
        access_policy::ConfiguredAccessPolicy,
        artifact_store::InMemoryArtifactStore,
        configuration_service::ConfigurationService,
        remote_client::HttpRemoteClient,
        scheduler_service, DepotServices,
    },
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_format);
    tracing::info!("Starting Artifact Depot");

    let document = match &config.depot_config_path {
        Some(path) => {
            tracing::info!("Loading repository configuration from {}", path.display());
            DepotConfiguration::load(path)?
        }
        None => {
            tracing::warn!("DEPOT_CONFIG not set, starting without repositories");
            DepotConfiguration::default()
        }
    };

    let layouts = Arc::new(LayoutRegistry::with_core_layouts());
    let snapshot = document.to_snapshot(&config, &layouts)?;
    let configuration = Arc::new(ConfigurationService::new(snapshot)?);

    let services = DepotServices::new(
        configuration,
        layouts,
        Arc::new(InMemoryArtifactStore::new()),
        Arc::new(HttpRemoteClient::new()?),
        Arc::new(ConfiguredAccessPolicy::new(document.access.clone())),
        config.proxy_timeout(),
    );
    services.ensure_directories().await?;
    tracing::info!(
        "Serving {} repositories",
        services.configuration.snapshot().repositories().count()
    );

    let jobs = scheduler_service::spawn_all(
        &document.jobs,
        services.metadata.clone(),
        services.trash.clone(),
    );

    let addr: SocketAddr = config.bind_address.parse()?;
    let state = Arc::new(AppState::new(config, services));
    let app = api::routes::create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for job in jobs {
        job.abort();
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
