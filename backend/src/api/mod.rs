//! API module - HTTP handlers and middleware.

pub mod download_response;
pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;
use crate::services::DepotServices;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub services: DepotServices,
}

impl AppState {
    pub fn new(config: Config, services: DepotServices) -> Self {
        Self { config, services }
    }
}

pub type SharedState = Arc<AppState>;
