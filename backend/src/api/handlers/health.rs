//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::SharedState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub repositories: usize,
    pub in_flight_fetches: usize,
}

/// Liveness check with a few counters from the running depot.
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let snapshot = state.services.configuration.snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            repositories: snapshot.repositories().count(),
            in_flight_fetches: state.services.proxy.in_flight_count(),
        },
    })
}
