//! Route definitions.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::access::access_middleware;
use super::SharedState;

/// Create the main application router
pub fn create_router(state: SharedState) -> Router {
    let protected = Router::new()
        .route(
            "/storages/:storage/:repo/*path",
            get(handlers::artifacts::download)
                .put(handlers::artifacts::deploy)
                .delete(handlers::artifacts::delete),
        )
        .route("/api/trash", delete(handlers::maintenance::purge_all_trash))
        .route(
            "/api/trash/:storage/:repo",
            delete(handlers::maintenance::purge_trash),
        )
        .route(
            "/api/trash/:storage/:repo/*path",
            post(handlers::maintenance::undelete),
        )
        .route("/api/regenerate", post(handlers::maintenance::regenerate))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(protected)
        // Uploads have no size limit
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
