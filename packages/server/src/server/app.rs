//! Application setup and server configuration.

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    cancel_source_handler, health_handler, list_sources_handler, run_harvest_handler,
    run_source_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps) -> Router {
    let state = AppState { deps };

    Router::new()
        .route("/health", get(health_handler))
        .route("/harvest/run", post(run_harvest_handler))
        .route("/harvest/sources", get(list_sources_handler))
        .route("/harvest/sources/:source/run", post(run_source_handler))
        .route("/harvest/sources/:source/cancel", post(cancel_source_handler))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
