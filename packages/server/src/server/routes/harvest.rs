//! Manual harvest triggers.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use harvester::HarvestError;
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    source: String,
    cancelled: bool,
}

#[derive(Serialize)]
pub struct SourcesResponse {
    sources: Vec<String>,
    active: Vec<String>,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

/// `POST /harvest/run`: run every source once and return the per-source results.
///
/// 409 Conflict while another run holds the orchestrator.
pub async fn run_harvest_handler(Extension(state): Extension<AppState>) -> Response {
    tracing::info!("Manual harvest requested");
    match state.deps.orchestrator.try_run().await {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(e @ HarvestError::AlreadyRunning) => error(StatusCode::CONFLICT, e.to_string()),
        Err(e) => {
            tracing::error!("Manual harvest failed: {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `POST /harvest/sources/:source/run`: harvest one source.
///
/// 404 for an unregistered source, 409 while another run is in progress.
pub async fn run_source_handler(
    Extension(state): Extension<AppState>,
    Path(source): Path<String>,
) -> Response {
    tracing::info!(source = %source, "Manual source harvest requested");
    match state.deps.orchestrator.try_run_source(&source).await {
        Ok(Some(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(None) => error(StatusCode::NOT_FOUND, format!("unknown source {}", source)),
        Err(e @ HarvestError::AlreadyRunning) => error(StatusCode::CONFLICT, e.to_string()),
        Err(e) => {
            tracing::error!(source = %source, "Manual source harvest failed: {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `POST /harvest/sources/:source/cancel`
pub async fn cancel_source_handler(
    Extension(state): Extension<AppState>,
    Path(source): Path<String>,
) -> Response {
    if state.deps.orchestrator.cancel_source(&source) {
        (
            StatusCode::ACCEPTED,
            Json(CancelResponse {
                source,
                cancelled: true,
            }),
        )
            .into_response()
    } else {
        error(StatusCode::NOT_FOUND, format!("source {} is not running", source))
    }
}

/// `GET /harvest/sources`: registered sources and the ones harvesting now.
pub async fn list_sources_handler(Extension(state): Extension<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.deps.orchestrator.sources(),
        active: state.deps.orchestrator.active_sources(),
    })
}
