//! HTTP route handlers.
//!
//! Translate between HTTP requests/responses and the application layer, and
//! map the error taxonomy onto status codes: invalid input is a bad
//! request naming the field, external-service failures are
//! service-unavailable, everything else is internal.

use crate::application::{AskRequest, IndexRequest, ServiceContainer};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;
use vaultqa_core::VaultQaError;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub container: Arc<ServiceContainer>,
}

impl AppState {
    pub fn new(container: Arc<ServiceContainer>) -> Self {
        Self { container }
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ask", post(ask))
        .route("/api/index", post(index))
        .route("/api/status", get(status))
        .route("/health", get(health))
        .with_state(state)
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Response, AppError> {
    let cancel = CancellationToken::new();
    let response = state.container.ask(request, &cancel).await?;
    Ok(Json(response).into_response())
}

async fn index(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> Result<Response, AppError> {
    let cancel = CancellationToken::new();
    let response = state.container.index(request, &cancel).await?;
    Ok(Json(response).into_response())
}

async fn status(State(state): State<AppState>) -> Result<Response, AppError> {
    let response = state.container.status().await?;
    Ok(Json(response).into_response())
}

async fn health(State(state): State<AppState>) -> Result<Response, AppError> {
    let response = state.container.health().await?;
    Ok(Json(response).into_response())
}

/// Error wrapper mapping the core taxonomy onto HTTP responses.
pub struct AppError(VaultQaError);

impl From<VaultQaError> for AppError {
    fn from(error: VaultQaError) -> Self {
        Self(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field) = match &self.0 {
            VaultQaError::InvalidInput { field, .. } => {
                (StatusCode::BAD_REQUEST, Some(field.clone()))
            }
            VaultQaError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
            VaultQaError::ExternalService { .. } | VaultQaError::EmbeddingOverflow { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, None)
            }
            VaultQaError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, None),
            VaultQaError::Configuration { .. }
            | VaultQaError::Database { .. }
            | VaultQaError::Serialization { .. }
            | VaultQaError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let body = serde_json::json!({
            "error": self.0.to_string(),
            "field": field,
        });
        (status, Json(body)).into_response()
    }
}
