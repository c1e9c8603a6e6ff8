//! HTTP server setup: middleware, CORS, and graceful shutdown.

use super::handlers::{create_router, AppState};
use crate::application::ServiceContainer;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use vaultqa_core::{Result, VaultQaError};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 120,
            enable_cors: false,
        }
    }
}

pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, container: Arc<ServiceContainer>) -> Self {
        Self {
            config,
            state: AppState::new(container),
        }
    }

    pub fn build_router(&self) -> axum::Router {
        let middleware = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeout_seconds,
            )));

        let mut app = create_router(self.state.clone()).layer(middleware);
        if self.config.enable_cors {
            app = app.layer(CorsLayer::permissive());
        }
        app
    }

    /// Serve until ctrl-c; in-flight requests drain before shutdown.
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| {
                VaultQaError::configuration(format!("invalid listen address: {}", e))
            })?;

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            VaultQaError::configuration(format!("cannot bind {}: {}", addr, e))
        })?;
        info!(%addr, "http server listening");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| VaultQaError::internal(format!("http server error: {}", e)))
    }
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_err() {
        return;
    }
    info!("shutdown signal received, draining in-flight requests");
}
