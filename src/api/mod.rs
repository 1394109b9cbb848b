//! HTTP API
//!
//! - `POST /write`: Prometheus Remote Write
//! - `GET /health`, `GET /ready`: probes

pub mod ingest;
mod telemetry;

pub use telemetry::HttpMetrics;

use crate::writer::FanOutWriter;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Maximum request body size; `None` leaves bodies bounded only by memory
    pub max_body_size: Option<usize>,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8000,
            max_body_size: None,
            enable_cors: false,
        }
    }
}

/// Build the HTTP API router
pub fn build_http_router(
    writer: Arc<FanOutWriter>,
    metrics: HttpMetrics,
    config: &ApiServerConfig,
) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::cors::{Any, CorsLayer};

    let body_limit = match config.max_body_size {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))

        // Prometheus Remote Write
        .route("/write", post(ingest::handle_remote_write))

        // State
        .with_state(ApiState { writer })
        .layer(body_limit)
        .layer(middleware::from_fn_with_state(
            metrics,
            telemetry::http_observability_middleware,
        ));

    if !config.enable_cors {
        return router;
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    router.layer(cors)
}

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub writer: Arc<FanOutWriter>,
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn ready_check() -> &'static str {
    "READY"
}
