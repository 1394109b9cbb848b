//! promsink binary
//!
//! Receives Prometheus remote-write requests and persists the samples to
//! CockroachDB.

use promsink::api::{self, ApiServerConfig, HttpMetrics};
use promsink::config::{ComponentFactory, DatabaseConfig, StorageBackend};
use promsink::telemetry::Telemetry;
use promsink::writer::{FanOutWriter, WriterConfig};
use promsink::Error;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// promsink remote-write adapter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP API port
    #[arg(long, env = "HTTP_PORT", default_value = "8000")]
    http_port: u16,

    /// Storage backend: cockroach, postgres or memory
    #[arg(long, env = "STORAGE_BACKEND", default_value = "cockroach")]
    storage_backend: String,

    /// Number of concurrent writer workers
    #[arg(long, env = "WRITER_WORKERS", default_value = "10")]
    workers: usize,

    /// Intake queue slots per writer worker
    #[arg(long, env = "WRITER_QUEUE_DEPTH", default_value = "4")]
    queue_depth: usize,

    /// Keep writing the remaining samples of a batch after the first failure
    #[arg(long, env = "WRITER_CONTINUE_ON_ERROR")]
    continue_on_error: bool,

    /// Maximum request body size in bytes (unlimited when unset)
    #[arg(long, env = "MAX_BODY_SIZE")]
    max_body_size: Option<usize>,

    /// Allow cross-origin requests from any origin
    #[arg(long, env = "ENABLE_CORS")]
    enable_cors: bool,

    /// Database connection pool size
    #[arg(long, env = "DB_MAX_CONNECTIONS")]
    db_max_connections: Option<u32>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let telemetry = Telemetry::init_for_component("promsink", &args.log_level)?;

    info!(service = telemetry.service_name(), "Starting promsink");

    let backend: StorageBackend = args.storage_backend.parse().map_err(Error::Config)?;

    let writer_config = WriterConfig {
        workers: args.workers,
        queue_depth_per_worker: args.queue_depth,
        cancel_on_first_error: !args.continue_on_error,
    };

    let mut database = DatabaseConfig::from_env()?;
    database.max_connections = args
        .db_max_connections
        .unwrap_or_else(|| database.max_connections.max(writer_config.workers as u32));

    let sink = ComponentFactory::create_sink(backend, &database).await?;

    info!(
        backend = backend.as_str(),
        sink = sink.name(),
        workers = writer_config.workers,
        queue_depth = writer_config.queue_depth_per_worker,
        cancel_on_first_error = writer_config.cancel_on_first_error,
        "Writer configuration"
    );

    let writer = Arc::new(FanOutWriter::with_config(sink.clone(), writer_config));
    let metrics = HttpMetrics::new(&telemetry.meter("promsink.api.http"));

    let api_config = ApiServerConfig {
        http_port: args.http_port,
        max_body_size: args.max_body_size,
        enable_cors: args.enable_cors,
    };
    let router = api::build_http_router(writer, metrics, &api_config);

    let addr = SocketAddr::from(([0, 0, 0, 0], api_config.http_port));
    let listener = TcpListener::bind(addr).await?;

    info!(http_port = api_config.http_port, "promsink ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("HTTP server error: {e}")))?;

    info!("promsink shutting down");
    sink.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
