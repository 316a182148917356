//! Publication queue worker process.
//!
//! Loads configuration, opens the durable store, and runs the worker loop
//! until interrupted. Exposes a minimal health endpoint; the administrative
//! HTTP surface for creating/editing channels and posts lives outside this
//! process.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use bc_config::AppConfig;
use bc_messaging::ClientConfig;
use bc_scheduler::{Worker, WorkerConfig};
use bc_store::{AuditLogWriter, PublicationRepository, SqlitePublicationRepository};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bc_common::logging::init_default_logging();

    info!("starting publication worker");

    let config = AppConfig::load()?;
    info!(
        disabled = config.worker.disabled,
        interval_seconds = config.worker.interval_seconds,
        "configuration loaded"
    );

    let pool = bc_store::connect(
        &config.store.uri,
        config.store.busy_timeout_seconds,
        config.store.max_connections,
    )
    .await?;

    let repository: Arc<dyn PublicationRepository> =
        Arc::new(SqlitePublicationRepository::new(pool.clone()));
    repository.init_schema().await?;
    info!(uri = %config.store.uri, "durable store ready");

    let audit = AuditLogWriter::new(pool);

    let messaging_config = ClientConfig {
        api_base: config.messaging.api_base.clone(),
        request_timeout: std::time::Duration::from_secs(config.messaging.request_timeout_seconds),
        ..ClientConfig::default()
    };

    let worker_config = WorkerConfig {
        worker_id: format!("bc-worker-{}", std::process::id()),
        interval_seconds: config.worker.interval_seconds,
        batch_size: config.worker.batch_size,
        max_attempts: config.worker.max_attempts,
        default_retry_minutes: config.worker.default_retry_minutes,
        processing_ttl_seconds: config.worker.processing_ttl_seconds,
    };

    let worker = Arc::new(Worker::new(repository, audit, messaging_config, worker_config));

    if !config.worker.disabled {
        let worker_for_loop = worker.clone();
        tokio::spawn(async move { worker_for_loop.run().await });
    } else {
        info!("worker loop disabled by configuration, health endpoint only");
    }

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "UP"})) }))
        .route("/health/live", get(|| async { Json(serde_json::json!({"status": "UP"})) }));

    let addr = SocketAddr::from(([0, 0, 0, 0], 8081));
    info!(?addr, "health endpoint starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("publication worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    info!("shutdown signal received");
}
