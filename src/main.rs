//! Chunk Relay Server
//!
//! Relays large remote files into S3-compatible object storage in
//! client-driven chunks, using multipart uploads that survive retries.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chunk_relay::config::Config;
use chunk_relay::db::{self, SqliteKvStore};
use chunk_relay::kv::{KvStore, MemoryKvStore};
use chunk_relay::routes;
use chunk_relay::source::HttpSource;
use chunk_relay::state::AppState;
use chunk_relay::storage::S3Client;
use chunk_relay::upload::UploadService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "chunk_relay=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Chunk Relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "S3 endpoint: {} ({:?})",
        config.storage.endpoint,
        config.storage.provider
    );
    tracing::info!("Chunk size: {} bytes", config.relay.chunk_size);

    let s3_client = S3Client::new(&config.storage)
        .await
        .context("Failed to initialize S3 client")?;
    tracing::info!("S3 bucket: {}", s3_client.bucket());

    let kv: Arc<dyn KvStore> = if config.database.is_memory() {
        tracing::warn!("Using in-memory session store, sessions are lost on restart");
        Arc::new(MemoryKvStore::new())
    } else {
        let pool = db::create_pool(&config.database.url)
            .await
            .context("Failed to initialize database")?;
        tracing::info!("Session store initialized at {}", config.database.url);
        Arc::new(SqliteKvStore::new(pool))
    };

    let source = HttpSource::new(Duration::from_secs(config.relay.source_timeout_secs))
        .context("Failed to build source HTTP client")?;

    let upload = UploadService::new(
        kv,
        Arc::new(s3_client),
        Arc::new(source),
        config.relay.chunk_size,
    );
    let app_state = AppState::new(upload);

    let app = routes::app(app_state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;
    tracing::info!("Chunk Relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
