//! File cache server
//!
//! Accepts resumable chunked uploads, serves committed bytes back with range
//! support, and takes file lifecycle commands over a WebSocket control channel.

use filecache_server::{start_server, Result, ServerConfig, ServerError, ServerState, SharedState};
use filecache_store::{FileStore, LocalFileStore, Sweeper};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("filecache_server=info".parse()?)
        .add_directive("filecache_store=info".parse()?)
        .add_directive("filecache_transfer=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting file cache server...");

    let config = ServerConfig::from_env();
    info!("Port: {}", config.port);
    info!("Storage dir: {:?}", config.storage_dir);
    info!(
        "Max file size: {} MB",
        config.max_file_size / (1024 * 1024)
    );
    info!(
        "Storage TTL: {}s, transfer TTL: {}s",
        config.storage_ttl_secs, config.transfer_ttl_secs
    );

    let local = LocalFileStore::new(config.storage_dir.clone());
    let restored = local.init().await?;
    info!("Restored {} file records", restored);
    let store: Arc<dyn FileStore> = Arc::new(local);

    let sweeper = Sweeper::new(
        store.clone(),
        config.sweep_interval(),
        config.tombstone_retention(),
    );
    tokio::spawn(sweeper.run());

    let state: SharedState = Arc::new(ServerState::new(store, &config));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| ServerError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
