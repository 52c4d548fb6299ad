use crate::config::ServerConfig;
use crate::control::ControlService;
use chrono::{DateTime, Utc};
use filecache_store::FileStore;
use filecache_transfer::{DownloadHandler, TransferCounters, UploadHandler};
use std::sync::Arc;

/// Shared state passed to all route handlers
pub struct ServerState {
    pub store: Arc<dyn FileStore>,
    pub uploads: UploadHandler,
    pub downloads: DownloadHandler,
    pub control: ControlService,
    pub counters: Arc<TransferCounters>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(store: Arc<dyn FileStore>, config: &ServerConfig) -> Self {
        let counters = Arc::new(TransferCounters::new());
        Self {
            uploads: UploadHandler::new(store.clone(), counters.clone(), config.max_file_size),
            downloads: DownloadHandler::new(store.clone(), counters.clone()),
            control: ControlService::new(
                store.clone(),
                config.storage_ttl(),
                config.transfer_ttl(),
                config.max_file_size,
            ),
            store,
            counters,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;
