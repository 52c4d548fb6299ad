use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use filecache_store::StoreStats;
use filecache_transfer::TransferStats;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub store: StoreStats,
    pub transfers: TransferStats,
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        store: state.store.stats().await,
        transfers: state.counters.snapshot(),
    })
}
