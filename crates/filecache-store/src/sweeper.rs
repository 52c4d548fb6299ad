//! Periodic expiry of stale records

use crate::error::Result;
use crate::store::FileStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Outcome of a single sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub purged: usize,
}

/// Moves due records to `EXPIRED` and forgets old tombstones
pub struct Sweeper {
    store: Arc<dyn FileStore>,
    period: Duration,
    tombstone_retention: chrono::Duration,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn FileStore>,
        period: Duration,
        tombstone_retention: chrono::Duration,
    ) -> Self {
        Self {
            store,
            period,
            tombstone_retention,
        }
    }

    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired = self.store.expire_due(now).await?;
        let purged = self
            .store
            .purge_tombstones(now - self.tombstone_retention)
            .await?;
        Ok(SweepReport { expired, purged })
    }

    /// Sweep forever, one tick per period
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        loop {
            ticker.tick().await;
            match self.sweep_once(Utc::now()).await {
                Ok(report) if report.expired > 0 || report.purged > 0 => {
                    info!(
                        expired = report.expired,
                        purged = report.purged,
                        "Sweep finished"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Sweep failed"),
            }
        }
    }
}
