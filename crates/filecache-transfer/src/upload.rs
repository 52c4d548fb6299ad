//! Resumable PUT protocol

use crate::error::{Result, TransferError};
use crate::stats::TransferCounters;
use crate::validation::{plan_upload, Progress, UploadPlan};
use filecache_store::{ByteStream, CacheFile, FileState, FileStore, StoreError};
use futures_util::{future, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transport-neutral upload request
pub struct UploadRequest {
    pub content_length: Option<String>,
    pub content_range: Option<String>,
    pub body: ByteStream,
}

/// Result of an accepted upload request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every byte is stored (HTTP 200)
    Complete { total: u64 },
    /// More bytes are expected (HTTP 308)
    Incomplete { limit: u64, total: Option<u64> },
}

impl UploadOutcome {
    pub fn status(&self) -> u16 {
        match self {
            UploadOutcome::Complete { .. } => 200,
            UploadOutcome::Incomplete { .. } => 308,
        }
    }

    /// `Range: bytes=0-<limit-1>/<total>`, absent while nothing is stored
    pub fn range_header(&self) -> Option<String> {
        let (limit, total) = match *self {
            UploadOutcome::Complete { total } => (total, Some(total)),
            UploadOutcome::Incomplete { limit, total } => (limit, total),
        };
        if limit == 0 {
            return None;
        }
        let total = total.map_or_else(|| "*".to_string(), |t| t.to_string());
        Some(format!("bytes=0-{}/{}", limit - 1, total))
    }

    fn of(file: &CacheFile) -> Self {
        match file.total_length {
            Some(total) if file.is_complete() => UploadOutcome::Complete { total },
            total => UploadOutcome::Incomplete {
                limit: file.limit,
                total,
            },
        }
    }
}

pub struct UploadHandler {
    store: Arc<dyn FileStore>,
    counters: Arc<TransferCounters>,
    max_file_size: u64,
}

impl UploadHandler {
    pub fn new(
        store: Arc<dyn FileStore>,
        counters: Arc<TransferCounters>,
        max_file_size: u64,
    ) -> Self {
        Self {
            store,
            counters,
            max_file_size,
        }
    }

    /// Resolve by upload token, falling back to the file id
    async fn resolve(&self, token: &str) -> Result<CacheFile> {
        match self.store.find_by_upload_token(token).await {
            Err(StoreError::NotFound) => Ok(self.store.find_by_file_id(token).await?),
            other => Ok(other?),
        }
    }

    pub async fn handle_upload(&self, token: &str, request: UploadRequest) -> Result<UploadOutcome> {
        let file = self.resolve(token).await?;
        let progress = Progress {
            total_length: file.total_length,
            limit: file.limit,
            complete: file.is_complete(),
        };
        let plan = plan_upload(
            &progress,
            request.content_length.as_deref(),
            request.content_range.as_deref(),
            self.max_file_size,
        )?;

        let (total, offset, skip, len) = match plan {
            UploadPlan::Status => return Ok(UploadOutcome::of(&file)),
            UploadPlan::Duplicate { .. } => {
                self.counters.chunk_duplicated();
                debug!(file_id = %file.file_id, limit = file.limit, "Duplicate chunk");
                return Ok(UploadOutcome::of(&file));
            }
            UploadPlan::Write {
                total,
                offset,
                skip,
                len,
            } => (total, offset, skip, len),
        };

        if file.total_length.is_none() {
            let fixed = self.store.set_total_length(&file.file_id, total).await?;
            if fixed.total_length != Some(total) {
                return Err(TransferError::validation(
                    "total length mismatch: fixed by a concurrent request",
                ));
            }
        }

        let body = skip_prefix(request.body, skip);
        let chunk = match self
            .store
            .stage_chunk(&file.file_id, offset, len, body)
            .await
        {
            Ok(chunk) => chunk,
            Err(e @ StoreError::Interrupted { .. }) => {
                self.counters.upload_interrupted();
                warn!(file_id = %file.file_id, offset, len, error = %e, "Upload interrupted");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        if self.store.compare_and_advance_limit(chunk, offset).await? {
            self.counters.chunk_committed(len);
        } else {
            self.counters.chunk_duplicated();
            debug!(file_id = %file.file_id, offset, "Lost commit race, treating as duplicate");
        }

        self.settle(&file.file_id).await
    }

    /// Bring the state in line with the committed limit
    async fn settle(&self, file_id: &str) -> Result<UploadOutcome> {
        loop {
            let file = self.store.find_by_file_id(file_id).await?;
            let total = file.total_length;
            let target = if total == Some(file.limit) {
                FileState::Complete
            } else {
                FileState::Uploading
            };

            if file.state != target && file.state.can_transition_to(target) {
                if !self
                    .store
                    .transition_state(file_id, file.state, target)
                    .await?
                {
                    continue;
                }
                if target == FileState::Complete {
                    self.counters.upload_completed();
                    info!(file_id = %file_id, total = file.limit, "Upload complete");
                }
            }

            return Ok(match total {
                Some(total) if target == FileState::Complete => UploadOutcome::Complete { total },
                _ => UploadOutcome::Incomplete {
                    limit: file.limit,
                    total,
                },
            });
        }
    }

    /// Delete a file by upload token or file id
    pub async fn handle_delete(&self, token: &str) -> Result<()> {
        let file = self.resolve(token).await?;
        self.store.delete(&file.file_id).await?;
        Ok(())
    }
}

/// Drop the first `skip` bytes of a body
fn skip_prefix(body: ByteStream, skip: u64) -> ByteStream {
    if skip == 0 {
        return body;
    }
    let mut remaining = skip;
    Box::pin(body.filter_map(move |chunk| {
        let chunk = match chunk {
            Ok(mut bytes) if remaining > 0 => {
                let n = remaining.min(bytes.len() as u64) as usize;
                remaining -= n as u64;
                let rest = bytes.split_off(n);
                if rest.is_empty() {
                    None
                } else {
                    Some(Ok(rest))
                }
            }
            other => Some(other),
        };
        future::ready(chunk)
    }))
}
