//! Range-aware GET protocol

use crate::error::Result;
use crate::stats::TransferCounters;
use crate::validation::resolve_download_range;
use filecache_store::{ByteStream, CacheFile, FileKind, FileStore, StoreError};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Transport-neutral download response
pub struct DownloadResponse {
    /// 200 for the whole committed content, 206 for a requested range
    pub status: u16,
    pub content_type: String,
    pub content_length: u64,
    /// `bytes <start>-<end>/<total or *>` for partial responses
    pub content_range: Option<String>,
    pub body: ByteStream,
}

pub struct DownloadHandler {
    store: Arc<dyn FileStore>,
    counters: Arc<TransferCounters>,
}

impl DownloadHandler {
    pub fn new(store: Arc<dyn FileStore>, counters: Arc<TransferCounters>) -> Self {
        Self { store, counters }
    }

    /// Resolve by download token, falling back to the file id
    async fn resolve(&self, token: &str) -> Result<CacheFile> {
        match self.store.find_by_download_token(token).await {
            Err(StoreError::NotFound) => Ok(self.store.find_by_file_id(token).await?),
            other => Ok(other?),
        }
    }

    pub async fn handle_download(&self, token: &str, range: Option<&str>) -> Result<DownloadResponse> {
        let file = self.resolve(token).await?;
        let span = resolve_download_range(range, file.limit)?;
        let (start, end) = match span {
            Some(span) => (span.start, span.end + 1),
            None => (0, file.limit),
        };

        let body = self.store.open_range(&file.file_id, start, end).await?;
        self.counters.download_started();
        debug!(file_id = %file.file_id, start, end, limit = file.limit, "Serving download");

        let whole_file = start == 0 && file.total_length == Some(end);
        let body = match (file.kind, file.is_complete() && whole_file) {
            // Nothing to stream, so nothing can be cut short
            (FileKind::Transfer, true) if end == 0 => {
                delete_transfer(self.store.as_ref(), &file.file_id).await;
                body
            }
            (FileKind::Transfer, true) => {
                self.delete_when_delivered(body, file.file_id.clone(), end)
            }
            _ => body,
        };

        let total = file
            .total_length
            .map_or_else(|| "*".to_string(), |t| t.to_string());
        Ok(DownloadResponse {
            status: if span.is_some() { 206 } else { 200 },
            content_type: file
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            content_length: end - start,
            content_range: span.map(|s| format!("bytes {}-{}/{}", s.start, s.end, total)),
            body,
        })
    }

    /// Delete a transfer file as soon as its last byte has been handed out.
    /// A stream that errors or is dropped early leaves the file in place.
    fn delete_when_delivered(&self, body: ByteStream, file_id: String, expected: u64) -> ByteStream {
        let store = self.store.clone();
        let mut sent = 0u64;
        let mut failed = false;
        let mut delivered = false;

        Box::pin(body.then(move |chunk| {
            match &chunk {
                Ok(bytes) if !failed => sent += bytes.len() as u64,
                _ => failed = true,
            }
            let last = !failed && !delivered && sent >= expected;
            delivered |= last;

            let store = store.clone();
            let file_id = file_id.clone();
            async move {
                if last {
                    delete_transfer(store.as_ref(), &file_id).await;
                }
                chunk
            }
        }))
    }
}

async fn delete_transfer(store: &dyn FileStore, file_id: &str) {
    match store.delete(file_id).await {
        Ok(()) => info!(file_id = %file_id, "Transfer file delivered, deleted"),
        Err(StoreError::NotFound) => {}
        Err(e) => warn!(file_id = %file_id, error = %e, "Failed to delete transfer file"),
    }
}
