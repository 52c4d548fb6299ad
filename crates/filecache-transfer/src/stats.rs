//! Transfer counters shared by the upload and download handlers

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TransferCounters {
    committed_chunks: AtomicU64,
    duplicate_chunks: AtomicU64,
    completed_uploads: AtomicU64,
    interrupted_uploads: AtomicU64,
    downloads: AtomicU64,
    bytes_received: AtomicU64,
}

/// Point-in-time copy of [`TransferCounters`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub committed_chunks: u64,
    pub duplicate_chunks: u64,
    pub completed_uploads: u64,
    pub interrupted_uploads: u64,
    pub downloads: u64,
    pub bytes_received: u64,
}

impl TransferCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn chunk_committed(&self, len: u64) {
        self.committed_chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len, Ordering::Relaxed);
    }

    pub(crate) fn chunk_duplicated(&self) {
        self.duplicate_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn upload_completed(&self) {
        self.completed_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn upload_interrupted(&self) {
        self.interrupted_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn download_started(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransferStats {
        TransferStats {
            committed_chunks: self.committed_chunks.load(Ordering::Relaxed),
            duplicate_chunks: self.duplicate_chunks.load(Ordering::Relaxed),
            completed_uploads: self.completed_uploads.load(Ordering::Relaxed),
            interrupted_uploads: self.interrupted_uploads.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}
