//! Storage contract shared by every backend

use crate::error::Result;
use crate::types::{CacheFile, FileState, NewCacheFile, StoreStats};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use std::path::PathBuf;
use std::pin::Pin;

/// Stream of body bytes flowing into or out of the store
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Bytes that have been fully received and made durable outside the data
/// file, waiting to be committed at `offset`.
#[derive(Debug)]
pub struct StagedChunk {
    pub file_id: String,
    pub offset: u64,
    pub len: u64,
    pub path: PathBuf,
}

/// Durable metadata and byte storage for [`CacheFile`] records.
///
/// Every lookup and mutation fails with `StoreError::NotFound` when the record
/// is absent, `EXPIRED` or `DELETED`. Mutations of one record are serialized;
/// records are independent of each other.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn create(&self, new: NewCacheFile) -> Result<CacheFile>;

    async fn find_by_upload_token(&self, token: &str) -> Result<CacheFile>;

    async fn find_by_download_token(&self, token: &str) -> Result<CacheFile>;

    async fn find_by_file_id(&self, file_id: &str) -> Result<CacheFile>;

    /// Read exactly `len` bytes of `body` into a staging area.
    ///
    /// A body that ends early yields `Interrupted`, one that runs long yields
    /// `Overflow`; in both cases nothing is left behind.
    async fn stage_chunk(
        &self,
        file_id: &str,
        offset: u64,
        len: u64,
        body: ByteStream,
    ) -> Result<StagedChunk>;

    /// Commit a staged chunk and advance `limit` to `offset + len`, but only if
    /// `limit` still equals `expected_limit`. Returns `false` (and discards the
    /// chunk) when another writer got there first.
    async fn compare_and_advance_limit(
        &self,
        chunk: StagedChunk,
        expected_limit: u64,
    ) -> Result<bool>;

    /// Fix the total length if it is still unknown. Returns the record after
    /// the call; callers compare its `total_length` with what they asked for.
    async fn set_total_length(&self, file_id: &str, total_length: u64) -> Result<CacheFile>;

    /// Move `from -> to`. Returns `false` if the record is no longer in `from`.
    async fn transition_state(&self, file_id: &str, from: FileState, to: FileState)
        -> Result<bool>;

    /// Open committed bytes `[start, end)`. `end` must not exceed `limit`.
    async fn open_range(&self, file_id: &str, start: u64, end: u64) -> Result<ByteStream>;

    /// Reclaim the bytes and leave a `DELETED` tombstone
    async fn delete(&self, file_id: &str) -> Result<()>;

    /// Delete every visible file owned by `account_id`, returning how many
    async fn delete_all_for_account(&self, account_id: &str) -> Result<usize>;

    /// Expire every visible record whose `expires_at <= now`
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Forget terminal records last updated before `older_than`
    async fn purge_tombstones(&self, older_than: DateTime<Utc>) -> Result<usize>;

    async fn stats(&self) -> StoreStats;
}
