//! Filesystem-backed store with JSON metadata sidecars
//!
//! Layout under the root directory:
//!
//! ```text
//! files/<file_id>.bin      committed bytes, valid up to `limit`
//! files/<file_id>.json     CacheFile metadata
//! staging/<file_id>-<nonce>.chunk
//! ```

use crate::error::{Result, StoreError};
use crate::store::{ByteStream, FileStore, StagedChunk};
use crate::types::{CacheFile, FileState, NewCacheFile, StoreStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Entry = Arc<Mutex<CacheFile>>;

/// Three lookup indices over the same records
#[derive(Default)]
struct Index {
    by_id: HashMap<String, Entry>,
    by_upload_token: HashMap<String, String>,
    by_download_token: HashMap<String, String>,
}

impl Index {
    fn insert(&mut self, file: CacheFile) {
        self.by_upload_token
            .insert(file.upload_token.clone(), file.file_id.clone());
        self.by_download_token
            .insert(file.download_token.clone(), file.file_id.clone());
        self.by_id
            .insert(file.file_id.clone(), Arc::new(Mutex::new(file)));
    }

    fn remove(&mut self, file: &CacheFile) {
        self.by_id.remove(&file.file_id);
        self.by_upload_token.remove(&file.upload_token);
        self.by_download_token.remove(&file.download_token);
    }
}

/// A [`FileStore`] keeping bytes and metadata on the local filesystem
pub struct LocalFileStore {
    files_dir: PathBuf,
    staging_dir: PathBuf,
    index: RwLock<Index>,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            files_dir: root.join("files"),
            staging_dir: root.join("staging"),
            index: RwLock::new(Index::default()),
        }
    }

    /// Create the directory layout, drop leftover staging files and reload
    /// every persisted record. Returns the number of records loaded.
    pub async fn init(&self) -> Result<usize> {
        fs::create_dir_all(&self.files_dir).await?;
        fs::create_dir_all(&self.staging_dir).await?;

        let mut staging = fs::read_dir(&self.staging_dir).await?;
        while let Some(entry) = staging.next_entry().await? {
            remove_if_exists(&entry.path()).await?;
        }

        let mut loaded = 0;
        let mut index = self.index.write().await;
        let mut files = fs::read_dir(&self.files_dir).await?;
        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("json") => {}
                Some("tmp") => {
                    remove_if_exists(&path).await?;
                    continue;
                }
                _ => continue,
            }

            let raw = fs::read(&path).await?;
            match serde_json::from_slice::<CacheFile>(&raw) {
                Ok(file) => {
                    index.insert(file);
                    loaded += 1;
                }
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable metadata"),
            }
        }

        info!(files_dir = ?self.files_dir, loaded, "File store initialized");
        Ok(loaded)
    }

    fn data_path(&self, file_id: &str) -> PathBuf {
        self.files_dir.join(format!("{}.bin", file_id))
    }

    fn meta_path(&self, file_id: &str) -> PathBuf {
        self.files_dir.join(format!("{}.json", file_id))
    }

    /// Write the sidecar through a temp file so readers never see a torn record
    async fn persist(&self, file: &CacheFile) -> Result<()> {
        let path = self.meta_path(&file.file_id);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_vec(file)?;

        let mut out = File::create(&tmp).await?;
        out.write_all(&raw).await?;
        out.sync_data().await?;
        drop(out);

        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn entry(&self, file_id: &str) -> Result<Entry> {
        let index = self.index.read().await;
        index.by_id.get(file_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn entry_by_token(&self, token: &str, upload: bool) -> Result<Entry> {
        let index = self.index.read().await;
        let tokens = if upload {
            &index.by_upload_token
        } else {
            &index.by_download_token
        };
        tokens
            .get(token)
            .and_then(|id| index.by_id.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn all_entries(&self) -> Vec<Entry> {
        let index = self.index.read().await;
        index.by_id.values().cloned().collect()
    }

    async fn visible(entry: &Entry) -> Result<CacheFile> {
        let file = entry.lock().await;
        if file.is_visible() {
            Ok(file.clone())
        } else {
            Err(StoreError::NotFound)
        }
    }

    /// Move a locked record into a terminal state and reclaim its bytes
    async fn terminate(&self, file: &mut CacheFile, to: FileState) -> Result<()> {
        if !file.state.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: file.state,
                to,
            });
        }

        let mut updated = file.clone();
        updated.state = to;
        updated.updated_at = Utc::now();
        self.persist(&updated).await?;
        remove_if_exists(&self.data_path(&updated.file_id)).await?;

        *file = updated;
        Ok(())
    }

    async fn receive(path: &Path, len: u64, mut body: ByteStream) -> Result<()> {
        let mut out = File::create(path).await?;
        let mut received: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    debug!(error = %e, received, "Body stream failed");
                    return Err(StoreError::Interrupted {
                        expected: len,
                        received,
                    });
                }
            };
            if received + chunk.len() as u64 > len {
                return Err(StoreError::Overflow { expected: len });
            }
            out.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }

        if received < len {
            return Err(StoreError::Interrupted {
                expected: len,
                received,
            });
        }

        out.flush().await?;
        out.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn create(&self, new: NewCacheFile) -> Result<CacheFile> {
        let file = CacheFile::from_new(new, Utc::now());

        File::create(self.data_path(&file.file_id)).await?;
        self.persist(&file).await?;
        self.index.write().await.insert(file.clone());

        info!(
            file_id = %file.file_id,
            kind = %file.kind,
            total = ?file.total_length,
            "Created file"
        );
        Ok(file)
    }

    async fn find_by_upload_token(&self, token: &str) -> Result<CacheFile> {
        let entry = self.entry_by_token(token, true).await?;
        Self::visible(&entry).await
    }

    async fn find_by_download_token(&self, token: &str) -> Result<CacheFile> {
        let entry = self.entry_by_token(token, false).await?;
        Self::visible(&entry).await
    }

    async fn find_by_file_id(&self, file_id: &str) -> Result<CacheFile> {
        let entry = self.entry(file_id).await?;
        Self::visible(&entry).await
    }

    async fn stage_chunk(
        &self,
        file_id: &str,
        offset: u64,
        len: u64,
        body: ByteStream,
    ) -> Result<StagedChunk> {
        self.find_by_file_id(file_id).await?;

        let nonce = Uuid::new_v4().simple().to_string();
        let chunk = StagedChunk {
            file_id: file_id.to_string(),
            offset,
            len,
            path: self.staging_dir.join(format!("{}-{}.chunk", file_id, nonce)),
        };

        // On error `chunk` is dropped and its staging file removed
        Self::receive(&chunk.path, len, body).await?;
        debug!(file_id = %file_id, offset, len, "Staged chunk");
        Ok(chunk)
    }

    async fn compare_and_advance_limit(
        &self,
        chunk: StagedChunk,
        expected_limit: u64,
    ) -> Result<bool> {
        let entry = self.entry(&chunk.file_id).await?;
        let mut file = entry.lock().await;
        if !file.is_visible() {
            return Err(StoreError::NotFound);
        }
        if file.limit != expected_limit || chunk.offset != expected_limit {
            debug!(
                file_id = %file.file_id,
                limit = file.limit,
                expected_limit,
                "Limit moved, discarding staged chunk"
            );
            return Ok(false);
        }

        if chunk.len > 0 {
            let mut staged = File::open(&chunk.path).await?;
            let mut data = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(self.data_path(&file.file_id))
                .await?;
            data.seek(SeekFrom::Start(chunk.offset)).await?;
            let copied = tokio::io::copy(&mut staged, &mut data).await?;
            if copied != chunk.len {
                return Err(StoreError::Io(Box::new(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "staged chunk for {} holds {} of {} bytes",
                        file.file_id, copied, chunk.len
                    ),
                ))));
            }
            data.sync_data().await?;
        }

        // Bytes are durable; only now may readers see the new limit
        let mut updated = file.clone();
        updated.limit = chunk.offset + chunk.len;
        updated.updated_at = Utc::now();
        self.persist(&updated).await?;
        *file = updated;

        info!(
            file_id = %file.file_id,
            limit = file.limit,
            total = ?file.total_length,
            "Committed chunk"
        );
        Ok(true)
    }

    async fn set_total_length(&self, file_id: &str, total_length: u64) -> Result<CacheFile> {
        let entry = self.entry(file_id).await?;
        let mut file = entry.lock().await;
        if !file.is_visible() {
            return Err(StoreError::NotFound);
        }
        if file.total_length.is_none() {
            let mut updated = file.clone();
            updated.total_length = Some(total_length);
            updated.updated_at = Utc::now();
            self.persist(&updated).await?;
            *file = updated;
            debug!(file_id = %file_id, total_length, "Fixed total length");
        }
        Ok(file.clone())
    }

    async fn transition_state(
        &self,
        file_id: &str,
        from: FileState,
        to: FileState,
    ) -> Result<bool> {
        let entry = self.entry(file_id).await?;
        let mut file = entry.lock().await;
        if !file.is_visible() {
            return Err(StoreError::NotFound);
        }
        if file.state != from {
            return Ok(false);
        }
        if to.is_terminal() {
            self.terminate(&mut file, to).await?;
            return Ok(true);
        }
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        let mut updated = file.clone();
        updated.state = to;
        updated.updated_at = Utc::now();
        self.persist(&updated).await?;
        *file = updated;
        debug!(file_id = %file_id, from = %from, to = %to, "State transition");
        Ok(true)
    }

    async fn open_range(&self, file_id: &str, start: u64, end: u64) -> Result<ByteStream> {
        let file = self.find_by_file_id(file_id).await?;
        if start > end || end > file.limit {
            return Err(StoreError::Io(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("range {}..{} outside committed {} bytes", start, end, file.limit),
            ))));
        }

        // A concurrent delete or sweep may unlink the bytes after the lookup
        let mut data = match File::open(self.data_path(file_id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        data.seek(SeekFrom::Start(start)).await?;
        Ok(Box::pin(ReaderStream::new(data.take(end - start))))
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        let entry = self.entry(file_id).await?;
        let mut file = entry.lock().await;
        if !file.is_visible() {
            return Err(StoreError::NotFound);
        }
        self.terminate(&mut file, FileState::Deleted).await?;
        info!(file_id = %file_id, "Deleted file");
        Ok(())
    }

    async fn delete_all_for_account(&self, account_id: &str) -> Result<usize> {
        let mut deleted = 0;
        for entry in self.all_entries().await {
            let mut file = entry.lock().await;
            if file.is_visible() && file.account_id == account_id {
                self.terminate(&mut file, FileState::Deleted).await?;
                deleted += 1;
            }
        }
        info!(account_id = %account_id, deleted, "Deleted account files");
        Ok(deleted)
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired = 0;
        for entry in self.all_entries().await {
            let mut file = entry.lock().await;
            if file.is_visible() && file.expires_at <= now {
                self.terminate(&mut file, FileState::Expired).await?;
                debug!(file_id = %file.file_id, "Expired file");
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn purge_tombstones(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut purged = Vec::new();
        for entry in self.all_entries().await {
            let file = entry.lock().await;
            if !file.is_visible() && file.updated_at < older_than {
                remove_if_exists(&self.meta_path(&file.file_id)).await?;
                purged.push(file.clone());
            }
        }

        let mut index = self.index.write().await;
        for file in &purged {
            index.remove(file);
        }
        Ok(purged.len())
    }

    async fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();
        for entry in self.all_entries().await {
            stats.record(&*entry.lock().await);
        }
        stats
    }
}

impl Drop for StagedChunk {
    fn drop(&mut self) {
        // Committed or not, the staging copy is never needed again
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = ?self.path, error = %e, "Failed to remove staged chunk");
            }
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileKind;
    use bytes::Bytes;
    use chrono::Duration;
    use futures::TryStreamExt;
    use tempfile::tempdir;

    fn body(data: &[u8]) -> ByteStream {
        let chunks: Vec<std::io::Result<Bytes>> = data
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Box::pin(futures::stream::iter(chunks))
    }

    fn broken_body(data: &[u8]) -> ByteStream {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(data)),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        ];
        Box::pin(futures::stream::iter(chunks))
    }

    fn storage(total: Option<u64>) -> NewCacheFile {
        NewCacheFile::new("acct-1", FileKind::Storage, Duration::hours(1))
            .with_total_length(total)
    }

    async fn store() -> (tempfile::TempDir, LocalFileStore) {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.init().await.unwrap();
        (dir, store)
    }

    async fn read_all(store: &LocalFileStore, id: &str, start: u64, end: u64) -> Vec<u8> {
        let chunks: Vec<Bytes> = store
            .open_range(id, start, end)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        chunks.concat()
    }

    async fn write(store: &LocalFileStore, id: &str, offset: u64, data: &[u8]) -> bool {
        let chunk = store
            .stage_chunk(id, offset, data.len() as u64, body(data))
            .await
            .unwrap();
        store.compare_and_advance_limit(chunk, offset).await.unwrap()
    }

    fn staging_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir.join("staging")).unwrap().count() == 0
    }

    #[tokio::test]
    async fn test_lookup_indices_are_independent() {
        let (_dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();

        let by_id = store.find_by_file_id(&file.file_id).await.unwrap();
        let by_upload = store.find_by_upload_token(&file.upload_token).await.unwrap();
        let by_download = store
            .find_by_download_token(&file.download_token)
            .await
            .unwrap();
        assert_eq!(by_id, file);
        assert_eq!(by_upload, file);
        assert_eq!(by_download, file);

        assert!(matches!(
            store.find_by_upload_token(&file.download_token).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.find_by_download_token(&file.upload_token).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.find_by_file_id("missing").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_commit_advances_limit_and_bytes_are_readable() {
        let (dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();

        assert!(write(&store, &file.file_id, 0, b"hello").await);
        assert!(write(&store, &file.file_id, 5, b"world").await);

        let file = store.find_by_file_id(&file.file_id).await.unwrap();
        assert_eq!(file.limit, 10);
        assert_eq!(read_all(&store, &file.file_id, 0, 10).await, b"helloworld");
        assert_eq!(read_all(&store, &file.file_id, 3, 7).await, b"lowo");
        assert!(staging_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_stale_expected_limit_is_rejected() {
        let (dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();
        assert!(write(&store, &file.file_id, 0, b"hello").await);

        let chunk = store
            .stage_chunk(&file.file_id, 0, 5, body(b"HELLO"))
            .await
            .unwrap();
        assert!(!store.compare_and_advance_limit(chunk, 0).await.unwrap());

        let file = store.find_by_file_id(&file.file_id).await.unwrap();
        assert_eq!(file.limit, 5);
        assert_eq!(read_all(&store, &file.file_id, 0, 5).await, b"hello");
        assert!(staging_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_racing_writers_only_one_commits() {
        let (_dir, store) = store().await;
        let store = Arc::new(store);
        let file = store.create(storage(Some(4))).await.unwrap();

        let a = store
            .stage_chunk(&file.file_id, 0, 4, body(b"aaaa"))
            .await
            .unwrap();
        let b = store
            .stage_chunk(&file.file_id, 0, 4, body(b"bbbb"))
            .await
            .unwrap();

        let (ra, rb) = tokio::join!(
            store.compare_and_advance_limit(a, 0),
            store.compare_and_advance_limit(b, 0)
        );
        assert!(ra.unwrap() ^ rb.unwrap());
        assert_eq!(store.find_by_file_id(&file.file_id).await.unwrap().limit, 4);
    }

    #[tokio::test]
    async fn test_short_body_is_interrupted() {
        let (dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();

        let result = store.stage_chunk(&file.file_id, 0, 10, body(b"hel")).await;
        assert!(matches!(
            result,
            Err(StoreError::Interrupted {
                expected: 10,
                received: 3
            })
        ));

        let result = store
            .stage_chunk(&file.file_id, 0, 10, broken_body(b"hello"))
            .await;
        assert!(matches!(result, Err(StoreError::Interrupted { .. })));

        assert_eq!(store.find_by_file_id(&file.file_id).await.unwrap().limit, 0);
        assert!(staging_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_long_body_overflows() {
        let (dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();

        let result = store
            .stage_chunk(&file.file_id, 0, 3, body(b"hello"))
            .await;
        assert!(matches!(result, Err(StoreError::Overflow { expected: 3 })));
        assert!(staging_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_total_length_is_set_once() {
        let (_dir, store) = store().await;
        let file = store.create(storage(None)).await.unwrap();

        let file = store.set_total_length(&file.file_id, 100).await.unwrap();
        assert_eq!(file.total_length, Some(100));
        let file = store.set_total_length(&file.file_id, 200).await.unwrap();
        assert_eq!(file.total_length, Some(100));
    }

    #[tokio::test]
    async fn test_transition_state() {
        let (_dir, store) = store().await;
        let file = store.create(storage(Some(1))).await.unwrap();
        let id = &file.file_id;

        assert!(store
            .transition_state(id, FileState::New, FileState::Uploading)
            .await
            .unwrap());
        // Stale `from` is a benign miss
        assert!(!store
            .transition_state(id, FileState::New, FileState::Uploading)
            .await
            .unwrap());
        assert!(matches!(
            store
                .transition_state(id, FileState::Uploading, FileState::New)
                .await,
            Err(StoreError::InvalidTransition { .. })
        ));
        assert!(store
            .transition_state(id, FileState::Uploading, FileState::Complete)
            .await
            .unwrap());
        assert!(store
            .transition_state(id, FileState::Complete, FileState::Expired)
            .await
            .unwrap());
        assert!(matches!(
            store
                .transition_state(id, FileState::Expired, FileState::Deleted)
                .await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_hides_record_and_reclaims_bytes() {
        let (dir, store) = store().await;
        let file = store.create(storage(Some(5))).await.unwrap();
        write(&store, &file.file_id, 0, b"hello").await;

        store.delete(&file.file_id).await.unwrap();

        assert!(!dir
            .path()
            .join("files")
            .join(format!("{}.bin", file.file_id))
            .exists());
        assert!(matches!(
            store.find_by_download_token(&file.download_token).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete(&file.file_id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store
                .stage_chunk(&file.file_id, 5, 1, body(b"x"))
                .await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_all_for_account() {
        let (_dir, store) = store().await;
        store.create(storage(None)).await.unwrap();
        store.create(storage(None)).await.unwrap();
        let other = store
            .create(NewCacheFile::new(
                "acct-2",
                FileKind::Transfer,
                Duration::hours(1),
            ))
            .await
            .unwrap();

        assert_eq!(store.delete_all_for_account("acct-1").await.unwrap(), 2);
        assert_eq!(store.delete_all_for_account("acct-1").await.unwrap(), 0);
        assert!(store.find_by_file_id(&other.file_id).await.is_ok());

        let stats = store.stats().await;
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.new, 1);
    }

    #[tokio::test]
    async fn test_expire_and_purge() {
        let (dir, store) = store().await;
        let due = store.create(storage(Some(1))).await.unwrap();
        let fresh = store
            .create(NewCacheFile::new("acct-1", FileKind::Storage, Duration::days(1)))
            .await
            .unwrap();

        let later = Utc::now() + Duration::hours(2);
        assert_eq!(store.expire_due(later).await.unwrap(), 1);
        assert!(matches!(
            store.find_by_upload_token(&due.upload_token).await,
            Err(StoreError::NotFound)
        ));
        assert!(store.find_by_file_id(&fresh.file_id).await.is_ok());

        assert_eq!(store.purge_tombstones(Utc::now() - Duration::hours(1)).await.unwrap(), 0);
        assert_eq!(store.purge_tombstones(later).await.unwrap(), 1);
        assert!(!dir
            .path()
            .join("files")
            .join(format!("{}.json", due.file_id))
            .exists());
        assert_eq!(store.stats().await.expired, 0);
    }

    #[tokio::test]
    async fn test_init_reloads_records_and_clears_staging() {
        let dir = tempdir().unwrap();
        let (file, deleted) = {
            let store = LocalFileStore::new(dir.path());
            store.init().await.unwrap();
            let file = store.create(storage(Some(10))).await.unwrap();
            write(&store, &file.file_id, 0, b"hello").await;
            let deleted = store.create(storage(None)).await.unwrap();
            store.delete(&deleted.file_id).await.unwrap();
            (file, deleted)
        };
        std::fs::write(dir.path().join("staging").join("leftover.chunk"), b"x").unwrap();

        let store = LocalFileStore::new(dir.path());
        assert_eq!(store.init().await.unwrap(), 2);
        assert!(staging_is_empty(dir.path()));

        let reloaded = store.find_by_upload_token(&file.upload_token).await.unwrap();
        assert_eq!(reloaded.limit, 5);
        assert_eq!(read_all(&store, &file.file_id, 0, 5).await, b"hello");
        assert!(matches!(
            store.find_by_file_id(&deleted.file_id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_open_range_beyond_limit_fails() {
        let (_dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();
        write(&store, &file.file_id, 0, b"abc").await;

        assert!(store.open_range(&file.file_id, 0, 4).await.is_err());
        assert!(read_all(&store, &file.file_id, 3, 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_open_range_on_unlinked_bytes_is_not_found() {
        let (_dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();
        write(&store, &file.file_id, 0, b"abc").await;

        fs::remove_file(store.data_path(&file.file_id)).await.unwrap();

        assert!(matches!(
            store.open_range(&file.file_id, 0, 3).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_short_staged_copy_is_a_storage_failure() {
        let (_dir, store) = store().await;
        let file = store.create(storage(Some(10))).await.unwrap();

        let chunk = store
            .stage_chunk(&file.file_id, 0, 5, body(b"hello"))
            .await
            .unwrap();
        fs::write(&chunk.path, b"he").await.unwrap();

        let result = store.compare_and_advance_limit(chunk, 0).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.find_by_file_id(&file.file_id).await.unwrap().limit, 0);
    }
}
