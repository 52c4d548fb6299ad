//! CacheFile entity and its lifecycle state machine

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Size in bytes of the random material behind an upload/download token
const TOKEN_BYTES: usize = 32;

/// Retention class of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileKind {
    /// Persistent, downloadable any number of times until it expires
    Storage,
    /// Ephemeral, removed after its first complete download
    Transfer,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Storage => "STORAGE",
            FileKind::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a file.
///
/// Transitions only move forward: `New -> Uploading -> Complete`, and any
/// non-terminal state may move to `Expired` or `Deleted`. Terminal states
/// never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    New,
    Uploading,
    Complete,
    Expired,
    Deleted,
}

impl FileState {
    fn rank(self) -> u8 {
        match self {
            FileState::New => 0,
            FileState::Uploading => 1,
            FileState::Complete => 2,
            FileState::Expired | FileState::Deleted => 3,
        }
    }

    /// Expired and deleted records are invisible to every handler
    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Expired | FileState::Deleted)
    }

    pub fn can_transition_to(self, next: FileState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::New => "NEW",
            FileState::Uploading => "UPLOADING",
            FileState::Complete => "COMPLETE",
            FileState::Expired => "EXPIRED",
            FileState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata record for one stored or transferred blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
    pub file_id: String,
    pub upload_token: String,
    pub download_token: String,
    pub account_id: String,
    pub content_type: Option<String>,
    /// `None` until fixed by the creator or the first upload request
    pub total_length: Option<u64>,
    /// Contiguous bytes durably stored from offset 0
    pub limit: u64,
    pub kind: FileKind,
    pub state: FileState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheFile {
    pub(crate) fn from_new(new: NewCacheFile, now: DateTime<Utc>) -> Self {
        Self {
            file_id: generate_file_id(),
            upload_token: generate_token(),
            download_token: generate_token(),
            account_id: new.account_id,
            content_type: new.content_type,
            total_length: new.total_length,
            limit: 0,
            kind: new.kind,
            state: FileState::New,
            created_at: now,
            updated_at: now,
            expires_at: now + new.ttl,
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn is_complete(&self) -> bool {
        self.state == FileState::Complete
    }

    /// Bytes still missing before the file is complete, if the size is known
    pub fn remaining(&self) -> Option<u64> {
        self.total_length.map(|total| total.saturating_sub(self.limit))
    }
}

/// Parameters for creating a new record
#[derive(Debug, Clone)]
pub struct NewCacheFile {
    pub account_id: String,
    pub content_type: Option<String>,
    pub total_length: Option<u64>,
    pub kind: FileKind,
    pub ttl: Duration,
}

impl NewCacheFile {
    pub fn new(account_id: impl Into<String>, kind: FileKind, ttl: Duration) -> Self {
        Self {
            account_id: account_id.into(),
            content_type: None,
            total_length: None,
            kind,
            ttl,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        if !content_type.is_empty() {
            self.content_type = Some(content_type);
        }
        self
    }

    pub fn with_total_length(mut self, total_length: Option<u64>) -> Self {
        self.total_length = total_length;
        self
    }
}

/// Per-state record counts and committed byte volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub new: usize,
    pub uploading: usize,
    pub complete: usize,
    pub expired: usize,
    pub deleted: usize,
    pub committed_bytes: u64,
}

impl StoreStats {
    pub(crate) fn record(&mut self, file: &CacheFile) {
        match file.state {
            FileState::New => self.new += 1,
            FileState::Uploading => self.uploading += 1,
            FileState::Complete => self.complete += 1,
            FileState::Expired => self.expired += 1,
            FileState::Deleted => self.deleted += 1,
        }
        if file.is_visible() {
            self.committed_bytes += file.limit;
        }
    }
}

pub fn generate_file_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate an unguessable capability token (256 bits, hex encoded)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
