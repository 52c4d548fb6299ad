//! Durable CacheFile records and their bytes
//!
//! A `CacheFile` is addressed three ways (file id, upload token, download
//! token) and carries a single high-water mark `limit` of contiguous bytes
//! committed from offset 0. The [`FileStore`] trait is the only way handlers
//! touch records; [`LocalFileStore`] implements it on the local filesystem.

mod error;
mod local;
mod store;
mod sweeper;
mod types;

pub use error::{Result, StoreError};
pub use local::LocalFileStore;
pub use store::{ByteStream, FileStore, StagedChunk};
pub use sweeper::{SweepReport, Sweeper};
pub use types::{
    generate_file_id, generate_token, CacheFile, FileKind, FileState, NewCacheFile, StoreStats,
};
