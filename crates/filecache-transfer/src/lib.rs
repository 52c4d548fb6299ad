//! Resumable upload and range-aware download protocols
//!
//! The handlers are transport neutral: they take header values and a byte
//! stream and hand back a status, headers and a byte stream. Binding them to
//! an HTTP server is left to the caller.

mod download;
mod error;
mod stats;
mod upload;
mod validation;

pub use download::{DownloadHandler, DownloadResponse};
pub use error::{Result, TransferError};
pub use stats::{TransferCounters, TransferStats};
pub use upload::{UploadHandler, UploadOutcome, UploadRequest};
pub use validation::{
    parse_content_length, parse_content_range, plan_upload, resolve_download_range, ByteSpan,
    ContentRange, Progress, UploadPlan,
};
