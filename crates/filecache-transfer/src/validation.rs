//! Header parsing and range arithmetic for uploads and downloads
//!
//! Everything here is pure: the handlers feed in the current progress of a
//! file plus the raw header values and get back what to do.

use crate::error::{Result, TransferError};

/// Parsed `Content-Range` request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRange {
    /// `bytes <start>-<end>/<total>`; `end` may be omitted, `total` may be `*`
    Span {
        start: u64,
        end: Option<u64>,
        total: Option<u64>,
    },
    /// `bytes */<total>`: asks for progress without sending bytes
    Status { total: Option<u64> },
}

/// Current upload progress of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total_length: Option<u64>,
    pub limit: u64,
    pub complete: bool,
}

/// What an upload request resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    /// Report progress, write nothing
    Status,
    /// Every byte of the request is already durable
    Duplicate { total: u64 },
    /// Discard the first `skip` body bytes, then write `len` bytes at `offset`
    Write {
        total: u64,
        offset: u64,
        skip: u64,
        len: u64,
    },
}

/// Inclusive byte span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub start: u64,
    pub end: u64,
}

impl ByteSpan {
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }
}

pub fn parse_content_length(value: Option<&str>) -> Result<u64> {
    let value = value.ok_or_else(|| TransferError::validation("content length not specified"))?;
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| TransferError::validation(format!("invalid content length: {}", value)))
}

pub fn parse_content_range(value: &str) -> Result<ContentRange> {
    let invalid = || TransferError::validation(format!("invalid content range: {}", value));

    let spec = value.trim().strip_prefix("bytes ").ok_or_else(invalid)?;
    let (range, total) = spec.split_once('/').ok_or_else(invalid)?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().map_err(|_| invalid())?),
    };

    let range = range.trim();
    if range == "*" {
        return Ok(ContentRange::Status { total });
    }

    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start = start.trim().parse::<u64>().map_err(|_| invalid())?;
    let end = match end.trim() {
        "" => None,
        e => Some(e.parse::<u64>().map_err(|_| invalid())?),
    };
    Ok(ContentRange::Span { start, end, total })
}

/// Validate an upload request against the file's progress.
///
/// Checks run in a fixed order: content length, content range syntax, status
/// query, completion, total resolution, then range arithmetic.
pub fn plan_upload(
    progress: &Progress,
    content_length: Option<&str>,
    content_range: Option<&str>,
    max_file_size: u64,
) -> Result<UploadPlan> {
    let content_length = parse_content_length(content_length)?;
    let range = content_range.map(parse_content_range).transpose()?;

    if let Some(ContentRange::Status { .. }) = range {
        if content_length != 0 {
            return Err(TransferError::validation(
                "status query must not carry a body",
            ));
        }
        return Ok(UploadPlan::Status);
    }

    if progress.complete {
        return Err(TransferError::validation("no remaining capacity"));
    }

    let range_total = match range {
        Some(ContentRange::Span { total, .. }) => Some(total),
        _ => None,
    };
    let total = match (progress.total_length, range_total) {
        (Some(known), Some(Some(claimed))) if known != claimed => {
            return Err(TransferError::validation(format!(
                "total length mismatch: file is {} bytes, request claims {}",
                known, claimed
            )));
        }
        (Some(known), _) => known,
        (None, Some(Some(claimed))) => claimed,
        (None, Some(None)) => {
            return Err(TransferError::validation("total length not specified"));
        }
        (None, None) => content_length,
    };
    if total > max_file_size {
        return Err(TransferError::validation(format!(
            "file size {} exceeds maximum of {} bytes",
            total, max_file_size
        )));
    }

    let (start, end) = match range {
        Some(ContentRange::Span { start, end, .. }) => {
            let end = match end.or_else(|| total.checked_sub(1)) {
                Some(end) => end,
                None => {
                    return Err(TransferError::RangeNotSatisfiable { available: total });
                }
            };
            (start, end)
        }
        _ => {
            if content_length > total - progress.limit {
                return Err(TransferError::validation(format!(
                    "content length {} exceeds remaining capacity of {} bytes",
                    content_length,
                    total - progress.limit
                )));
            }
            if content_length == 0 {
                // Only an empty file can be completed by an empty body
                return Ok(if total == 0 {
                    UploadPlan::Write {
                        total,
                        offset: 0,
                        skip: 0,
                        len: 0,
                    }
                } else {
                    UploadPlan::Duplicate { total }
                });
            }
            (0, content_length - 1)
        }
    };

    if start > end {
        return Err(TransferError::validation(format!(
            "invalid content range: start {} is after end {}",
            start, end
        )));
    }
    // A span of 2^64 bytes cannot match any content length
    let span = (end - start).checked_add(1);
    if span != Some(content_length) {
        return Err(TransferError::validation(format!(
            "content length {} does not match range {}-{}",
            content_length, start, end
        )));
    }
    if end >= total {
        return Err(TransferError::RangeNotSatisfiable { available: total });
    }
    if start > progress.limit {
        return Err(TransferError::validation(format!(
            "chunk starts at {} but only {} bytes are stored",
            start, progress.limit
        )));
    }
    if end < progress.limit {
        return Ok(UploadPlan::Duplicate { total });
    }

    Ok(UploadPlan::Write {
        total,
        offset: progress.limit,
        skip: progress.limit - start,
        len: end + 1 - progress.limit,
    })
}

/// Resolve a `Range` request header against the `limit` committed bytes.
///
/// Returns `None` when no range was requested. Only a single range is
/// supported; a range reaching past the committed bytes is unsatisfiable.
pub fn resolve_download_range(range: Option<&str>, limit: u64) -> Result<Option<ByteSpan>> {
    let value = match range {
        Some(value) => value,
        None => return Ok(None),
    };
    let invalid = || TransferError::validation(format!("invalid range: {}", value));
    let unsatisfiable = TransferError::RangeNotSatisfiable { available: limit };

    let spec = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    if spec.contains(',') {
        return Err(TransferError::validation("multiple ranges are not supported"));
    }
    let (start, end) = spec.split_once('-').ok_or_else(invalid)?;
    let (start, end) = (start.trim(), end.trim());

    let span = match (start.is_empty(), end.is_empty()) {
        (true, true) => return Err(invalid()),
        // Suffix: the last `n` bytes
        (true, false) => {
            let n = end.parse::<u64>().map_err(|_| invalid())?;
            if n == 0 || limit == 0 {
                return Err(unsatisfiable);
            }
            ByteSpan {
                start: limit.saturating_sub(n),
                end: limit - 1,
            }
        }
        (false, true) => {
            let start = start.parse::<u64>().map_err(|_| invalid())?;
            if start >= limit {
                return Err(unsatisfiable);
            }
            ByteSpan {
                start,
                end: limit - 1,
            }
        }
        (false, false) => {
            let start = start.parse::<u64>().map_err(|_| invalid())?;
            let end = end.parse::<u64>().map_err(|_| invalid())?;
            if start > end {
                return Err(TransferError::validation(format!(
                    "invalid range: start {} is after end {}",
                    start, end
                )));
            }
            if end >= limit {
                return Err(unsatisfiable);
            }
            ByteSpan { start, end }
        }
    };
    Ok(Some(span))
}
