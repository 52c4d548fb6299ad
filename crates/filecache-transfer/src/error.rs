//! Error taxonomy surfaced to transfer clients

use filecache_store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum TransferError {
    /// Malformed or missing headers, size mismatches, capacity exceeded
    Validation(String),
    /// Requested range lies outside the `available` bytes
    RangeNotSatisfiable { available: u64 },
    /// Unknown, expired or deleted handle
    NotFound,
    /// Client went away mid-chunk; nothing was committed
    InterruptedTransfer(String),
    Internal(String),
}

impl TransferError {
    pub fn validation(reason: impl Into<String>) -> Self {
        TransferError::Validation(reason.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            TransferError::Validation(_) => 400,
            TransferError::RangeNotSatisfiable { .. } => 416,
            TransferError::NotFound => 404,
            TransferError::InterruptedTransfer(_) => 400,
            TransferError::Internal(_) => 500,
        }
    }

    /// Client-facing reason; internal details stay in the logs
    pub fn reason(&self) -> String {
        match self {
            TransferError::Internal(_) => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Validation(msg) => write!(f, "{}", msg),
            TransferError::RangeNotSatisfiable { available } => {
                write!(f, "range not satisfiable ({} bytes available)", available)
            }
            TransferError::NotFound => write!(f, "file not found"),
            TransferError::InterruptedTransfer(msg) => write!(f, "transfer interrupted: {}", msg),
            TransferError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => TransferError::NotFound,
            StoreError::Interrupted { .. } => TransferError::InterruptedTransfer(err.to_string()),
            StoreError::Overflow { .. } => {
                TransferError::Validation("request body exceeds content length".to_string())
            }
            StoreError::InvalidTransition { .. } | StoreError::Io(_) | StoreError::Metadata(_) => {
                TransferError::Internal(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
