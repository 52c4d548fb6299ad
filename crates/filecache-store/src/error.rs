//! Error types for the file store

use crate::types::FileState;
use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// No visible record for the given id or token
    NotFound,
    /// The chunk body ended before the declared length was read
    Interrupted { expected: u64, received: u64 },
    /// The chunk body carried more bytes than declared
    Overflow { expected: u64 },
    InvalidTransition { from: FileState, to: FileState },
    Io(Box<std::io::Error>),
    Metadata(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "File not found"),
            StoreError::Interrupted { expected, received } => write!(
                f,
                "Chunk interrupted: expected {} bytes, received {}",
                expected, received
            ),
            StoreError::Overflow { expected } => {
                write!(f, "Chunk exceeds declared length of {} bytes", expected)
            }
            StoreError::InvalidTransition { from, to } => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            StoreError::Io(err) => write!(f, "IO error: {}", err),
            StoreError::Metadata(msg) => write!(f, "Metadata error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Metadata(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
