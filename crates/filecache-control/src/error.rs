//! Error types for the control channel client

use std::fmt;

#[derive(Debug)]
pub enum ControlError {
    /// No usable connection; safe to retry
    Disconnected(String),
    /// The named phase (`connect` or `request`) exceeded its deadline
    Timeout(&'static str),
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    Json(String),
    /// The remote side answered with a JSON-RPC error
    Rpc { code: i64, message: String },
    /// The remote side answered with something that is not a valid reply
    Protocol(String),
}

impl ControlError {
    /// Whether the connection must be dropped and re-established
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ControlError::Disconnected(_) | ControlError::Timeout(_) | ControlError::WebSocket(_)
        )
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Disconnected(msg) => write!(f, "Control channel disconnected: {}", msg),
            ControlError::Timeout(phase) => write!(f, "Control channel {} timed out", phase),
            ControlError::WebSocket(err) => write!(f, "WebSocket error: {}", err),
            ControlError::Json(msg) => write!(f, "JSON error: {}", msg),
            ControlError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            ControlError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::WebSocket(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ControlError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ControlError::WebSocket(Box::new(err))
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ControlError::Timeout("request");
        assert_eq!(format!("{}", err), "Control channel request timed out");
    }

    #[test]
    fn test_rpc_error_display() {
        let err = ControlError::Rpc {
            code: -32001,
            message: "file not found".to_string(),
        };
        assert_eq!(format!("{}", err), "RPC error -32001: file not found");
    }

    #[test]
    fn test_connection_errors() {
        assert!(ControlError::Disconnected("reset".to_string()).is_connection_error());
        assert!(ControlError::Timeout("connect").is_connection_error());
        assert!(!ControlError::Json("eof".to_string()).is_connection_error());
        assert!(!ControlError::Rpc {
            code: -32602,
            message: "bad".to_string()
        }
        .is_connection_error());
    }
}
