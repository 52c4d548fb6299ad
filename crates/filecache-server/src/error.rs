//! Error types for the file cache server

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use filecache_transfer::TransferError;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    Store(filecache_store::StoreError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Store(err) => write!(f, "Store error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Store(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<filecache_store::StoreError> for ServerError {
    fn from(err: filecache_store::StoreError) -> Self {
        ServerError::Store(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Transfer failure rendered as an HTTP response with `{"error": reason}`
#[derive(Debug)]
pub struct ApiError(pub TransferError);

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match &err {
            TransferError::NotFound => tracing::debug!("File not found"),
            TransferError::Internal(msg) => tracing::error!(error = %msg, "Storage failure"),
            other => tracing::warn!(error = %other, "Rejected transfer request"),
        }

        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::Json(json!({ "error": err.reason() }));

        match err {
            TransferError::RangeNotSatisfiable { available } => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", available))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ServerError::Config("bad directive".to_string());
        assert_eq!(format!("{}", err), "Configuration error: bad directive");
    }

    #[test]
    fn test_store_error_display() {
        let err = ServerError::from(filecache_store::StoreError::NotFound);
        assert_eq!(format!("{}", err), "Store error: File not found");
    }

    #[test]
    fn test_api_error_status() {
        let response = ApiError(TransferError::validation("bad")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError(TransferError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError(TransferError::Internal("eio".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_range_error_carries_content_range() {
        let response =
            ApiError(TransferError::RangeNotSatisfiable { available: 512 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */512"
        );
    }
}
