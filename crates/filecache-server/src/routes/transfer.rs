use crate::error::ApiError;
use crate::state::SharedState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use filecache_transfer::UploadRequest;
use futures_util::TryStreamExt;

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// PUT /{token}
/// Stores one chunk (or the whole file) and reports progress.
pub async fn upload(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let request = UploadRequest {
        content_length: header_value(&headers, header::CONTENT_LENGTH),
        content_range: header_value(&headers, header::CONTENT_RANGE),
        body: Box::pin(body.into_data_stream().map_err(std::io::Error::other)),
    };

    match state.uploads.handle_upload(&token, request).await {
        Ok(outcome) => {
            let mut builder = Response::builder()
                .status(outcome.status())
                .header(header::CONTENT_LENGTH, 0);
            if let Some(range) = outcome.range_header() {
                builder = builder.header(header::RANGE, range);
            }
            builder
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /{token}
/// Streams committed bytes, honouring a single `Range`.
pub async fn download(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = header_value(&headers, header::RANGE);

    match state.downloads.handle_download(&token, range.as_deref()).await {
        Ok(download) => {
            let mut builder = Response::builder()
                .status(download.status)
                .header(header::CONTENT_TYPE, download.content_type)
                .header(header::CONTENT_LENGTH, download.content_length)
                .header(header::ACCEPT_RANGES, "bytes");
            if let Some(content_range) = download.content_range {
                builder = builder.header(header::CONTENT_RANGE, content_range);
            }
            builder
                .body(Body::from_stream(download.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// DELETE /{token}
/// Accepts the upload token or the file id; download tokens cannot delete.
pub async fn delete(State(state): State<SharedState>, Path(token): Path<String>) -> Response {
    match state.uploads.handle_delete(&token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
