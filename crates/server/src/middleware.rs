//! API-key gate and error logging.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const BODY_PREVIEW_LIMIT: usize = 512;

/// Accept requests carrying the general or the admin API key.
pub async fn require_api_key(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let provided = api_key(&request);
    if provided != state.config.app.key && provided != state.config.app.admin_key {
        return ApiError::forbidden().into_response();
    }
    next.run(request).await
}

/// Accept only requests carrying the admin API key.
pub async fn require_admin_key(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    if api_key(&request) != state.config.app.admin_key {
        return ApiError::forbidden().into_response();
    }
    next.run(request).await
}

fn api_key<'a>(request: &'a Request<Body>) -> &'a str {
    request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Log method, path, query, and a body preview for every failed request.
pub async fn log_errors(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return ApiError::bad_request("unreadable request body").into_response(),
    };
    let preview_len = bytes.len().min(BODY_PREVIEW_LIMIT);
    let preview = String::from_utf8_lossy(&bytes[..preview_len]).into_owned();
    let request = Request::from_parts(parts, Body::from(bytes));

    let response = next.run(request).await;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        tracing::error!(
            status = status.as_u16(),
            method = %method,
            path = uri.path(),
            query = uri.query().unwrap_or_default(),
            body = %preview,
            "request failed"
        );
    }
    response
}
