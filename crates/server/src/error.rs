//! HTTP error mapping.
//!
//! The one place error kinds become status codes. Bodies are always
//! `{"message": "..."}`; backend and render details stay in the logs, not
//! in 500 responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use mirage_core::Error;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::InvalidInput(_) | Error::InvalidUrl(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            Error::Busy(_) => Self::new(StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            Error::CacheNotFound(_) => Self::new(StatusCode::NOT_FOUND, "not found"),
            Error::Render(_) | Error::EmptyRender(_) => {
                tracing::error!(error = %err, "render failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "render failed")
            }
            Error::Backend(_) | Error::Internal(_) => {
                tracing::error!(error = %err, "internal error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}
