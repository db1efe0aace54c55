//! HTTP rendering of worker errors.
//!
//! The worker only lets `OFFLINE` escape for intercepted requests; anything
//! else reaching here came from a passthrough request or the proxy itself.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gym_sync_core::Error;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Serialize)]
struct ErrorMessage {
    code: &'static str,
    message: String,
}

/// Proxy-level error wrapper.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ProxyError(#[from] pub Error);

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Offline(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::InvalidInput(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    fn code(&self) -> &'static str {
        match &self.0 {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Database(_) | Error::MigrationFailed(_) | Error::NamespaceClosed(_) | Error::CorruptEntry(_) => {
                "CACHE_ERROR"
            }
            Error::Network(_) => "NETWORK_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::ManifestInvalid(_) => "MANIFEST_INVALID",
            Error::Offline(_) => "OFFLINE",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");

        let body = ErrorBody { error: ErrorMessage { code: self.code(), message: self.0.to_string() } };
        (status, Json(body)).into_response()
    }
}
