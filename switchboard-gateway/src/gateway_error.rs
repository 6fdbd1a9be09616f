//! # Gateway Error Mapping
//!
//! [`GatewayError`] wraps the router's error taxonomy and maps every
//! variant to the HTTP contract of the OpenAI-compatible surface:
//!
//! - no eligible provider → `503` with code `NO_PROVIDER`
//! - permanent upstream answer → the upstream's own status passed through
//! - transient upstream failure after retries → `502`
//! - caller cancellation → `499`
//! - invalid requests and admin input → `400` / `404` / `409`
//!
//! Every response body is the structured
//! `{"error": {"code", "message", "type"}}` shape clients already parse.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use switchboard_router::error::RouterError;

/// Client-closed-request, nginx-style. Axum has no named constant for it.
const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Errors surfaced by the smart router
    #[error("router error: {0}")]
    Router(#[from] RouterError),

    /// JSON serialization and deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or unacceptable request input
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Internal gateway failures
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::Router(RouterError::NoAvailableProvider) => {
                (StatusCode::SERVICE_UNAVAILABLE, "NO_PROVIDER")
            }
            GatewayError::Router(RouterError::Cancelled) => (
                StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::BAD_REQUEST),
                "CLIENT_CLOSED_REQUEST",
            ),
            GatewayError::Router(RouterError::Upstream { source, .. }) => {
                if !source.is_retryable() {
                    // Permanent upstream answers pass through verbatim.
                    let status = source
                        .upstream_status()
                        .and_then(|code| StatusCode::from_u16(code).ok())
                        .unwrap_or(StatusCode::BAD_GATEWAY);
                    (status, "UPSTREAM_REJECTED")
                } else {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE")
                }
            }
            GatewayError::Router(RouterError::InvalidConfig { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_CONFIG")
            }
            GatewayError::Router(RouterError::UnknownProvider { .. }) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_PROVIDER")
            }
            GatewayError::Router(RouterError::DuplicateProvider { .. }) => {
                (StatusCode::CONFLICT, "DUPLICATE_PROVIDER")
            }
            GatewayError::Serialization(_) => (StatusCode::BAD_REQUEST, "INVALID_BODY"),
            GatewayError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            GatewayError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "type": "gateway_error",
            }
        }));
        (status, body).into_response()
    }
}
