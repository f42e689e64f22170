use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Receiver-boundary errors (spec §7): surfaced to the client, never retried.
#[derive(Debug, Error)]
pub enum IngressDecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("empty bulk payload")]
    EmptyBulk,
}

impl IntoResponse for IngressDecodeError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// A subscriber's outbound channel was full and it was evicted. Non-fatal.
#[derive(Debug, Error)]
#[error("subscriber {0} overflowed its outbound queue and was evicted")]
pub struct SubscriberOverflow(pub String);

/// Remaining work was dropped because the global shutdown deadline elapsed.
#[derive(Debug, Error)]
#[error("shutdown deadline elapsed with work still in flight")]
pub struct ShutdownTimeout;
