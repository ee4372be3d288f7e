use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::relay::RelayError;
use crate::HttpStatus;

/// Body of every `/mail` response, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResult {
    pub success: bool,
    #[serde(rename = "msg")]
    pub message: String,
}

impl RelayResult {
    pub fn ok() -> Self {
        RelayResult {
            success: true,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        RelayResult {
            success: false,
            message: message.into(),
        }
    }

    /// Serializes `self` as the JSON body.
    ///
    /// If encoding fails the response degrades to a plain-text 500.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        match serde_json::to_vec(&self) {
            Ok(body) => (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(err) => {
                tracing::error!("Failed to serialize response: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to serialize response: {}", err),
                )
                    .into_response()
            }
        }
    }
}

/// Per-request failures, recovered at the handler boundary.
///
/// The `Display` text is what lands in the response's `msg` field, so it
/// must never include the token or SMTP credentials.
#[derive(Debug, thiserror::Error, HttpStatus)]
pub enum ApiError {
    #[error("Malformed Token")]
    #[http_status(UNAUTHORIZED)]
    Unauthorized,

    #[error("failed to parse request: {0}")]
    #[http_status(BAD_REQUEST)]
    RequestFormat(String),

    #[error("failed to read request: {0}")]
    #[http_status(INTERNAL_SERVER_ERROR)]
    ReadBody(String),

    #[error("failed to send mail to {to}: {source}")]
    #[http_status(INTERNAL_SERVER_ERROR)]
    Relay { to: String, source: RelayError },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!("Error Status {}: {}", status, self);
        } else {
            tracing::warn!("Error Status {}: {}", status, self);
        }
        RelayResult::failed(self.to_string()).into_response_with(status)
    }
}
