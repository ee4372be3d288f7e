//! `POST /mail`: bearer-token check, JSON parsing, and the relay call.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{ApiError, RelayResult};
use crate::relay::{is_single_line, Relay};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<dyn Relay>,
}

impl AppState {
    pub fn new(config: Arc<Config>, relay: Arc<dyn Relay>) -> Self {
        AppState { config, relay }
    }
}

/// Incoming relay request. `ip` is only logged.
#[derive(Debug, Deserialize)]
pub struct MailRequest {
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub ip: String,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route("/mail", post(send_mail).fallback(not_found))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn send_mail(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match relay_request(&state, &headers, body).await {
        Ok(()) => RelayResult::ok().into_response_with(StatusCode::OK),
        Err(err) => err.into_response(),
    }
}

async fn relay_request(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(), ApiError> {
    authorize(headers, &state.config.auth_token)?;

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::RequestFormat(format!(
                "request body exceeds {} bytes",
                state.config.max_body_bytes
            ))
        } else {
            ApiError::ReadBody(rejection.body_text())
        }
    })?;
    let request = parse_request(&body)?;

    state
        .relay
        .relay(&request.to, &request.subject, &request.body)
        .await
        .map_err(|source| ApiError::Relay {
            to: request.to.clone(),
            source,
        })?;

    tracing::info!("Successfully sent mail to {}, from {}", request.to, request.ip);
    Ok(())
}

/// Accepts only `Bearer <token>` with a single space and the exact token.
fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;
    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

fn parse_request(body: &[u8]) -> Result<MailRequest, ApiError> {
    let request: MailRequest =
        serde_json::from_slice(body).map_err(|e| ApiError::RequestFormat(e.to_string()))?;

    if !is_single_line(&request.to) {
        return Err(ApiError::RequestFormat("line break in recipient".into()));
    }
    if !is_single_line(&request.subject) {
        return Err(ApiError::RequestFormat("line break in subject".into()));
    }
    Ok(request)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
