//! Shared HTTP plumbing: client construction and error mapping.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;

/// Build a reqwest client.
///
/// `request_timeout` bounds the whole exchange including the body, so the
/// long-lived progress stream is built without one.
pub fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
) -> Result<Client, SyncError> {
    let mut builder = Client::builder().no_proxy().connect_timeout(connect_timeout);
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Map a reqwest failure into the crate error.
pub fn map_http_error(error: reqwest::Error) -> SyncError {
    if let Some(status) = error.status() {
        SyncError::Rejected {
            status: status.as_u16(),
            message: None,
        }
    } else if error.is_timeout() {
        SyncError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        SyncError::Transport(format!("Connection error: {}", error))
    } else if error.is_decode() {
        SyncError::Decode(format!("Failed to decode response: {}", error))
    } else {
        SyncError::Transport(format!("HTTP error: {}", error))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<Value>,
}

/// Pull a human-readable message out of an error body shaped `{ message?: string | string[] }`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.message? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

/// Pass successful responses through; turn anything else into [`SyncError::Rejected`].
pub async fn ensure_success(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Rejected {
        status: status.as_u16(),
        message: extract_error_message(&body),
    })
}

/// Join a base URL and a path without doubling or dropping the slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
