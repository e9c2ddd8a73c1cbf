//! Error types for the custsync client.

use thiserror::Error;

/// Errors raised by the job-control client, the progress stream, and the record API.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server answered with a non-success status.
    #[error("Request rejected with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        status: u16,
        message: Option<String>,
    },

    /// The request never produced a response (connect, timeout, broken body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A payload could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The sync job itself ended in `failed`.
    #[error("{0}")]
    JobFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Message shown to the user: the server-supplied message when present, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            SyncError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Rejected { status: 404, .. })
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
