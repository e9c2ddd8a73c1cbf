//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::SyncError;

/// Map domain errors to a one-line message for stderr.
pub fn map_error(e: &SyncError) -> String {
    match e {
        SyncError::Rejected {
            status,
            message: Some(message),
        } if !message.trim().is_empty() => format!("{} (HTTP {})", message, status),
        SyncError::JobFailed(message) => message.clone(),
        other => other.to_string(),
    }
}
