//! Sync job data model and progress event decoding.
//!
//! The server owns the job; everything here is a read-only projection of what
//! the job-control endpoints and the progress stream report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::customers::Customer;
use crate::error::SyncError;

/// Lifecycle of a server-side sync job. Once terminal, a job never moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to `POST /customers/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStarted {
    pub total_rows: u64,
    pub total_pages: u64,
}

/// Response to `GET /customers/sync/status` when a job exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub status: JobStatus,
    pub processed_rows: u64,
    pub total_rows: u64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// Counters carried by every progress event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressCounters {
    pub processed_rows: u64,
    pub total_rows: u64,
    /// Absent when the server omits it; owners keep their previous value.
    pub total_pages: Option<u64>,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub recent_rows: Vec<Customer>,
}

/// One decoded progress event, tagged by the job status it reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Pending(ProgressCounters),
    Processing(ProgressCounters),
    Completed(ProgressCounters),
    Failed(ProgressCounters),
    Cancelled(ProgressCounters),
}

impl ProgressEvent {
    pub fn status(&self) -> JobStatus {
        match self {
            ProgressEvent::Pending(_) => JobStatus::Pending,
            ProgressEvent::Processing(_) => JobStatus::Processing,
            ProgressEvent::Completed(_) => JobStatus::Completed,
            ProgressEvent::Failed(_) => JobStatus::Failed,
            ProgressEvent::Cancelled(_) => JobStatus::Cancelled,
        }
    }

    pub fn counters(&self) -> &ProgressCounters {
        match self {
            ProgressEvent::Pending(c)
            | ProgressEvent::Processing(c)
            | ProgressEvent::Completed(c)
            | ProgressEvent::Failed(c)
            | ProgressEvent::Cancelled(c) => c,
        }
    }

    pub fn into_counters(self) -> ProgressCounters {
        match self {
            ProgressEvent::Pending(c)
            | ProgressEvent::Processing(c)
            | ProgressEvent::Completed(c)
            | ProgressEvent::Failed(c)
            | ProgressEvent::Cancelled(c) => c,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProgressEvent {
    processed_rows: u64,
    total_rows: u64,
    #[serde(default)]
    total_pages: Option<u64>,
    progress: f64,
    status: JobStatus,
    #[serde(default)]
    estimated_completion: Option<DateTime<Utc>>,
    #[serde(default)]
    recent_rows: Option<Value>,
}

/// Decode one stream payload into a typed event.
///
/// Non-finite progress is rejected; finite values are clamped into `[0, 100]`.
pub fn decode_progress_event(raw: &str) -> Result<ProgressEvent, SyncError> {
    let wire: WireProgressEvent = serde_json::from_str(raw)?;
    if !wire.progress.is_finite() {
        return Err(SyncError::Decode(format!(
            "progress is not a finite number: {}",
            wire.progress
        )));
    }

    let counters = ProgressCounters {
        processed_rows: wire.processed_rows,
        total_rows: wire.total_rows,
        total_pages: wire.total_pages,
        progress: wire.progress.clamp(0.0, 100.0),
        estimated_completion: wire.estimated_completion,
        recent_rows: preview_rows(wire.recent_rows),
    };

    Ok(match wire.status {
        JobStatus::Pending => ProgressEvent::Pending(counters),
        JobStatus::Processing => ProgressEvent::Processing(counters),
        JobStatus::Completed => ProgressEvent::Completed(counters),
        JobStatus::Failed => ProgressEvent::Failed(counters),
        JobStatus::Cancelled => ProgressEvent::Cancelled(counters),
    })
}

/// Read the `recentRows` preview row by row. Rows that do not fit [`Customer`]
/// are skipped; the preview never rejects the event carrying it.
fn preview_rows(raw: Option<Value>) -> Vec<Customer> {
    let rows = match raw {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(rows)) => rows,
        Some(_) => {
            warn!("Ignoring recentRows that is not a list");
            return Vec::new();
        }
    };
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value::<Customer>(row) {
            Ok(customer) => Some(customer),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed recent row");
                None
            }
        })
        .collect()
}

/// Whole seconds until `estimated_completion`, never negative.
pub fn eta_seconds(estimated_completion: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining_ms = (estimated_completion - now).num_milliseconds();
    if remaining_ms <= 0 {
        0
    } else {
        (remaining_ms / 1000) as u64
    }
}
