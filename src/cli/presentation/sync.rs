//! Sync command presentation: progress lines, final summary, status text/json.

use chrono::{DateTime, Utc};
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

use crate::controller::ClientProgressSnapshot;
use crate::customers::Customer;
use crate::job::{eta_seconds, SyncJob};
use crate::timefmt::{format_count, format_duration};

/// One line per snapshot while a job is followed.
pub fn format_progress_line(snapshot: &ClientProgressSnapshot) -> String {
    format!(
        "Upload progress: {:.1}% | Processed: {} / {} | Elapsed: {} | ETA: {}",
        snapshot.upload_progress,
        format_count(snapshot.processed),
        format_count(snapshot.total_rows),
        format_duration(snapshot.elapsed),
        format_duration(snapshot.eta),
    )
}

/// Closing line once the controller stopped tracking.
pub fn format_sync_summary(snapshot: &ClientProgressSnapshot) -> String {
    let finished = snapshot.total_rows > 0 && snapshot.processed >= snapshot.total_rows;
    if finished || snapshot.upload_progress >= 100.0 {
        format!(
            "{} {} rows in {}",
            "Sync completed:".green().bold(),
            format_count(snapshot.processed),
            format_duration(snapshot.elapsed)
        )
    } else {
        format!(
            "{} at {} / {} rows after {}",
            "Sync no longer tracked".yellow().bold(),
            format_count(snapshot.processed),
            format_count(snapshot.total_rows),
            format_duration(snapshot.elapsed)
        )
    }
}

pub fn format_recent_rows(rows: &[Customer]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Customer ID", "Name", "Email", "Company"]);
    for row in rows {
        table.add_row(vec![
            row.customer_id.clone(),
            row.full_name(),
            row.email.clone(),
            row.company.clone(),
        ]);
    }
    table.to_string()
}

pub fn format_sync_status_text(job: Option<&SyncJob>, now: DateTime<Utc>) -> String {
    let Some(job) = job else {
        return "No sync job found.".to_string();
    };
    let mut output = format!("Status: {}\n", job.status);
    output.push_str(&format!(
        "Processed: {} / {} ({:.1}%)\n",
        format_count(job.processed_rows),
        format_count(job.total_rows),
        job.progress
    ));
    if let Some(started) = job.started_at {
        output.push_str(&format!("Started: {}\n", started.to_rfc3339()));
    }
    match job.estimated_completion {
        Some(at) if job.status.is_active() => {
            output.push_str(&format!("ETA: {}\n", format_duration(eta_seconds(at, now))));
        }
        _ => {}
    }
    output.trim_end().to_string()
}

pub fn format_sync_status_json(job: Option<&SyncJob>) -> String {
    let out = match job {
        Some(job) => json!({ "job": job }),
        None => json!({ "job": null }),
    };
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
