//! CLI presentation: text and json formatters per command family.

mod customers;
mod sync;

pub use customers::{format_customer_page_json, format_customer_page_text, format_customer_text};
pub use sync::{
    format_progress_line, format_recent_rows, format_sync_status_json, format_sync_status_text,
    format_sync_summary,
};
