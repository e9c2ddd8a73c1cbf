//! CLI domain: parse, route, output, and presentation only.
//! No sync orchestration here; the route table drives the controller and API clients.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{
    Cli, Commands, ConfigCommands, CreateArgs, CustomerCommands, SyncCommands, UpdateArgs,
};
pub use presentation::{
    format_customer_page_json, format_customer_page_text, format_customer_text,
    format_progress_line, format_recent_rows, format_sync_status_json, format_sync_status_text,
    format_sync_summary,
};
pub use route::RunContext;
