//! CLI parse: clap types for custsync. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Custsync CLI - customer records and live bulk-sync progress
#[derive(Parser)]
#[command(name = "custsync")]
#[command(about = "Manage customer records and track bulk sync jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ is read from here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides api.base_url)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bulk sync jobs (start, watch, status)
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Customer record administration
    Customers {
        #[command(subcommand)]
        command: CustomerCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Start a bulk sync and follow its progress until it finishes
    Start {
        /// Print only the final result
        #[arg(long)]
        no_follow: bool,
    },
    /// Attach to an already-running sync job and follow it
    Watch,
    /// Show the current sync job once
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// List one page of customers
    List {
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,
        /// Rows per page (defaults to sync.page_size)
        #[arg(long)]
        limit: Option<u32>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create a customer
    Create(CreateArgs),
    /// Update fields of an existing customer
    Update(UpdateArgs),
    /// Delete a customer
    Delete {
        /// Record id
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Page currently shown; reports which page to show afterwards
        #[arg(long)]
        page: Option<u32>,
        /// Number of rows on the current page
        #[arg(long)]
        items_on_page: Option<usize>,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub customer_id: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, default_value = "")]
    pub company: String,
    #[arg(long, default_value = "")]
    pub city: String,
    #[arg(long, default_value = "")]
    pub country: String,
    #[arg(long, default_value = "")]
    pub phone1: String,
    #[arg(long, default_value = "")]
    pub phone2: String,
    /// RFC 3339 timestamp or YYYY-MM-DD (defaults to now)
    #[arg(long)]
    pub subscription_date: Option<String>,
    #[arg(long, default_value = "")]
    pub website: String,
    #[arg(long, default_value = "")]
    pub about: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Record id
    pub id: String,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub country: Option<String>,
    #[arg(long)]
    pub phone1: Option<String>,
    #[arg(long)]
    pub phone2: Option<String>,
    /// RFC 3339 timestamp or YYYY-MM-DD
    #[arg(long)]
    pub subscription_date: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
    #[arg(long)]
    pub about: Option<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}
