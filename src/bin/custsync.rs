//! Custsync CLI Binary
//!
//! Command-line interface for customer records and bulk sync progress.

use anyhow::Context;
use clap::Parser;
use custsync::cli::{Cli, RunContext};
use custsync::config::ConfigLoader;
use custsync::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Custsync CLI starting");

    let context = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error initializing CLI context: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command).await {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", custsync::cli::map_error(&e));
            process::exit(1);
        }
    }
}

fn build_context(cli: &Cli) -> anyhow::Result<RunContext> {
    let context = RunContext::new(
        cli.workspace.clone(),
        cli.config.clone(),
        cli.base_url.clone(),
    )
    .with_context(|| format!("Failed to load configuration for {}", cli.workspace.display()))?;
    info!(base_url = %context.config().api.base_url, "CLI context initialized");
    Ok(context)
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
        if cli.log_output.is_none() {
            config.output = "file".to_string();
        }
    }

    config
}
