//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{HttpJobControl, JobControlApi};
use crate::cli::parse::{
    Commands, ConfigCommands, CreateArgs, CustomerCommands, SyncCommands, UpdateArgs,
};
use crate::cli::presentation::{
    format_customer_page_json, format_customer_page_text, format_customer_text,
    format_progress_line, format_recent_rows, format_sync_status_json, format_sync_status_text,
    format_sync_summary,
};
use crate::clock::{SystemClock, WallClock};
use crate::config::{ConfigLoader, CustsyncConfig};
use crate::controller::{
    ClientProgressSnapshot, ResumeOutcome, StartOutcome, SyncController, START_FAILED_MESSAGE,
};
use crate::customers::{
    page_after_delete, CustomerApi, CustomerUpdate, HttpCustomerApi, NewCustomer,
};
use crate::error::SyncError;
use crate::stream::{HttpStreamProvider, StreamProvider};

const CREATE_FAILED_MESSAGE: &str = "Failed to create customer";
const UPDATE_FAILED_MESSAGE: &str = "Failed to update customer";
const DELETE_FAILED_MESSAGE: &str = "Failed to delete customer";

/// Runtime context for CLI execution: effective config plus the service clients.
pub struct RunContext {
    config: CustsyncConfig,
    jobs: Arc<dyn JobControlApi>,
    streams: Arc<dyn StreamProvider>,
    customers: Arc<dyn CustomerApi>,
    wall: Arc<dyn WallClock>,
    /// Print each progress snapshot while following a job.
    render_progress: bool,
}

impl RunContext {
    /// Load config (explicit file or layered workspace config), apply the base URL
    /// override, validate, and build HTTP clients.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        base_url: Option<String>,
    ) -> Result<Self, SyncError> {
        let mut config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        if let Some(url) = base_url {
            config.api.base_url = url;
        }
        config.ensure_valid()?;

        let jobs = Arc::new(HttpJobControl::new(&config.api)?);
        let streams = Arc::new(HttpStreamProvider::new(&config.api)?);
        let customers = Arc::new(HttpCustomerApi::new(&config.api)?);
        Ok(Self::with_services(
            config,
            jobs,
            streams,
            customers,
            Arc::new(SystemClock),
        ))
    }

    /// Assemble a context from already-built services.
    pub fn with_services(
        config: CustsyncConfig,
        jobs: Arc<dyn JobControlApi>,
        streams: Arc<dyn StreamProvider>,
        customers: Arc<dyn CustomerApi>,
        wall: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            config,
            jobs,
            streams,
            customers,
            wall,
            render_progress: true,
        }
    }

    /// Suppress per-snapshot progress lines; only the final result is returned.
    pub fn without_progress(mut self) -> Self {
        self.render_progress = false;
        self
    }

    pub fn config(&self) -> &CustsyncConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, SyncError> {
        match command {
            Commands::Sync { command } => match command {
                SyncCommands::Start { no_follow } => self.handle_sync_start(!no_follow).await,
                SyncCommands::Watch => self.handle_sync_watch().await,
                SyncCommands::Status { format } => self.handle_sync_status(format).await,
            },
            Commands::Customers { command } => match command {
                CustomerCommands::List {
                    page,
                    limit,
                    format,
                } => self.handle_customers_list(*page, *limit, format).await,
                CustomerCommands::Create(args) => self.handle_customers_create(args).await,
                CustomerCommands::Update(args) => self.handle_customers_update(args).await,
                CustomerCommands::Delete {
                    id,
                    yes,
                    page,
                    items_on_page,
                } => {
                    self.handle_customers_delete(id, *yes, *page, *items_on_page)
                        .await
                }
            },
            Commands::Config { command } => match command {
                ConfigCommands::Show => self.handle_config_show(),
            },
        }
    }

    fn controller(&self) -> SyncController {
        SyncController::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.streams),
            Arc::clone(&self.wall),
            self.config.sync.clone(),
        )
    }

    async fn handle_sync_start(&self, follow: bool) -> Result<String, SyncError> {
        let controller = self.controller();
        match controller.start_sync().await {
            Ok(StartOutcome::Started) => {}
            Ok(StartOutcome::Ignored) => return Ok("A sync is already in progress.".to_string()),
            Err(_) => {
                let message = controller
                    .snapshot()
                    .error
                    .unwrap_or_else(|| START_FAILED_MESSAGE.to_string());
                return Err(SyncError::JobFailed(message));
            }
        }
        let snapshot = controller.snapshot();
        info!(total_rows = snapshot.total_rows, "Following sync progress");
        let header = format!(
            "Sync started: {} rows across {} pages",
            snapshot.total_rows, snapshot.total_pages
        );
        if !follow {
            controller.dispose();
            return Ok(header);
        }
        if self.render_progress {
            println!("{}", header);
        }
        let last = self.follow(&controller).await;
        finish_report(last)
    }

    async fn handle_sync_watch(&self) -> Result<String, SyncError> {
        let controller = self.controller();
        match controller.resume_if_active().await {
            ResumeOutcome::Resumed => {
                let last = self.follow(&controller).await;
                finish_report(last)
            }
            ResumeOutcome::NoActiveJob | ResumeOutcome::Ignored => {
                Ok("No active sync job.".to_string())
            }
        }
    }

    /// Render snapshots until the controller stops tracking or Ctrl-C arrives.
    async fn follow(&self, controller: &SyncController) -> ClientProgressSnapshot {
        let mut updates = controller.subscribe();
        let mut last_line = String::new();
        loop {
            let snapshot = updates.borrow_and_update().clone();
            if self.render_progress {
                let line = format_progress_line(&snapshot);
                if line != last_line {
                    println!("{}", line);
                    last_line = line;
                }
            }
            if !snapshot.is_uploading {
                controller.dispose();
                return snapshot;
            }
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        return snapshot;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    debug!("Interrupted; detaching from sync job");
                    controller.dispose();
                    return controller.snapshot();
                }
            }
        }
    }

    async fn handle_sync_status(&self, format: &str) -> Result<String, SyncError> {
        let job = self.jobs.sync_status().await?;
        match format {
            "json" => Ok(format_sync_status_json(job.as_ref())),
            _ => Ok(format_sync_status_text(job.as_ref(), self.wall.now())),
        }
    }

    async fn handle_customers_list(
        &self,
        page: u32,
        limit: Option<u32>,
        format: &str,
    ) -> Result<String, SyncError> {
        let limit = limit.unwrap_or(self.config.sync.page_size);
        let page = self.customers.list(page.max(1), limit).await?;
        match format {
            "json" => Ok(format_customer_page_json(&page)),
            _ => Ok(format_customer_page_text(&page)),
        }
    }

    async fn handle_customers_create(&self, args: &CreateArgs) -> Result<String, SyncError> {
        let subscription_date = match &args.subscription_date {
            Some(raw) => parse_date(raw)?,
            None => self.wall.now(),
        };
        let customer = NewCustomer {
            customer_id: args.customer_id.clone(),
            first_name: args.first_name.clone(),
            last_name: args.last_name.clone(),
            company: args.company.clone(),
            city: args.city.clone(),
            country: args.country.clone(),
            phone1: args.phone1.clone(),
            phone2: args.phone2.clone(),
            email: args.email.clone(),
            subscription_date,
            website: args.website.clone(),
            about: args.about.clone(),
        };
        let created = self
            .customers
            .create(&customer)
            .await
            .map_err(|e| rejected(e, CREATE_FAILED_MESSAGE))?;
        Ok(format_customer_text("Created", &created))
    }

    async fn handle_customers_update(&self, args: &UpdateArgs) -> Result<String, SyncError> {
        let update = CustomerUpdate {
            first_name: args.first_name.clone(),
            last_name: args.last_name.clone(),
            company: args.company.clone(),
            city: args.city.clone(),
            country: args.country.clone(),
            phone1: args.phone1.clone(),
            phone2: args.phone2.clone(),
            email: args.email.clone(),
            subscription_date: args.subscription_date.as_deref().map(parse_date).transpose()?,
            website: args.website.clone(),
            about: args.about.clone(),
        };
        if update.is_empty() {
            return Ok("Nothing to update.".to_string());
        }
        let updated = self
            .customers
            .update(&args.id, &update)
            .await
            .map_err(|e| rejected(e, UPDATE_FAILED_MESSAGE))?;
        Ok(format_customer_text("Updated", &updated))
    }

    async fn handle_customers_delete(
        &self,
        id: &str,
        yes: bool,
        page: Option<u32>,
        items_on_page: Option<usize>,
    ) -> Result<String, SyncError> {
        if !yes {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete customer '{}'?", id))
                .default(false)
                .interact()
                .map_err(|e| SyncError::Config(format!("Failed to get user input: {}", e)))?;

            if !confirmed {
                return Ok("Deletion cancelled".to_string());
            }
        }

        self.customers
            .delete(id)
            .await
            .map_err(|e| rejected(e, DELETE_FAILED_MESSAGE))?;

        let mut output = format!("Deleted customer {}", id);
        if let (Some(page), Some(items)) = (page, items_on_page) {
            output.push_str(&format!("\nShow page {}", page_after_delete(items, page)));
        }
        Ok(output)
    }

    fn handle_config_show(&self) -> Result<String, SyncError> {
        toml::to_string_pretty(&self.config)
            .map_err(|e| SyncError::Config(format!("Failed to render config: {}", e)))
    }
}

fn finish_report(last: ClientProgressSnapshot) -> Result<String, SyncError> {
    if let Some(error) = last.error {
        return Err(SyncError::JobFailed(error));
    }
    let mut output = format_sync_summary(&last);
    if !last.recent_rows.is_empty() {
        output.push_str("\n\nRecently processed:\n");
        output.push_str(&format_recent_rows(&last.recent_rows));
    }
    Ok(output)
}

/// Keep the server's status and message; substitute the fallback when it sent none.
fn rejected(err: SyncError, fallback: &str) -> SyncError {
    let message = err.user_message(fallback);
    match err {
        SyncError::Rejected { status, .. } => SyncError::Rejected {
            status,
            message: Some(message),
        },
        other => SyncError::JobFailed(format!("{}: {}", fallback, other)),
    }
}

/// RFC 3339 timestamp, or a bare date taken as midnight UTC.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, SyncError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| SyncError::Config(format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", raw)))
}
