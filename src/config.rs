//! Configuration System
//!
//! Layered configuration for the custsync client: built-in defaults, the global
//! config file, workspace config files, then `CUSTSYNC__SECTION__KEY` environment
//! overrides. Loaded through the `config` crate and validated before use.

use crate::error::SyncError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustsyncConfig {
    /// Backend API connection settings
    pub api: ApiConfig,

    /// Sync progress tracking settings
    pub sync: SyncSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Backend API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the customer backend, without a trailing path
    pub base_url: String,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds (not applied to the progress stream)
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err("base_url cannot be empty".to_string());
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("base_url must be an http(s) URL, got '{}'", url));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Sync progress tracking settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Elapsed-time tick period in milliseconds
    pub tick_interval_ms: u64,

    /// How long a user-visible error stays set before it is cleared
    pub error_display_ms: u64,

    /// Maximum number of preview rows kept from `recentRows`
    pub recent_rows_limit: usize,

    /// Records per page when listing customers
    pub page_size: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            error_display_ms: 3000,
            recent_rows_limit: 10,
            page_size: 10,
        }
    }
}

impl SyncSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than zero".to_string());
        }
        if self.recent_rows_limit == 0 {
            return Err("recent_rows_limit must be greater than zero".to_string());
        }
        if self.page_size == 0 {
            return Err("page_size must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Api(String),
    Sync(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Api(msg) => write!(f, "api: {}", msg),
            ValidationError::Sync(msg) => write!(f, "sync: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl CustsyncConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(e) = self.api.validate() {
            errors.push(ValidationError::Api(e));
        }
        if let Err(e) = self.sync.validate() {
            errors.push(ValidationError::Sync(e));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding all failures into one [`SyncError::Config`].
    pub fn ensure_valid(&self) -> Result<(), SyncError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SyncError::Config(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }
}

/// Loads [`CustsyncConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file, workspace files, and environment.
    pub fn load(workspace_root: &Path) -> Result<CustsyncConfig, SyncError> {
        let builder = Config::builder();
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix("CUSTSYNC")
                .separator("__")
                .try_parsing(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load from a single explicit file; other sources are skipped.
    pub fn load_from_file(path: &Path) -> Result<CustsyncConfig, SyncError> {
        if !path.exists() {
            return Err(SyncError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
