//! Job-control API: start a bulk sync and query the active job.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::SyncError;
use crate::http::{build_http_client, ensure_success, join_url, map_http_error};
use crate::job::{SyncJob, SyncStarted};

const SYNC_PATH: &str = "customers/sync";
const SYNC_STATUS_PATH: &str = "customers/sync/status";
const SYNC_STREAM_PATH: &str = "customers/sync/stream";

/// Server endpoints the sync controller drives.
#[async_trait]
pub trait JobControlApi: Send + Sync {
    /// Ask the server to begin a bulk sync.
    async fn start_sync(&self) -> Result<SyncStarted, SyncError>;

    /// Current job, or `None` when the server has none to report.
    async fn sync_status(&self) -> Result<Option<SyncJob>, SyncError>;

    /// Endpoint handed to the stream provider for progress events.
    fn stream_endpoint(&self) -> String;
}

/// HTTP implementation of [`JobControlApi`].
pub struct HttpJobControl {
    client: Client,
    base_url: String,
}

impl HttpJobControl {
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let client = build_http_client(config.connect_timeout(), Some(config.request_timeout()))?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    pub fn with_client(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl JobControlApi for HttpJobControl {
    async fn start_sync(&self) -> Result<SyncStarted, SyncError> {
        let url = join_url(&self.base_url, SYNC_PATH);
        debug!(url = %url, "Requesting sync start");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(map_http_error)?;
        let response = ensure_success(response).await?;
        response.json::<SyncStarted>().await.map_err(map_http_error)
    }

    async fn sync_status(&self) -> Result<Option<SyncJob>, SyncError> {
        let url = join_url(&self.base_url, SYNC_STATUS_PATH);
        let response = self.client.get(&url).send().await.map_err(map_http_error)?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = match ensure_success(response).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let body = response.text().await.map_err(map_http_error)?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str::<Option<SyncJob>>(&body)?)
    }

    fn stream_endpoint(&self) -> String {
        join_url(&self.base_url, SYNC_STREAM_PATH)
    }
}
