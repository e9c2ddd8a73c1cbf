//! HTTP event-stream provider.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::SyncError;
use crate::http::{build_http_client, ensure_success, map_http_error};
use crate::stream::sse::SseDecoder;
use crate::stream::{EventSubscription, StreamProvider};

/// Subscribes to `text/event-stream` endpoints over HTTP.
pub struct HttpStreamProvider {
    client: Client,
}

impl HttpStreamProvider {
    /// The client carries a connect timeout only; the stream stays open for the whole job.
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        Ok(Self {
            client: build_http_client(config.connect_timeout(), None)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamProvider for HttpStreamProvider {
    async fn subscribe(&self, endpoint: &str) -> Result<EventSubscription, SyncError> {
        debug!(endpoint, "Connecting to progress stream");
        let response = self
            .client
            .get(endpoint)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(map_http_error)?;
        let response = ensure_success(response).await?;

        let mut decoder = SseDecoder::new();
        let payloads = response
            .bytes_stream()
            .map(move |chunk| -> Vec<Result<String, SyncError>> {
                match chunk {
                    Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(map_http_error(e))],
                }
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(payloads))
    }
}
