//! Customer records and the record CRUD client.
//!
//! This is plain request/response plumbing used by the CLI. The sync core only
//! borrows the [`Customer`] shape for the `recentRows` preview.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::SyncError;
use crate::http::{build_http_client, ensure_success, join_url, map_http_error};

const CUSTOMERS_PATH: &str = "customers";

/// A customer record as the backend returns it.
///
/// Text fields tolerate `null` and bare numbers; both read back as text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub customer_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub first_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub company: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone1: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone2: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub subscription_date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub website: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub about: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        Some(TextOrNumber::Text(text)) => text,
        Some(TextOrNumber::Number(number)) => number.to_string(),
        None => String::new(),
    })
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Body for `POST /customers`. Optional text fields are sent as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub city: String,
    pub country: String,
    pub phone1: String,
    pub phone2: String,
    pub email: String,
    pub subscription_date: DateTime<Utc>,
    pub website: String,
    pub about: String,
}

/// Body for `PATCH /customers/{id}`; only set fields are sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

impl CustomerUpdate {
    pub fn is_empty(&self) -> bool {
        *self == CustomerUpdate::default()
    }
}

/// One page of the record listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerPage {
    pub data: Vec<Customer>,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Deserialize)]
struct WirePage {
    data: Vec<Customer>,
    #[serde(default)]
    meta: WireMeta,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireMeta {
    #[serde(default)]
    total_pages: Option<u32>,
}

/// Page to show after deleting one record from `current_page`.
///
/// Removing the only record on a page other than the first steps back a page.
pub fn page_after_delete(items_on_page: usize, current_page: u32) -> u32 {
    if items_on_page == 1 && current_page > 1 {
        current_page - 1
    } else {
        current_page
    }
}

#[async_trait]
pub trait CustomerApi: Send + Sync {
    async fn list(&self, page: u32, limit: u32) -> Result<CustomerPage, SyncError>;
    async fn create(&self, customer: &NewCustomer) -> Result<Customer, SyncError>;
    async fn update(&self, id: &str, update: &CustomerUpdate) -> Result<Customer, SyncError>;
    async fn delete(&self, id: &str) -> Result<(), SyncError>;
}

pub struct HttpCustomerApi {
    client: Client,
    base_url: String,
}

impl HttpCustomerApi {
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let client = build_http_client(config.connect_timeout(), Some(config.request_timeout()))?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    pub fn with_client(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn record_url(&self, id: &str) -> String {
        join_url(&self.base_url, &format!("{}/{}", CUSTOMERS_PATH, id))
    }
}

#[async_trait]
impl CustomerApi for HttpCustomerApi {
    async fn list(&self, page: u32, limit: u32) -> Result<CustomerPage, SyncError> {
        let url = join_url(&self.base_url, CUSTOMERS_PATH);
        debug!(page, limit, "Fetching customers");
        let response = self
            .client
            .get(&url)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await
            .map_err(map_http_error)?;
        let wire: WirePage = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(map_http_error)?;
        Ok(CustomerPage {
            data: wire.data,
            page,
            total_pages: wire.meta.total_pages.filter(|n| *n > 0).unwrap_or(1),
        })
    }

    async fn create(&self, customer: &NewCustomer) -> Result<Customer, SyncError> {
        let url = join_url(&self.base_url, CUSTOMERS_PATH);
        let response = self
            .client
            .post(&url)
            .json(customer)
            .send()
            .await
            .map_err(map_http_error)?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(map_http_error)
    }

    async fn update(&self, id: &str, update: &CustomerUpdate) -> Result<Customer, SyncError> {
        let response = self
            .client
            .patch(self.record_url(id))
            .json(update)
            .send()
            .await
            .map_err(map_http_error)?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(map_http_error)
    }

    async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(self.record_url(id))
            .send()
            .await
            .map_err(map_http_error)?;
        ensure_success(response).await?;
        Ok(())
    }
}
