//! Shared test utilities for integration tests
//!
//! In-process fakes for the job-control API, the event-stream provider, the
//! record API, and the wall clock, plus isolated XDG environment setup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use custsync::api::JobControlApi;
use custsync::clock::WallClock;
use custsync::config::SyncSettings;
use custsync::controller::SyncController;
use custsync::customers::{Customer, CustomerApi, CustomerPage, CustomerUpdate, NewCustomer};
use custsync::error::SyncError;
use custsync::job::{SyncJob, SyncStarted};
use custsync::stream::{EventSubscription, StreamProvider};
use futures::channel::mpsc;
use tempfile::TempDir;

/// Global mutex to serialize XDG environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Run `f` with XDG_CONFIG_HOME and HOME pointed into `test_dir`, restoring them afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let home = std::env::var("HOME").ok();
    let xdg_config_home = std::env::var("XDG_CONFIG_HOME").ok();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());

    let result = f();

    match home {
        Some(orig) => std::env::set_var("HOME", orig),
        None => std::env::remove_var("HOME"),
    }
    match xdg_config_home {
        Some(orig) => std::env::set_var("XDG_CONFIG_HOME", orig),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
    result
}

/// Let spawned tasks run; under paused time this also advances the clock by 10ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Wall clock that follows tokio's (pausable) clock from a fixed base.
pub struct TokioWall {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioWall {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
            started: tokio::time::Instant::now(),
        })
    }
}

impl WallClock for TokioWall {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }
}

pub enum StartReply {
    Started { total_rows: u64, total_pages: u64 },
    Rejected { status: u16, message: Option<String> },
    Unreachable,
}

/// Scripted job-control API. Start replies are consumed in order; once the
/// queue is empty every start succeeds with 100 rows over 10 pages.
pub struct FakeJobControl {
    start_replies: Mutex<VecDeque<StartReply>>,
    status_reply: Mutex<Result<Option<SyncJob>, String>>,
    start_delay: Mutex<Duration>,
    start_calls: AtomicUsize,
}

impl FakeJobControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_replies: Mutex::new(VecDeque::new()),
            status_reply: Mutex::new(Ok(None)),
            start_delay: Mutex::new(Duration::ZERO),
            start_calls: AtomicUsize::new(0),
        })
    }

    pub fn push_start(&self, reply: StartReply) {
        self.start_replies.lock().unwrap().push_back(reply);
    }

    pub fn set_status(&self, job: Option<SyncJob>) {
        *self.status_reply.lock().unwrap() = Ok(job);
    }

    pub fn fail_status(&self, reason: &str) {
        *self.status_reply.lock().unwrap() = Err(reason.to_string());
    }

    /// Hold every start response for `delay` of (paused) tokio time.
    pub fn delay_start(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = delay;
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobControlApi for FakeJobControl {
    async fn start_sync(&self) -> Result<SyncStarted, SyncError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.start_delay.lock().unwrap();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        let reply = self.start_replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(SyncStarted {
                total_rows: 100,
                total_pages: 10,
            }),
            Some(StartReply::Started {
                total_rows,
                total_pages,
            }) => Ok(SyncStarted {
                total_rows,
                total_pages,
            }),
            Some(StartReply::Rejected { status, message }) => {
                Err(SyncError::Rejected { status, message })
            }
            Some(StartReply::Unreachable) => {
                Err(SyncError::Transport("connection refused".to_string()))
            }
        }
    }

    async fn sync_status(&self) -> Result<Option<SyncJob>, SyncError> {
        self.status_reply
            .lock()
            .unwrap()
            .clone()
            .map_err(SyncError::Transport)
    }

    fn stream_endpoint(&self) -> String {
        "memory://customers/sync/stream".to_string()
    }
}

type Feed = mpsc::UnboundedSender<Result<String, SyncError>>;

/// Stream provider whose subscriptions are fed by the test.
pub struct ScriptedStreams {
    feeds: Mutex<Vec<Feed>>,
    refuse: Mutex<bool>,
}

impl ScriptedStreams {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            feeds: Mutex::new(Vec::new()),
            refuse: Mutex::new(false),
        })
    }

    pub fn refuse_connections(&self) {
        *self.refuse.lock().unwrap() = true;
    }

    pub fn subscribe_count(&self) -> usize {
        self.feeds.lock().unwrap().len()
    }

    /// Subscriptions whose receiving side is still held.
    pub fn live_count(&self) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|feed| !feed.is_closed())
            .count()
    }

    /// Push a raw payload to the newest subscription. Returns false if it is gone.
    pub fn send_raw(&self, payload: &str) -> bool {
        match self.feeds.lock().unwrap().last() {
            Some(feed) => feed.unbounded_send(Ok(payload.to_string())).is_ok(),
            None => false,
        }
    }

    pub fn send(&self, event: &EventBuilder) -> bool {
        self.send_raw(&event.to_json())
    }

    pub fn break_latest(&self, reason: &str) {
        if let Some(feed) = self.feeds.lock().unwrap().last() {
            let _ = feed.unbounded_send(Err(SyncError::Transport(reason.to_string())));
        }
    }

    /// Close the newest subscription from the server side.
    pub fn end_latest(&self) {
        if let Some(feed) = self.feeds.lock().unwrap().last() {
            feed.close_channel();
        }
    }
}

#[async_trait]
impl StreamProvider for ScriptedStreams {
    async fn subscribe(&self, _endpoint: &str) -> Result<EventSubscription, SyncError> {
        if *self.refuse.lock().unwrap() {
            return Err(SyncError::Transport("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::unbounded();
        self.feeds.lock().unwrap().push(tx);
        Ok(Box::pin(rx))
    }
}

/// Progress event payload in the server's wire shape.
#[derive(Clone)]
pub struct EventBuilder {
    processed: u64,
    total: u64,
    total_pages: Option<u64>,
    progress: f64,
    status: &'static str,
    estimated_completion: Option<DateTime<Utc>>,
    recent_rows: Vec<Customer>,
}

impl EventBuilder {
    pub fn new(processed: u64, total: u64, status: &'static str) -> Self {
        let progress = if total == 0 {
            0.0
        } else {
            processed as f64 / total as f64 * 100.0
        };
        Self {
            processed,
            total,
            total_pages: None,
            progress,
            status,
            estimated_completion: None,
            recent_rows: Vec::new(),
        }
    }

    pub fn processing(processed: u64, total: u64) -> Self {
        Self::new(processed, total, "processing")
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn total_pages(mut self, pages: u64) -> Self {
        self.total_pages = Some(pages);
        self
    }

    pub fn eta_at(mut self, at: DateTime<Utc>) -> Self {
        self.estimated_completion = Some(at);
        self
    }

    pub fn recent_rows(mut self, rows: Vec<Customer>) -> Self {
        self.recent_rows = rows;
        self
    }

    pub fn to_json(&self) -> String {
        let mut value = serde_json::json!({
            "processedRows": self.processed,
            "totalRows": self.total,
            "progress": self.progress,
            "status": self.status,
            "recentRows": self.recent_rows,
        });
        if let Some(pages) = self.total_pages {
            value["totalPages"] = serde_json::json!(pages);
        }
        if let Some(at) = self.estimated_completion {
            value["estimatedCompletion"] =
                serde_json::json!(at.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        value.to_string()
    }
}

pub fn customer(n: usize) -> Customer {
    Customer {
        id: format!("id-{}", n),
        customer_id: format!("C{:05}", n),
        first_name: "Row".to_string(),
        last_name: n.to_string(),
        email: format!("row{}@example.com", n),
        ..Default::default()
    }
}

/// A controller wired to fresh fakes.
pub struct Harness {
    pub jobs: Arc<FakeJobControl>,
    pub streams: Arc<ScriptedStreams>,
    pub wall: Arc<TokioWall>,
    pub controller: SyncController,
}

impl Harness {
    /// Must be called inside a (paused) tokio runtime.
    pub fn new() -> Self {
        let jobs = FakeJobControl::new();
        let streams = ScriptedStreams::new();
        let wall = TokioWall::new();
        let controller = SyncController::new(
            jobs.clone(),
            streams.clone(),
            wall.clone(),
            SyncSettings::default(),
        );
        Self {
            jobs,
            streams,
            wall,
            controller,
        }
    }
}

/// In-memory record store behind [`CustomerApi`].
pub struct FakeCustomers {
    records: Mutex<Vec<Customer>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeCustomers {
    pub fn with_records(count: usize) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new((1..=count).map(customer).collect()),
            deleted: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CustomerApi for FakeCustomers {
    async fn list(&self, page: u32, limit: u32) -> Result<CustomerPage, SyncError> {
        let records = self.records.lock().unwrap();
        let limit = limit.max(1) as usize;
        let total_pages = records.len().div_ceil(limit).max(1) as u32;
        let data = records
            .iter()
            .skip((page.saturating_sub(1) as usize) * limit)
            .take(limit)
            .cloned()
            .collect();
        Ok(CustomerPage {
            data,
            page,
            total_pages,
        })
    }

    async fn create(&self, customer: &NewCustomer) -> Result<Customer, SyncError> {
        let mut records = self.records.lock().unwrap();
        let created = Customer {
            id: format!("id-{}", records.len() + 1),
            customer_id: customer.customer_id.clone(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            subscription_date: customer.subscription_date.to_rfc3339(),
            ..Default::default()
        };
        records.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, update: &CustomerUpdate) -> Result<Customer, SyncError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(SyncError::Rejected {
                status: 404,
                message: None,
            })?;
        if let Some(email) = &update.email {
            record.email = email.clone();
        }
        if let Some(company) = &update.company {
            record.company = company.clone();
        }
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|c| c.id != id);
        if records.len() == before {
            return Err(SyncError::Rejected {
                status: 404,
                message: Some("Customer not found".to_string()),
            });
        }
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
