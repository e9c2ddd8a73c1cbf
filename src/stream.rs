//! Live progress subscription for one sync job.
//!
//! A [`ProgressStream`] owns a pump task that reads raw payloads from a
//! [`StreamProvider`] subscription, decodes them, and hands ordered
//! [`StreamSignal`]s to a single handler until the job reaches a terminal
//! status, the transport fails, or the owner closes the stream.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::WallClock;
use crate::error::SyncError;
use crate::job::{decode_progress_event, eta_seconds, JobStatus, ProgressEvent};

pub mod http;
pub mod sse;

pub use http::HttpStreamProvider;

/// Raw event payloads in server order. Ends when the server closes the stream.
pub type EventSubscription = Pin<Box<dyn Stream<Item = Result<String, SyncError>> + Send>>;

/// Opens server-push subscriptions.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    async fn subscribe(&self, endpoint: &str) -> Result<EventSubscription, SyncError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Open,
    Closed,
    /// Transport failure; distinct from a job that reported `failed`.
    Failed(String),
}

impl StreamState {
    pub fn is_finished(&self) -> bool {
        matches!(self, StreamState::Closed | StreamState::Failed(_))
    }
}

/// A decoded event plus the ETA derived from it at receipt time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub event: ProgressEvent,
    /// Seconds remaining, present only when the event carried `estimatedCompletion`.
    pub eta: Option<u64>,
}

impl ProgressUpdate {
    pub fn status(&self) -> JobStatus {
        self.event.status()
    }
}

/// What the pump reports to the stream's owner.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    /// Non-terminal progress.
    Update(ProgressUpdate),
    /// Terminal status. Delivered exactly once and always last.
    Finished(ProgressUpdate),
    /// The transport broke or ended before a terminal status. Always last.
    Lost(String),
}

struct Shared {
    state: Mutex<StreamState>,
    closed: AtomicBool,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Advance `from` -> `to` unless the owner closed the stream meanwhile.
    fn advance(&self, from: StreamState, to: StreamState) -> bool {
        let mut state = self.state.lock();
        if self.is_closed() || *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Enter a final state. Returns false if the stream was already finished.
    fn finish(&self, next: StreamState) -> bool {
        let mut state = self.state.lock();
        if self.closed.swap(true, Ordering::SeqCst) || state.is_finished() {
            return false;
        }
        *state = next;
        true
    }
}

/// One live subscription to a job's progress events.
///
/// Not restartable: once closed, a new `ProgressStream` must be opened.
/// Dropping the handle closes it.
pub struct ProgressStream {
    shared: Arc<Shared>,
    pump: Option<JoinHandle<()>>,
}

impl ProgressStream {
    /// Connect to `endpoint` and deliver signals to `handler` from a spawned task.
    ///
    /// The handle starts Idle and moves to Connecting once the task first runs.
    /// Must be called from within a tokio runtime.
    pub fn open<H>(
        provider: Arc<dyn StreamProvider>,
        endpoint: String,
        wall: Arc<dyn WallClock>,
        handler: H,
    ) -> Self
    where
        H: FnMut(StreamSignal) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(StreamState::Idle),
            closed: AtomicBool::new(false),
        });

        let pump = tokio::spawn(pump(
            Arc::clone(&shared),
            provider,
            endpoint,
            wall,
            handler,
        ));

        Self {
            shared,
            pump: Some(pump),
        }
    }

    pub fn state(&self) -> StreamState {
        self.shared.state.lock().clone()
    }

    /// Stop delivery and drop the subscription. Safe from any state; idempotent.
    pub fn close(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        {
            let mut state = self.shared.state.lock();
            if !state.is_finished() {
                *state = StreamState::Closed;
            }
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump<H>(
    shared: Arc<Shared>,
    provider: Arc<dyn StreamProvider>,
    endpoint: String,
    wall: Arc<dyn WallClock>,
    mut handler: H,
) where
    H: FnMut(StreamSignal) + Send + 'static,
{
    if !shared.advance(StreamState::Idle, StreamState::Connecting) {
        return;
    }
    let mut subscription = match provider.subscribe(&endpoint).await {
        Ok(subscription) => subscription,
        Err(e) => {
            lose(&shared, &mut handler, format!("connect failed: {}", e));
            return;
        }
    };

    if !shared.advance(StreamState::Connecting, StreamState::Open) {
        return;
    }
    debug!(endpoint = %endpoint, "Progress stream open");

    while let Some(item) = subscription.next().await {
        if shared.is_closed() {
            return;
        }
        let raw = match item {
            Ok(raw) => raw,
            Err(e) => {
                lose(&shared, &mut handler, e.to_string());
                return;
            }
        };

        let event = match decode_progress_event(&raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, payload = %truncate(&raw, 200), "Dropping malformed progress event");
                continue;
            }
        };

        let eta = event
            .counters()
            .estimated_completion
            .map(|at| eta_seconds(at, wall.now()));
        let update = ProgressUpdate { event, eta };

        if update.event.is_terminal() {
            if shared.finish(StreamState::Closed) {
                drop(subscription);
                info!(status = %update.status(), "Progress stream reached terminal status");
                handler(StreamSignal::Finished(update));
            }
            return;
        }
        if shared.is_closed() {
            return;
        }
        handler(StreamSignal::Update(update));
    }

    lose(
        &shared,
        &mut handler,
        "stream ended before a terminal status".to_string(),
    );
}

fn lose<H>(shared: &Shared, handler: &mut H, reason: String)
where
    H: FnMut(StreamSignal),
{
    if shared.finish(StreamState::Failed(reason.clone())) {
        warn!(reason = %reason, "Progress stream connection lost");
        handler(StreamSignal::Lost(reason));
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
