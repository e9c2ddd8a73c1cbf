//! Sync controller: starts or resumes a bulk sync and keeps a progress snapshot.
//!
//! The controller exclusively owns one [`JobClock`] and at most one
//! [`ProgressStream`]. Every start or resume attempt gets a new generation
//! number; clock ticks and stream signals carry the generation they were
//! created for and are ignored once it is stale. All state changes happen
//! under one lock and are published as whole snapshots on a watch channel.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::api::JobControlApi;
use crate::clock::{elapsed_seconds, JobClock, WallClock};
use crate::config::SyncSettings;
use crate::customers::Customer;
use crate::error::SyncError;
use crate::job::{eta_seconds, JobStatus, SyncJob};
use crate::stream::{ProgressStream, ProgressUpdate, StreamProvider, StreamSignal, StreamState};

/// Shown when the start request fails without a server message.
pub const START_FAILED_MESSAGE: &str = "Failed to start sync";

/// Shown when the job itself reports `failed`.
pub const JOB_FAILED_MESSAGE: &str = "Sync failed";

/// Progress as presented to the user. Read-only outside the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientProgressSnapshot {
    pub upload_progress: f64,
    pub processed: u64,
    pub total_rows: u64,
    pub total_pages: u64,
    /// Seconds since the job started; frozen while not uploading.
    pub elapsed: u64,
    /// Seconds remaining as of the last event that carried an estimate.
    pub eta: u64,
    pub is_uploading: bool,
    pub error: Option<String>,
    /// Latest preview rows, bounded by `recent_rows_limit`.
    pub recent_rows: Vec<Customer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A sync was already running, or the controller was disposed or superseded.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    NoActiveJob,
    Ignored,
}

pub struct SyncController {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn JobControlApi>,
    streams: Arc<dyn StreamProvider>,
    wall: Arc<dyn WallClock>,
    settings: SyncSettings,
    published: watch::Sender<ClientProgressSnapshot>,
    state: Mutex<ControllerState>,
}

struct ControllerState {
    snapshot: ClientProgressSnapshot,
    generation: u64,
    clock: JobClock,
    stream: Option<ProgressStream>,
    error_epoch: u64,
    error_timer: Option<JoinHandle<()>>,
    disposed: bool,
}

impl ControllerState {
    /// Tear down the previous attempt and claim a fresh generation.
    fn begin_attempt(&mut self) -> u64 {
        self.release_resources();
        self.generation += 1;
        self.error_epoch += 1;
        self.generation
    }

    fn release_resources(&mut self) {
        self.clock.stop();
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        if let Some(timer) = self.error_timer.take() {
            timer.abort();
        }
    }

    fn apply_update(&mut self, update: ProgressUpdate, recent_rows_limit: usize) {
        let counters = update.event.into_counters();
        let snapshot = &mut self.snapshot;
        snapshot.processed = counters.processed_rows;
        snapshot.total_rows = counters.total_rows;
        if let Some(total_pages) = counters.total_pages {
            snapshot.total_pages = total_pages;
        }
        snapshot.upload_progress = counters.progress;
        if let Some(eta) = update.eta {
            snapshot.eta = eta;
        }
        if !counters.recent_rows.is_empty() {
            let mut rows = counters.recent_rows;
            rows.truncate(recent_rows_limit);
            snapshot.recent_rows = rows;
        }
    }

    /// Stop tracking: clock off, stream released, elapsed frozen.
    fn end_tracking(&mut self) {
        self.snapshot.is_uploading = false;
        self.clock.stop();
        self.stream.take();
    }
}

impl SyncController {
    pub fn new(
        api: Arc<dyn JobControlApi>,
        streams: Arc<dyn StreamProvider>,
        wall: Arc<dyn WallClock>,
        settings: SyncSettings,
    ) -> Self {
        let (published, _) = watch::channel(ClientProgressSnapshot::default());
        let clock = JobClock::new(Arc::clone(&wall), settings.tick_interval());
        Self {
            inner: Arc::new(Inner {
                api,
                streams,
                wall,
                settings,
                published,
                state: Mutex::new(ControllerState {
                    snapshot: ClientProgressSnapshot::default(),
                    generation: 0,
                    clock,
                    stream: None,
                    error_epoch: 0,
                    error_timer: None,
                    disposed: false,
                }),
            }),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ClientProgressSnapshot {
        self.inner.published.borrow().clone()
    }

    /// Receiver notified with a complete snapshot on every change.
    pub fn subscribe(&self) -> watch::Receiver<ClientProgressSnapshot> {
        self.inner.published.subscribe()
    }

    /// State of the live progress stream, if one is held.
    pub fn stream_state(&self) -> Option<StreamState> {
        self.inner.state.lock().stream.as_ref().map(|s| s.state())
    }

    pub fn is_clock_running(&self) -> bool {
        self.inner.state.lock().clock.is_running()
    }

    /// Start a new bulk sync and begin tracking it.
    ///
    /// Ignored while a sync is already being tracked. On request failure the
    /// snapshot carries the user-visible error and the error is also returned.
    pub async fn start_sync(&self) -> Result<StartOutcome, SyncError> {
        let (generation, origin) = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                debug!("Start ignored: controller disposed");
                return Ok(StartOutcome::Ignored);
            }
            if state.snapshot.is_uploading {
                debug!("Start ignored: sync already in progress");
                return Ok(StartOutcome::Ignored);
            }
            let generation = state.begin_attempt();
            state.snapshot = ClientProgressSnapshot {
                is_uploading: true,
                ..ClientProgressSnapshot::default()
            };
            self.inner.publish(&state);
            (generation, self.inner.wall.now())
        };

        info!(generation, "Starting customer sync");
        let result = self.inner.api.start_sync().await;

        let mut state = self.inner.state.lock();
        if state.disposed || state.generation != generation {
            debug!(generation, "Start response arrived for a superseded attempt");
            return Ok(StartOutcome::Ignored);
        }

        match result {
            Ok(started) => {
                state.snapshot.total_rows = started.total_rows;
                state.snapshot.total_pages = started.total_pages;
                self.inner.attach(&mut state, generation, origin);
                self.inner.publish(&state);
                info!(
                    total_rows = started.total_rows,
                    total_pages = started.total_pages,
                    "Sync started"
                );
                Ok(StartOutcome::Started)
            }
            Err(err) => {
                warn!(error = %err, "Sync start request failed");
                state.snapshot.is_uploading = false;
                self.inner
                    .raise_error(&mut state, err.user_message(START_FAILED_MESSAGE));
                self.inner.publish(&state);
                Err(err)
            }
        }
    }

    /// Attach to a job that is already pending or processing on the server.
    ///
    /// Meant to run once when the controller is created. A missing job or a
    /// failed status query is not an error.
    pub async fn resume_if_active(&self) -> ResumeOutcome {
        let generation = {
            let state = self.inner.state.lock();
            if state.disposed || state.snapshot.is_uploading {
                return ResumeOutcome::Ignored;
            }
            state.generation
        };

        let job = match self.inner.api.sync_status().await {
            Ok(Some(job)) if job.status.is_active() => job,
            Ok(Some(job)) => {
                debug!(status = %job.status, "Last sync job is not active");
                return ResumeOutcome::NoActiveJob;
            }
            Ok(None) => {
                debug!("No active sync job");
                return ResumeOutcome::NoActiveJob;
            }
            Err(e) => {
                debug!(error = %e, "No active sync job");
                return ResumeOutcome::NoActiveJob;
            }
        };

        let mut state = self.inner.state.lock();
        if state.disposed || state.generation != generation || state.snapshot.is_uploading {
            debug!("Resume skipped: controller state changed while querying status");
            return ResumeOutcome::Ignored;
        }

        let generation = state.begin_attempt();
        let now = self.inner.wall.now();
        let origin = job.started_at.unwrap_or(now);
        state.snapshot = seeded_snapshot(&job, origin, now);
        self.inner.attach(&mut state, generation, origin);
        self.inner.publish(&state);
        info!(
            generation,
            status = %job.status,
            processed = job.processed_rows,
            total_rows = job.total_rows,
            "Resumed tracking of active sync job"
        );
        ResumeOutcome::Resumed
    }

    /// Close the stream, stop the clock, and freeze the snapshot for good.
    pub fn dispose(&self) {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.generation += 1;
        state.release_resources();
        debug!("Sync controller disposed");
    }
}

fn seeded_snapshot(job: &SyncJob, origin: DateTime<Utc>, now: DateTime<Utc>) -> ClientProgressSnapshot {
    ClientProgressSnapshot {
        upload_progress: job.progress.clamp(0.0, 100.0),
        processed: job.processed_rows,
        total_rows: job.total_rows,
        elapsed: elapsed_seconds(origin, now),
        eta: job
            .estimated_completion
            .map(|at| eta_seconds(at, now))
            .unwrap_or(0),
        is_uploading: true,
        ..ClientProgressSnapshot::default()
    }
}

impl Inner {
    fn publish(&self, state: &ControllerState) {
        self.published.send_replace(state.snapshot.clone());
    }

    /// Open the progress stream and start the clock for `generation`.
    fn attach(self: &Arc<Self>, state: &mut ControllerState, generation: u64, origin: DateTime<Utc>) {
        let weak = Arc::downgrade(self);
        let stream = ProgressStream::open(
            Arc::clone(&self.streams),
            self.api.stream_endpoint(),
            Arc::clone(&self.wall),
            move |signal| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_signal(generation, signal);
                }
            },
        );
        state.stream = Some(stream);

        let weak: Weak<Inner> = Arc::downgrade(self);
        state.clock.start(origin, move |elapsed| {
            if let Some(inner) = weak.upgrade() {
                inner.on_tick(generation, elapsed);
            }
        });
    }

    fn on_tick(&self, generation: u64, elapsed: u64) {
        let mut state = self.state.lock();
        if state.disposed || state.generation != generation || !state.snapshot.is_uploading {
            return;
        }
        if state.snapshot.elapsed != elapsed {
            state.snapshot.elapsed = elapsed;
            self.publish(&state);
        }
    }

    fn on_signal(self: &Arc<Self>, generation: u64, signal: StreamSignal) {
        let mut state = self.state.lock();
        if state.disposed || state.generation != generation {
            trace!(generation, "Dropping signal from a superseded stream");
            return;
        }

        match signal {
            StreamSignal::Update(update) => {
                state.apply_update(update, self.settings.recent_rows_limit);
            }
            StreamSignal::Finished(update) => {
                let status = update.status();
                state.apply_update(update, self.settings.recent_rows_limit);
                state.end_tracking();
                match status {
                    JobStatus::Failed => {
                        warn!("Sync job reported failure");
                        self.raise_error(&mut state, JOB_FAILED_MESSAGE.to_string());
                    }
                    _ => info!(status = %status, processed = state.snapshot.processed, "Sync job finished"),
                }
            }
            StreamSignal::Lost(reason) => {
                // Transport loss ends tracking without a user-visible error.
                warn!(reason = %reason, "Lost progress stream; no longer tracking the sync job");
                state.end_tracking();
            }
        }
        self.publish(&state);
    }

    /// Set the user-visible error and schedule its removal.
    fn raise_error(self: &Arc<Self>, state: &mut ControllerState, message: String) {
        state.snapshot.error = Some(message);
        state.error_epoch += 1;
        let epoch = state.error_epoch;
        if let Some(timer) = state.error_timer.take() {
            timer.abort();
        }

        let weak = Arc::downgrade(self);
        let display = self.settings.error_display();
        state.error_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(display).await;
            if let Some(inner) = weak.upgrade() {
                inner.clear_error(epoch);
            }
        }));
    }

    fn clear_error(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.disposed || state.error_epoch != epoch || state.snapshot.error.is_none() {
            return;
        }
        state.snapshot.error = None;
        state.error_timer = None;
        self.publish(&state);
    }
}
