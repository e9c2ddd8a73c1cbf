//! Wall-clock access and the elapsed-time ticker for a running job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Source of "now" for elapsed and ETA arithmetic.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`WallClock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whole seconds from `origin` to `now`, truncated; zero if `origin` lies ahead.
pub fn elapsed_seconds(origin: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (now - origin).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms / 1000) as u64
    }
}

/// Tracks a job's origin and drives a repeating elapsed-time tick.
///
/// At most one timer runs per clock: `start` replaces any running timer and
/// `stop` is idempotent. Dropping the clock stops it.
pub struct JobClock {
    wall: Arc<dyn WallClock>,
    period: Duration,
    origin: Option<DateTime<Utc>>,
    timer: Option<JoinHandle<()>>,
}

impl JobClock {
    pub fn new(wall: Arc<dyn WallClock>, period: Duration) -> Self {
        Self {
            wall,
            period,
            origin: None,
            timer: None,
        }
    }

    /// Record `origin` and call `on_tick` with the elapsed seconds once per period.
    ///
    /// The first tick fires one period after this call. Must be called from
    /// within a tokio runtime.
    pub fn start<F>(&mut self, origin: DateTime<Utc>, mut on_tick: F)
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.stop();
        self.origin = Some(origin);

        let wall = Arc::clone(&self.wall);
        let period = self.period;
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                on_tick(elapsed_seconds(origin, wall.now()));
            }
        }));
    }

    /// Cancel the timer. The origin is kept so `current_elapsed` stays readable.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn origin(&self) -> Option<DateTime<Utc>> {
        self.origin
    }

    /// Seconds since the recorded origin, or zero if the clock was never started.
    pub fn current_elapsed(&self) -> u64 {
        self.origin
            .map(|origin| elapsed_seconds(origin, self.wall.now()))
            .unwrap_or(0)
    }
}

impl Drop for JobClock {
    fn drop(&mut self) {
        self.stop();
    }
}
