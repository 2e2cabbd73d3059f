//! Wall-clock job scheduler - distilled spec section 4.H. Fires named jobs
//! at local-timezone (hour, minute) boundaries, at most once per calendar
//! day; an immediate check on Start catches jobs whose time already passed
//! before the process came up.

use crate::market_time::{now_ist, same_day};
use chrono::NaiveDateTime;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

type JobFuture = Pin<Box<dyn Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send>>;
type JobFn = Box<dyn Fn() -> JobFuture + Send + Sync>;

const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

struct CronJob {
    name: String,
    hour: u32,
    minute: u32,
    last_run: Mutex<Option<NaiveDateTime>>,
    run: JobFn,
}

struct RunningHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Whether a job at `(hour, minute)` local time should fire, given its
/// `last_run` timestamp and the current local time `now`. A job fires when
/// the clock matches and it has not already run today.
fn should_fire(hour: u32, minute: u32, last_run: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
    use chrono::Timelike;
    if now.hour() != hour || now.minute() != minute {
        return false;
    }
    match last_run {
        Some(last) => !same_day(last, now),
        None => true,
    }
}

/// Drives the day's wall-clock jobs: `FetchInstruments`, `MarketOpen`,
/// `MarketClose`, constructed and wired by the runtime supervisor.
pub struct DayScheduler {
    jobs: Vec<Arc<CronJob>>,
    running: AtomicBool,
    handle: Mutex<Option<RunningHandle>>,
}

impl std::fmt::Debug for DayScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DayScheduler")
            .field("jobs", &self.jobs.iter().map(|j| &j.name).collect::<Vec<_>>())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Default for DayScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DayScheduler {
    /// Constructs an empty scheduler. Jobs must be registered with
    /// [`Self::add_job`] before [`Self::start`].
    pub fn new() -> Self {
        DayScheduler {
            jobs: Vec::new(),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Registers a named job at the given local `(hour, minute)`. Must be
    /// called before [`Self::start`] - the job list is not mutated
    /// concurrently with the run loop.
    pub fn add_job<F>(&mut self, name: impl Into<String>, hour: u32, minute: u32, run: F)
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        self.jobs.push(Arc::new(CronJob {
            name: name.into(),
            hour,
            minute,
            last_run: Mutex::new(None),
            run: Box::new(run),
        }));
    }

    /// Whether the minute loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the scheduler loop: an immediate check, then one every 60s.
    /// A second call while running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let scheduler = self.clone();

        let join = tokio::spawn(async move {
            scheduler.check_and_run_jobs().await;
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            ticker.tick().await; // first tick fires immediately; already handled above
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => scheduler.check_and_run_jobs().await,
                }
            }
        });

        *self.handle.lock().await = Some(RunningHandle { stop_tx, join });
        info!("scheduler started");
    }

    /// Stops the scheduler loop. A call while not running is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.await;
        }
        info!("scheduler stopped");
    }

    async fn check_and_run_jobs(&self) {
        let now = now_ist();
        for job in &self.jobs {
            let mut last_run = job.last_run.lock().await;
            if should_fire(job.hour, job.minute, *last_run, now) {
                self.run_job(job, &mut last_run, now).await;
            }
        }
    }

    /// Runs a named job immediately, bypassing the time-of-day check. Used
    /// by the broker auth-callback path and by tests.
    pub async fn run_now(&self, name: &str) -> bool {
        let Some(job) = self.jobs.iter().find(|j| j.name == name) else {
            return false;
        };
        let now = now_ist();
        let mut last_run = job.last_run.lock().await;
        self.run_job(job, &mut last_run, now).await;
        true
    }

    async fn run_job(&self, job: &Arc<CronJob>, last_run: &mut Option<NaiveDateTime>, now: NaiveDateTime) {
        info!(job = %job.name, "running cron job");
        match (job.run)().await {
            Ok(()) => info!(job = %job.name, "cron job completed"),
            Err(error) => error!(job = %job.name, %error, "cron job failed"),
        }
        // LastRun advances regardless of the job's outcome - it does not
        // retry until tomorrow (distilled spec section 4.H).
        *last_run = Some(now);
    }
}
