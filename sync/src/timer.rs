//! Scheduled job timer — periodic sync work with lifecycle control.
//!
//! A timer owns at most one live interval task at a time. `start` (re)arms
//! the schedule, `stop` disarms it, and `trigger` runs the job once
//! immediately without touching the schedule. A job that returns an error
//! is logged and the schedule stays armed; recovery is "try again next
//! tick".

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use skiff_types::SyncInterval;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::SyncError;
use crate::metrics::SyncMetrics;

/// The unit of work a timer runs on each tick.
pub type JobFn<D> = Arc<dyn Fn(D) -> BoxFuture<'static, Result<(), SyncError>> + Send + Sync>;

/// Whether a tick may dispatch while the previous run is still in flight.
///
/// The timer does not police overlap by default; jobs that outlive their
/// own interval are expected to be idempotent. `SingleFlight` makes the
/// opposite choice explicit: overlapping ticks are skipped and counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    Allow,
    SingleFlight,
}

/// Everything a timer needs to arm a schedule.
pub struct TimerConfig<D> {
    pub interval: SyncInterval,
    pub job: JobFn<D>,
    pub data: D,
}

/// Runs a job on a fixed interval with start/stop/trigger control.
pub struct ScheduledJobTimer<D> {
    interval_task: Option<JoinHandle<()>>,
    job: Option<JobFn<D>>,
    overlap: OverlapPolicy,
    in_flight: Arc<tokio::sync::Mutex<()>>,
    metrics: Arc<SyncMetrics>,
}

impl<D: Clone + Send + Sync + 'static> ScheduledJobTimer<D> {
    pub fn new(overlap: OverlapPolicy, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            interval_task: None,
            job: None,
            overlap,
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
            metrics,
        }
    }

    /// Arm the schedule (or just register the job when the interval is
    /// disabled). Any previously armed interval is cleared first, so at
    /// most one interval task is ever live per timer instance. A zero
    /// period would make `tokio::time::interval_at` panic inside the
    /// spawned task, leaving a dead schedule that still reports armed, so
    /// it is treated like a disabled interval instead.
    pub fn start(&mut self, cfg: TimerConfig<D>) {
        self.stop();
        self.job = Some(Arc::clone(&cfg.job));

        let period = match cfg.interval {
            SyncInterval::Disabled => return,
            SyncInterval::Every(period) if period.is_zero() => {
                tracing::warn!("zero sync interval treated as disabled");
                return;
            }
            SyncInterval::Every(period) => period,
        };

        let job = cfg.job;
        let data = cfg.data;
        let overlap = self.overlap;
        let in_flight = Arc::clone(&self.in_flight);
        let metrics = Arc::clone(&self.metrics);
        // Anchor the schedule to the start call itself, not to whenever
        // the spawned task is first polled: the first tick lands exactly
        // one period from now.
        let first = tokio::time::Instant::now() + period;

        self.interval_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                Self::dispatch(&job, data.clone(), overlap, &in_flight, &metrics);
            }
        }));
    }

    /// Disarm the periodic schedule. In-flight job runs are not cancelled.
    /// Idempotent: stopping an idle timer is a no-op.
    pub fn stop(&mut self) {
        if let Some(task) = self.interval_task.take() {
            task.abort();
        }
    }

    /// Run the registered job exactly once, immediately, independent of the
    /// armed state. Does not arm or disarm the schedule.
    pub async fn trigger(&self, data: D) -> Result<(), SyncError> {
        let job = self.job.as_ref().ok_or(SyncError::NoJob)?;
        Self::run(job, data, &self.metrics).await;
        Ok(())
    }

    /// Whether a periodic interval is currently armed.
    pub fn is_armed(&self) -> bool {
        self.interval_task.is_some()
    }

    fn dispatch(
        job: &JobFn<D>,
        data: D,
        overlap: OverlapPolicy,
        in_flight: &Arc<tokio::sync::Mutex<()>>,
        metrics: &Arc<SyncMetrics>,
    ) {
        metrics.ticks_fired.inc();
        match overlap {
            OverlapPolicy::Allow => {
                let job = Arc::clone(job);
                let metrics = Arc::clone(metrics);
                tokio::spawn(async move {
                    Self::run(&job, data, &metrics).await;
                });
            }
            OverlapPolicy::SingleFlight => {
                match Arc::clone(in_flight).try_lock_owned() {
                    Ok(guard) => {
                        let job = Arc::clone(job);
                        let metrics = Arc::clone(metrics);
                        tokio::spawn(async move {
                            let _guard = guard;
                            Self::run(&job, data, &metrics).await;
                        });
                    }
                    Err(_) => {
                        metrics.ticks_skipped.inc();
                        tracing::debug!("previous job run still in flight, skipping tick");
                    }
                }
            }
        }
    }

    async fn run(job: &JobFn<D>, data: D, metrics: &Arc<SyncMetrics>) {
        if let Err(e) = job(data).await {
            metrics.jobs_failed.inc();
            tracing::warn!("sync job failed: {e}");
        }
    }
}

impl<D> Drop for ScheduledJobTimer<D> {
    fn drop(&mut self) {
        if let Some(task) = self.interval_task.take() {
            task.abort();
        }
    }
}
