//! Per-resource scheduler — a worker's command loop.
//!
//! Glues a [`ScheduledJobTimer`] to the inbound control protocol: `Start`
//! arms the timer, `Stop` disarms it, `Trigger` runs the job once. The loop
//! ends when the owning channel is dropped, at which point the timer is
//! disarmed so no tick outlives the worker.

use std::sync::Arc;

use skiff_types::WorkerCommand;
use tokio::sync::mpsc;

use crate::metrics::SyncMetrics;
use crate::timer::{JobFn, OverlapPolicy, ScheduledJobTimer, TimerConfig};

/// Drives one sync job from worker commands.
pub struct Scheduler<D> {
    timer: ScheduledJobTimer<D>,
    job: JobFn<D>,
}

impl<D: Clone + Send + Sync + 'static> Scheduler<D> {
    pub fn new(job: JobFn<D>, overlap: OverlapPolicy, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            timer: ScheduledJobTimer::new(overlap, metrics),
            job,
        }
    }

    /// Consume commands until the channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<WorkerCommand<D>>) {
        while let Some(command) = commands.recv().await {
            match command {
                WorkerCommand::Start { interval, data } => {
                    self.timer.start(TimerConfig {
                        interval,
                        job: Arc::clone(&self.job),
                        data,
                    });
                }
                WorkerCommand::Stop => self.timer.stop(),
                WorkerCommand::Trigger { data } => {
                    if let Err(e) = self.timer.trigger(data).await {
                        tracing::warn!("trigger ignored: {e}");
                    }
                }
            }
        }
        self.timer.stop();
    }
}
