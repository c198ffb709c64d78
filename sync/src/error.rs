//! Errors surfaced by the synchronization core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("outbound queue is closed")]
    QueueClosed,

    #[error("worker context has already been destroyed")]
    WorkerDestroyed,

    #[error("no job registered; call start first")]
    NoJob,

    #[error("job failed: {0}")]
    Job(String),
}
