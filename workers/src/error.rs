use skiff_sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
