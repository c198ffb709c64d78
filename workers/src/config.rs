//! Sync configuration with TOML file support.

use serde::{Deserialize, Serialize};
use skiff_sync::{OverlapPolicy, TeardownPolicy};
use skiff_types::SyncInterval;
use std::path::Path;

use crate::error::WorkerError;

/// Configuration for the wallet sync workers.
///
/// Can be loaded from a TOML file via [`SyncConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Intervals accept a millisecond
/// count or the string `"disabled"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How often the balance worker polls the ledger.
    #[serde(default = "default_balance_interval")]
    pub balance_interval: SyncInterval,

    /// How often the pending-UTXO worker polls the minter.
    #[serde(default = "default_pending_interval")]
    pub pending_interval: SyncInterval,

    /// How often minter/bridge metadata is refreshed.
    #[serde(default = "default_minter_interval")]
    pub minter_interval: SyncInterval,

    /// Depth of each worker's outbound event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Whether a tick may dispatch while the previous run is in flight.
    #[serde(default = "default_overlap")]
    pub overlap: OverlapPolicy,

    /// When a shared worker context is actually terminated.
    #[serde(default = "default_teardown")]
    pub teardown: TeardownPolicy,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl SyncConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, WorkerError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            balance_interval: default_balance_interval(),
            pending_interval: default_pending_interval(),
            minter_interval: default_minter_interval(),
            queue_capacity: default_queue_capacity(),
            overlap: default_overlap(),
            teardown: default_teardown(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_balance_interval() -> SyncInterval {
    SyncInterval::from_millis(10_000)
}

fn default_pending_interval() -> SyncInterval {
    SyncInterval::from_millis(30_000)
}

fn default_minter_interval() -> SyncInterval {
    SyncInterval::from_millis(60_000)
}

fn default_queue_capacity() -> usize {
    skiff_sync::backpressure::DEFAULT_QUEUE_CAPACITY
}

fn default_overlap() -> OverlapPolicy {
    OverlapPolicy::Allow
}

fn default_teardown() -> TeardownPolicy {
    TeardownPolicy::Deferred
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
