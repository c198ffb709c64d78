//! Per-chain sync workers for the Skiff wallet.
//!
//! Each worker is a concrete polling job built on the generic sync core:
//! - [`balance`] keeps the account balance fresh (racing reads).
//! - [`pending`] tracks pending UTXOs awaiting confirmation (certified
//!   reads only; unconfirmed deposit data is not actionable).
//! - [`minter`] refreshes bridge/minter metadata.
//!
//! [`service::WalletSyncService`] owns the worker contexts on the UI side,
//! subscribes to their events, and republishes them into observable wallet
//! state.

pub mod balance;
pub mod config;
pub mod error;
pub mod logging;
pub mod minter;
pub mod pending;
pub mod service;

pub use balance::{AccountBalance, BalanceSyncEvent, BalanceSyncJob};
pub use config::SyncConfig;
pub use error::WorkerError;
pub use logging::{init_logging, LogFormat};
pub use minter::{MinterInfo, MinterInfoEvent, MinterSyncJob};
pub use pending::{PendingTxSyncEvent, PendingUtxo, PendingUtxoSyncJob};
pub use service::{WalletState, WalletSyncService};

/// Lock a std mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
