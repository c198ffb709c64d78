//! Generic synchronization core for the Skiff multi-chain wallet.
//!
//! Every per-chain polling job (balance sync, pending-transaction sync,
//! minter metadata sync) is built from the same five pieces:
//! - [`RacingQueryCoordinator`] races an uncertified read against a
//!   certified read for one logical query and reconciles the answers.
//! - [`ScheduledJobTimer`] runs a job on a fixed interval with
//!   start/stop/trigger lifecycle control.
//! - [`WorkerRegistry`] owns isolated worker contexts with singleton reuse,
//!   reference counting, and idempotent teardown.
//! - [`BackpressureQueue`] gives bounded, ordered delivery of outbound
//!   messages so a slow consumer cannot unbounded-queue the producer.
//! - [`CertifiedCell`] / [`CertifiedTable`] merge certified and uncertified
//!   results into long-lived caches while keeping entity identity stable
//!   across reloads.

pub mod backpressure;
pub mod error;
pub mod metrics;
pub mod query;
pub mod scheduler;
pub mod store;
pub mod timer;
pub mod worker;

pub use backpressure::BackpressureQueue;
pub use error::SyncError;
pub use metrics::SyncMetrics;
pub use query::{
    CertifiedError, OnError, OnLoad, QueryStrategy, RacingQueryCoordinator, RequestFn, Resolution,
};
pub use scheduler::Scheduler;
pub use store::{CertifiedCell, CertifiedTable, Keyed, StoreState};
pub use timer::{JobFn, OverlapPolicy, ScheduledJobTimer, TimerConfig};
pub use worker::{SpawnFn, TeardownPolicy, WorkerChannel, WorkerRegistry};
