//! Fundamental types for the Skiff wallet synchronization core.
//!
//! This crate defines the types shared across every other crate in the
//! workspace: certified values, stable resource identities, caller
//! identities, sync intervals, the worker control protocol, and the
//! ledger-facing error taxonomy.

pub mod certified;
pub mod command;
pub mod error;
pub mod identity;
pub mod interval;
pub mod request;
pub mod time;

pub use certified::CertifiedValue;
pub use command::WorkerCommand;
pub use error::LedgerError;
pub use identity::{CallerIdentity, ResourceId};
pub use interval::SyncInterval;
pub use request::QueryParams;
pub use time::{Clock, SystemClock};
