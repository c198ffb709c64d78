//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies of the sync core (the wall clock, the replicated
//! ledger) are abstracted behind narrow contracts. This crate provides
//! test-friendly implementations that:
//! - Return deterministic, scripted values
//! - Can be controlled programmatically
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;

pub use clock::NullClock;
pub use ledger::{NullLedger, ScriptedOutcome};
