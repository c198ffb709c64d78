//! Error taxonomy for the ledger request collaborator.

use thiserror::Error;

/// Failure of a single ledger request branch.
///
/// All variants are treated as transient: the sync core surfaces them
/// through error callbacks and retries on the next scheduled tick. Timeouts
/// are the request collaborator's responsibility; the core observes them as
/// an ordinary rejection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("network error: {0}")]
    Network(String),

    #[error("replica rejected request: {0}")]
    Rejected(String),

    #[error("certificate verification failed: {0}")]
    Certification(String),

    #[error("request timed out")]
    Timeout,
}
