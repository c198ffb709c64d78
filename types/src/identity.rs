//! Stable resource identities and caller identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-lifetime-unique identity token for a UI-facing resource.
///
/// Once assigned to an underlying resource (a ledger address, a contract),
/// the same token must be reused across repeated loads of that resource even
/// as its display attributes are refreshed. UI state keyed by identity
/// (selection, scroll position) survives refresh because of this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Mint a fresh identity, unique for the lifetime of the process.
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// The identity under which ledger requests are issued.
///
/// Chain-specific identity formats (principals, public keys) are out of
/// scope for the sync core; this is an opaque token carried through request
/// parameters and error callbacks so callers can correlate failures.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The anonymous identity, used for reads that need no authorization.
    pub fn anonymous() -> Self {
        Self("anonymous".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
