//! A value tagged with its certification status.

use serde::{Deserialize, Serialize};

/// A response value paired with whether it came from a consensus-confirmed
/// (certified) read or a fast single-replica (uncertified) read.
///
/// Stores enforce that an uncertified value never silently replaces a
/// previously stored certified value for the same logical field; only merge
/// operations or an explicit reset may touch certified data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedValue<T> {
    pub data: T,
    pub certified: bool,
}

impl<T> CertifiedValue<T> {
    /// Wrap a value produced by a consensus-confirmed response.
    pub fn certified(data: T) -> Self {
        Self {
            data,
            certified: true,
        }
    }

    /// Wrap a value produced by a fast, unauthenticated response.
    pub fn uncertified(data: T) -> Self {
        Self {
            data,
            certified: false,
        }
    }

    /// Map the inner data, keeping the certification flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CertifiedValue<U> {
        CertifiedValue {
            data: f(self.data),
            certified: self.certified,
        }
    }
}
