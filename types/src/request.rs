//! Parameters passed to the ledger request collaborator.

use crate::identity::CallerIdentity;

/// Parameters for one branch of a racing query.
///
/// The request collaborator receives one of these per issued request:
/// `certified = false` asks a single replica for a fast answer,
/// `certified = true` asks for a consensus-confirmed answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryParams {
    pub certified: bool,
    pub identity: CallerIdentity,
}

impl QueryParams {
    pub fn new(certified: bool, identity: CallerIdentity) -> Self {
        Self {
            certified,
            identity,
        }
    }
}
