//! Racing query coordinator — uncertified speed, certified correctness.
//!
//! For one logical query the coordinator can issue an uncertified request
//! (fast, single replica, forgeable) and a certified request (slow,
//! consensus round, proof-backed) concurrently. The first usable answer is
//! delivered for UI responsiveness; the certified answer is reconciled when
//! it arrives and is terminal: once a certified result has been delivered,
//! every later branch result for the same invocation is dropped.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use skiff_types::{CallerIdentity, CertifiedValue, LedgerError, QueryParams};
use tokio::sync::{mpsc, Mutex};

use crate::metrics::SyncMetrics;

/// The external request collaborator: one call per branch, with the
/// `certified` flag selecting the read kind.
pub type RequestFn<R> =
    Arc<dyn Fn(QueryParams) -> BoxFuture<'static, Result<R, LedgerError>> + Send + Sync>;

/// Invoked for each delivered (non-suppressed) successful branch result.
/// Synchronous, side-effecting, non-throwing by contract.
pub type OnLoad<R> = Arc<dyn Fn(CertifiedValue<R>) + Send + Sync>;

/// Invoked for each delivered (non-suppressed) branch failure.
pub type OnError = Arc<dyn Fn(CertifiedError) + Send + Sync>;

/// A branch failure, tagged with the branch kind and the identity the
/// request was issued under.
#[derive(Clone, Debug)]
pub struct CertifiedError {
    pub certified: bool,
    pub error: LedgerError,
    pub identity: CallerIdentity,
}

/// Which branches to issue for one logical query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStrategy {
    /// Exactly one uncertified request.
    Query,
    /// Exactly one certified request.
    Update,
    /// Both, concurrently.
    QueryAndUpdate,
}

impl QueryStrategy {
    fn branches(&self) -> &'static [bool] {
        match self {
            Self::Query => &[false],
            Self::Update => &[true],
            Self::QueryAndUpdate => &[false, true],
        }
    }
}

/// When the coordinator's own future resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// As soon as the first branch settles. The losing branch keeps running
    /// and may still deliver (or be suppressed) afterwards.
    Race,
    /// After every branch has settled.
    AllSettled,
}

/// Per-invocation delivery state machine.
///
/// `CertifiedFinal` is absorbing: it makes the suppression rule a structural
/// invariant instead of a mutable flag closed over by callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeliveryState {
    Pending,
    UncertifiedDelivered,
    CertifiedFinal,
}

impl DeliveryState {
    /// Decide whether a branch result may be delivered, transitioning the
    /// state if so. Returns `false` when the result must be dropped.
    fn try_deliver(&mut self, certified: bool) -> bool {
        match (*self, certified) {
            (Self::CertifiedFinal, _) => false,
            (_, true) => {
                *self = Self::CertifiedFinal;
                true
            }
            (_, false) => {
                *self = Self::UncertifiedDelivered;
                true
            }
        }
    }
}

/// Issues the branches of one logical query and applies the delivery rules.
pub struct RacingQueryCoordinator {
    metrics: Arc<SyncMetrics>,
}

impl RacingQueryCoordinator {
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self { metrics }
    }

    /// Run one racing query.
    ///
    /// Branch failures never propagate out of the coordinator; they surface
    /// through `on_error` under the same suppression rule as `on_load`.
    /// Callbacks run while the invocation's delivery lock is held, so a
    /// certified delivery strictly orders out any late uncertified one.
    pub async fn race<R: Send + 'static>(
        &self,
        identity: CallerIdentity,
        request: RequestFn<R>,
        on_load: OnLoad<R>,
        on_error: OnError,
        strategy: QueryStrategy,
        resolution: Resolution,
    ) {
        let branches = strategy.branches();
        let state = Arc::new(Mutex::new(DeliveryState::Pending));
        let (done_tx, mut done_rx) = mpsc::channel::<()>(branches.len());

        for &certified in branches {
            if certified {
                self.metrics.queries_certified.inc();
            } else {
                self.metrics.queries_uncertified.inc();
            }

            let fut = request(QueryParams::new(certified, identity.clone()));
            let state = Arc::clone(&state);
            let on_load = Arc::clone(&on_load);
            let on_error = Arc::clone(&on_error);
            let identity = identity.clone();
            let metrics = Arc::clone(&self.metrics);
            let done_tx = done_tx.clone();

            tokio::spawn(async move {
                let outcome = fut.await;
                {
                    let mut st = state.lock().await;
                    if st.try_deliver(certified) {
                        match outcome {
                            Ok(data) => {
                                metrics.responses_delivered.inc();
                                on_load(CertifiedValue { data, certified });
                            }
                            Err(error) => {
                                metrics.request_errors.inc();
                                on_error(CertifiedError {
                                    certified,
                                    error,
                                    identity,
                                });
                            }
                        }
                    } else {
                        metrics.responses_suppressed.inc();
                        tracing::debug!(
                            certified,
                            "dropping late branch result after certified delivery"
                        );
                    }
                }
                // Capacity equals the branch count, so this never blocks.
                let _ = done_tx.send(()).await;
            });
        }
        drop(done_tx);

        let settle_count = match resolution {
            Resolution::Race => 1,
            Resolution::AllSettled => branches.len(),
        };
        for _ in 0..settle_count {
            if done_rx.recv().await.is_none() {
                break;
            }
        }
    }
}
