//! Account balance sync worker.
//!
//! Races an uncertified read against a certified read so the UI shows a
//! balance as fast as possible, while only the certified figure is treated
//! as actionable. Results land in a [`CertifiedCell`]; each delivered
//! outcome is summarized as an event through the worker's outbound queue.

use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use skiff_sync::{
    BackpressureQueue, CertifiedCell, CertifiedError, JobFn, OnError, OnLoad, QueryStrategy,
    RacingQueryCoordinator, RequestFn, Resolution, SyncError, SyncMetrics,
};
use skiff_types::{CallerIdentity, CertifiedValue};

use crate::lock;

/// A ledger account balance snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    pub amount_e8s: u64,
}

/// Events the balance worker posts to its owner.
///
/// Subscribers must tolerate kinds they do not know by ignoring them.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum BalanceSyncEvent {
    Synced {
        balance: AccountBalance,
        certified: bool,
    },
    SyncFailed {
        certified: bool,
        reason: String,
    },
}

/// Shared handle to the balance cache.
pub type BalanceStore = Arc<Mutex<CertifiedCell<AccountBalance>>>;

/// The balance polling job, run on each scheduler tick.
pub struct BalanceSyncJob {
    coordinator: RacingQueryCoordinator,
    request: RequestFn<AccountBalance>,
    store: BalanceStore,
    queue: BackpressureQueue<BalanceSyncEvent>,
    metrics: Arc<SyncMetrics>,
}

impl BalanceSyncJob {
    pub fn new(
        request: RequestFn<AccountBalance>,
        store: BalanceStore,
        queue: BackpressureQueue<BalanceSyncEvent>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            coordinator: RacingQueryCoordinator::new(Arc::clone(&metrics)),
            request,
            store,
            queue,
            metrics,
        }
    }

    /// Wrap the job for a [`skiff_sync::Scheduler`].
    pub fn into_job(self) -> JobFn<CallerIdentity> {
        let job = Arc::new(self);
        Arc::new(move |identity: CallerIdentity| {
            let job = Arc::clone(&job);
            async move { job.sync(identity).await }.boxed()
        })
    }

    async fn sync(&self, identity: CallerIdentity) -> Result<(), SyncError> {
        let delivered: Arc<Mutex<Vec<BalanceSyncEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let on_load: OnLoad<AccountBalance> = {
            let store = Arc::clone(&self.store);
            let delivered = Arc::clone(&delivered);
            let metrics = Arc::clone(&self.metrics);
            Arc::new(move |value: CertifiedValue<AccountBalance>| {
                if lock(&store).set(value.clone()) {
                    lock(&delivered).push(BalanceSyncEvent::Synced {
                        balance: value.data,
                        certified: value.certified,
                    });
                } else {
                    metrics.stale_writes_refused.inc();
                }
            })
        };

        let on_error: OnError = {
            let delivered = Arc::clone(&delivered);
            Arc::new(move |e: CertifiedError| {
                lock(&delivered).push(BalanceSyncEvent::SyncFailed {
                    certified: e.certified,
                    reason: e.error.to_string(),
                });
            })
        };

        self.coordinator
            .race(
                identity,
                Arc::clone(&self.request),
                on_load,
                on_error,
                QueryStrategy::QueryAndUpdate,
                Resolution::AllSettled,
            )
            .await;

        let events = std::mem::take(&mut *lock(&delivered));
        for event in events {
            self.queue.send(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_nullables::{NullLedger, ScriptedOutcome};
    use skiff_types::LedgerError;
    use std::time::Duration;

    fn balance(amount: u64) -> AccountBalance {
        AccountBalance {
            account: "acct-1".to_string(),
            amount_e8s: amount,
        }
    }

    fn setup(
        ledger: &Arc<NullLedger<AccountBalance>>,
    ) -> (
        BalanceStore,
        tokio::sync::mpsc::Receiver<BalanceSyncEvent>,
        BalanceSyncJob,
    ) {
        let store: BalanceStore = Arc::new(Mutex::new(CertifiedCell::new()));
        let (queue, rx) = skiff_sync::backpressure::channel(16);
        let job = BalanceSyncJob::new(
            Arc::new(ledger.request_fn()),
            Arc::clone(&store),
            queue,
            Arc::new(SyncMetrics::new()),
        );
        (store, rx, job)
    }

    #[tokio::test(start_paused = true)]
    async fn sync_stores_both_results_and_posts_events() {
        let ledger = NullLedger::new();
        ledger.respond_both(
            balance(100),
            Duration::from_millis(10),
            balance(105),
            Duration::from_millis(50),
        );
        let (store, mut rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();

        // Certified result wins in the store.
        let cell = lock(&store);
        let stored = cell.get().unwrap();
        assert!(stored.certified);
        assert_eq!(stored.data.amount_e8s, 105);
        drop(cell);

        // Both deliveries were summarized, uncertified first.
        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            BalanceSyncEvent::Synced { certified: false, ref balance } if balance.amount_e8s == 100
        ));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            BalanceSyncEvent::Synced { certified: true, ref balance } if balance.amount_e8s == 105
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn certified_first_suppresses_late_uncertified() {
        let ledger = NullLedger::new();
        ledger.respond_both(
            balance(90),
            Duration::from_millis(50),
            balance(105),
            Duration::from_millis(10),
        );
        let (store, mut rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();

        assert_eq!(lock(&store).get().unwrap().data.amount_e8s, 105);
        let only = rx.recv().await.unwrap();
        assert!(matches!(only, BalanceSyncEvent::Synced { certified: true, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn certification_failure_is_reported_distinctly() {
        let ledger = NullLedger::new();
        ledger.script_uncertified(ScriptedOutcome::Respond {
            value: balance(100),
            delay: Duration::from_millis(5),
        });
        ledger.script_certified(ScriptedOutcome::Fail {
            error: LedgerError::Certification("stale delegation".to_string()),
            delay: Duration::from_millis(20),
        });
        let (store, mut rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();

        // The fast figure is shown but remains uncertified.
        assert!(!lock(&store).get().unwrap().certified);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, BalanceSyncEvent::Synced { certified: false, .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            BalanceSyncEvent::SyncFailed { certified: true, ref reason }
                if reason.contains("stale delegation")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_syncs_reuse_the_cell() {
        let ledger = NullLedger::new();
        ledger.respond_both(
            balance(100),
            Duration::ZERO,
            balance(100),
            Duration::from_millis(5),
        );
        ledger.respond_both(
            balance(120),
            Duration::ZERO,
            balance(120),
            Duration::from_millis(5),
        );
        let (store, _rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        assert_eq!(lock(&store).get().unwrap().data.amount_e8s, 100);

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        assert_eq!(lock(&store).get().unwrap().data.amount_e8s, 120);
    }
}
