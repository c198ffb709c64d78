//! Minter/bridge metadata sync worker.
//!
//! Fetches the bridge deposit address, confirmation requirement, and fee
//! schedule. Metadata changes rarely, so a fast uncertified read is raced
//! against a certified one and the certified value sticks.

use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use skiff_sync::{
    BackpressureQueue, CertifiedCell, CertifiedError, JobFn, OnError, OnLoad, QueryStrategy,
    RacingQueryCoordinator, RequestFn, Resolution, SyncError, SyncMetrics,
};
use skiff_types::{CallerIdentity, CertifiedValue};

use crate::lock;

/// Bridge/minter parameters a wallet needs to accept deposits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterInfo {
    pub bridge_address: String,
    pub min_confirmations: u32,
    pub deposit_fee_sats: u64,
}

/// Events the minter worker posts to its owner.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum MinterInfoEvent {
    Synced { info: MinterInfo, certified: bool },
    SyncFailed { certified: bool, reason: String },
}

/// Shared handle to the minter metadata cache.
pub type MinterStore = Arc<Mutex<CertifiedCell<MinterInfo>>>;

/// The minter metadata polling job.
pub struct MinterSyncJob {
    coordinator: RacingQueryCoordinator,
    request: RequestFn<MinterInfo>,
    store: MinterStore,
    queue: BackpressureQueue<MinterInfoEvent>,
    metrics: Arc<SyncMetrics>,
}

impl MinterSyncJob {
    pub fn new(
        request: RequestFn<MinterInfo>,
        store: MinterStore,
        queue: BackpressureQueue<MinterInfoEvent>,
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
        let delivered: Arc<Mutex<Vec<MinterInfoEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let on_load: OnLoad<MinterInfo> = {
            let store = Arc::clone(&self.store);
            let delivered = Arc::clone(&delivered);
            let metrics = Arc::clone(&self.metrics);
            Arc::new(move |value: CertifiedValue<MinterInfo>| {
                if lock(&store).set(value.clone()) {
                    lock(&delivered).push(MinterInfoEvent::Synced {
                        info: value.data,
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
                lock(&delivered).push(MinterInfoEvent::SyncFailed {
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
    use skiff_nullables::NullLedger;
    use std::time::Duration;

    fn info(fee: u64) -> MinterInfo {
        MinterInfo {
            bridge_address: "bc1q-bridge".to_string(),
            min_confirmations: 6,
            deposit_fee_sats: fee,
        }
    }

    fn setup(
        ledger: &Arc<NullLedger<MinterInfo>>,
    ) -> (
        MinterStore,
        tokio::sync::mpsc::Receiver<MinterInfoEvent>,
        MinterSyncJob,
    ) {
        let store: MinterStore = Arc::new(Mutex::new(CertifiedCell::new()));
        let (queue, rx) = skiff_sync::backpressure::channel(16);
        let job = MinterSyncJob::new(
            Arc::new(ledger.request_fn()),
            Arc::clone(&store),
            queue,
            Arc::new(SyncMetrics::new()),
        );
        (store, rx, job)
    }

    #[tokio::test(start_paused = true)]
    async fn certified_metadata_sticks() {
        let ledger = NullLedger::new();
        ledger.respond_both(
            info(1000),
            Duration::from_millis(5),
            info(1500),
            Duration::from_millis(30),
        );
        let (store, mut rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();

        let cell = lock(&store);
        let stored = cell.get().unwrap();
        assert!(stored.certified);
        assert_eq!(stored.data.deposit_fee_sats, 1500);
        drop(cell);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, MinterInfoEvent::Synced { certified: false, .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, MinterInfoEvent::Synced { certified: true, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_uncertified_never_replaces_certified() {
        let ledger = NullLedger::new();
        // First round certifies a value; second round's uncertified branch
        // answers while its certified branch fails.
        ledger.respond_both(
            info(1000),
            Duration::ZERO,
            info(1000),
            Duration::from_millis(5),
        );
        ledger.script_uncertified(skiff_nullables::ScriptedOutcome::Respond {
            value: info(900),
            delay: Duration::ZERO,
        });
        ledger.script_certified(skiff_nullables::ScriptedOutcome::Fail {
            error: skiff_types::LedgerError::Timeout,
            delay: Duration::from_millis(5),
        });
        let (store, _rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        assert_eq!(lock(&store).get().unwrap().data.deposit_fee_sats, 1000);

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        // The certified figure from round one is retained.
        let cell = lock(&store);
        let stored = cell.get().unwrap();
        assert!(stored.certified);
        assert_eq!(stored.data.deposit_fee_sats, 1000);
    }
}
