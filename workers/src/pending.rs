//! Pending-UTXO sync worker.
//!
//! Pending deposits feed a minting flow, so only consensus-confirmed data
//! is actionable: this job issues certified reads exclusively. Entries are
//! merged into a [`CertifiedTable`] keyed by outpoint, preserving each
//! UTXO's display identity across reloads.

use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use skiff_sync::{
    BackpressureQueue, CertifiedError, CertifiedTable, JobFn, Keyed, OnError, OnLoad,
    QueryStrategy, RacingQueryCoordinator, RequestFn, Resolution, SyncError, SyncMetrics,
};
use skiff_types::{CallerIdentity, CertifiedValue, ResourceId};

use crate::lock;

/// An unspent output awaiting enough confirmations to mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUtxo {
    id: ResourceId,
    pub outpoint: String,
    pub value_sats: u64,
    pub confirmations: u32,
}

impl PendingUtxo {
    pub fn new(outpoint: impl Into<String>, value_sats: u64, confirmations: u32) -> Self {
        Self {
            id: ResourceId::next(),
            outpoint: outpoint.into(),
            value_sats,
            confirmations,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl Keyed for PendingUtxo {
    type NaturalKey = String;

    fn natural_key(&self) -> String {
        self.outpoint.clone()
    }

    fn identity(&self) -> ResourceId {
        self.id
    }

    fn adopt_identity(&mut self, id: ResourceId) {
        self.id = id;
    }
}

/// Events the pending-UTXO worker posts to its owner.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum PendingTxSyncEvent {
    Synced { pending: usize },
    SyncFailed { reason: String },
}

/// Shared handle to the pending-UTXO cache.
pub type PendingStore = Arc<Mutex<CertifiedTable<PendingUtxo>>>;

/// The pending-UTXO polling job.
pub struct PendingUtxoSyncJob {
    coordinator: RacingQueryCoordinator,
    request: RequestFn<Vec<PendingUtxo>>,
    store: PendingStore,
    queue: BackpressureQueue<PendingTxSyncEvent>,
}

impl PendingUtxoSyncJob {
    pub fn new(
        request: RequestFn<Vec<PendingUtxo>>,
        store: PendingStore,
        queue: BackpressureQueue<PendingTxSyncEvent>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            coordinator: RacingQueryCoordinator::new(metrics),
            request,
            store,
            queue,
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
        let delivered: Arc<Mutex<Vec<PendingTxSyncEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let on_load: OnLoad<Vec<PendingUtxo>> = {
            let store = Arc::clone(&self.store);
            let delivered = Arc::clone(&delivered);
            Arc::new(move |value: CertifiedValue<Vec<PendingUtxo>>| {
                let certified = value.certified;
                let entries: Vec<CertifiedValue<PendingUtxo>> = value
                    .data
                    .into_iter()
                    .map(|utxo| CertifiedValue {
                        data: utxo,
                        certified,
                    })
                    .collect();
                let mut table = lock(&store);
                table.set_all(entries);
                lock(&delivered).push(PendingTxSyncEvent::Synced {
                    pending: table.len(),
                });
            })
        };

        let on_error: OnError = {
            let delivered = Arc::clone(&delivered);
            Arc::new(move |e: CertifiedError| {
                lock(&delivered).push(PendingTxSyncEvent::SyncFailed {
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
                QueryStrategy::Update,
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

    fn setup(
        ledger: &Arc<NullLedger<Vec<PendingUtxo>>>,
    ) -> (
        PendingStore,
        tokio::sync::mpsc::Receiver<PendingTxSyncEvent>,
        PendingUtxoSyncJob,
    ) {
        let store: PendingStore = Arc::new(Mutex::new(CertifiedTable::new()));
        let (queue, rx) = skiff_sync::backpressure::channel(16);
        let job = PendingUtxoSyncJob::new(
            Arc::new(ledger.request_fn()),
            Arc::clone(&store),
            queue,
            Arc::new(SyncMetrics::new()),
        );
        (store, rx, job)
    }

    #[tokio::test(start_paused = true)]
    async fn issues_only_certified_requests() {
        let ledger = NullLedger::new();
        ledger.script_certified(ScriptedOutcome::Respond {
            value: vec![PendingUtxo::new("txid:0", 50_000, 2)],
            delay: Duration::from_millis(5),
        });
        let (store, mut rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();

        let requests = ledger.requests_seen();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].certified);

        assert_eq!(lock(&store).len(), 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            PendingTxSyncEvent::Synced { pending: 1 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn utxo_identity_survives_confirmation_updates() {
        let ledger = NullLedger::new();
        ledger.script_certified(ScriptedOutcome::Respond {
            value: vec![PendingUtxo::new("txid:0", 50_000, 1)],
            delay: Duration::ZERO,
        });
        ledger.script_certified(ScriptedOutcome::Respond {
            value: vec![PendingUtxo::new("txid:0", 50_000, 4)],
            delay: Duration::ZERO,
        });
        let (store, _rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        let first_id = lock(&store).entries()[0].data.id();

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        let table = lock(&store);
        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].data.confirmations, 4);
        assert_eq!(table.entries()[0].data.id(), first_id);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_posts_error_event_and_keeps_cache() {
        let ledger = NullLedger::new();
        ledger.script_certified(ScriptedOutcome::Respond {
            value: vec![PendingUtxo::new("txid:0", 50_000, 2)],
            delay: Duration::ZERO,
        });
        ledger.script_certified(ScriptedOutcome::Fail {
            error: LedgerError::Network("connection refused".to_string()),
            delay: Duration::ZERO,
        });
        let (store, mut rx, job) = setup(&ledger);

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            PendingTxSyncEvent::Synced { pending: 1 }
        ));

        job.sync(CallerIdentity::anonymous()).await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            PendingTxSyncEvent::SyncFailed { ref reason } if reason.contains("connection refused")
        ));
        // The previously synced entry is still cached.
        assert_eq!(lock(&store).len(), 1);
    }
}
