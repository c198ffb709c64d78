//! Wallet sync service — owns the worker contexts and folds their events
//! into one observable wallet state.
//!
//! The service side never touches ledger responses directly: each worker
//! posts summary events through its context's queue, a forwarder task per
//! worker folds them into a `watch` channel, and UI code observes the
//! [`WalletState`] snapshot. Worker contexts are obtained as singletons so
//! several service consumers (e.g. multiple open views) share one polling
//! loop per resource.

use std::sync::{Arc, Mutex};

use skiff_sync::{
    RequestFn, Scheduler, SpawnFn, SyncError, SyncMetrics, WorkerChannel, WorkerRegistry,
};
use skiff_types::{CallerIdentity, Clock, WorkerCommand};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::balance::{AccountBalance, BalanceStore, BalanceSyncEvent, BalanceSyncJob};
use crate::config::SyncConfig;
use crate::minter::{MinterInfo, MinterInfoEvent, MinterStore, MinterSyncJob};
use crate::pending::{PendingStore, PendingTxSyncEvent, PendingUtxo, PendingUtxoSyncJob};

/// A snapshot of everything the wallet UI renders about sync.
#[derive(Clone, Debug, Default)]
pub struct WalletState {
    pub balance: Option<AccountBalance>,
    pub balance_certified: bool,
    pub pending_utxos: usize,
    pub minter: Option<MinterInfo>,
    pub last_synced_at_ms: Option<u64>,
    pub last_error: Option<String>,
}

struct ActiveWorkers {
    balance: WorkerChannel<CallerIdentity, BalanceSyncEvent>,
    pending: WorkerChannel<CallerIdentity, PendingTxSyncEvent>,
    minter: WorkerChannel<CallerIdentity, MinterInfoEvent>,
    forwarders: Vec<JoinHandle<()>>,
}

/// Owns the three wallet sync workers and republishes their events.
pub struct WalletSyncService {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    balance_registry: WorkerRegistry<CallerIdentity, BalanceSyncEvent>,
    pending_registry: WorkerRegistry<CallerIdentity, PendingTxSyncEvent>,
    minter_registry: WorkerRegistry<CallerIdentity, MinterInfoEvent>,
    balance_spawn: SpawnFn<CallerIdentity, BalanceSyncEvent>,
    pending_spawn: SpawnFn<CallerIdentity, PendingTxSyncEvent>,
    minter_spawn: SpawnFn<CallerIdentity, MinterInfoEvent>,
    balance_store: BalanceStore,
    pending_store: PendingStore,
    minter_store: MinterStore,
    state_tx: watch::Sender<WalletState>,
    workers: tokio::sync::Mutex<Option<ActiveWorkers>>,
}

impl WalletSyncService {
    pub fn new(
        config: SyncConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<SyncMetrics>,
        balance_request: RequestFn<AccountBalance>,
        pending_request: RequestFn<Vec<PendingUtxo>>,
        minter_request: RequestFn<MinterInfo>,
    ) -> Self {
        let balance_store: BalanceStore = Arc::new(Mutex::new(Default::default()));
        let pending_store: PendingStore = Arc::new(Mutex::new(Default::default()));
        let minter_store: MinterStore = Arc::new(Mutex::new(Default::default()));

        let overlap = config.overlap;

        let balance_spawn: SpawnFn<CallerIdentity, BalanceSyncEvent> = {
            let store = Arc::clone(&balance_store);
            let metrics = Arc::clone(&metrics);
            Arc::new(move |commands, queue| {
                let job = BalanceSyncJob::new(
                    Arc::clone(&balance_request),
                    Arc::clone(&store),
                    queue,
                    Arc::clone(&metrics),
                )
                .into_job();
                tokio::spawn(Scheduler::new(job, overlap, Arc::clone(&metrics)).run(commands))
            })
        };

        let pending_spawn: SpawnFn<CallerIdentity, PendingTxSyncEvent> = {
            let store = Arc::clone(&pending_store);
            let metrics = Arc::clone(&metrics);
            Arc::new(move |commands, queue| {
                let job = PendingUtxoSyncJob::new(
                    Arc::clone(&pending_request),
                    Arc::clone(&store),
                    queue,
                    Arc::clone(&metrics),
                )
                .into_job();
                tokio::spawn(Scheduler::new(job, overlap, Arc::clone(&metrics)).run(commands))
            })
        };

        let minter_spawn: SpawnFn<CallerIdentity, MinterInfoEvent> = {
            let store = Arc::clone(&minter_store);
            let metrics = Arc::clone(&metrics);
            Arc::new(move |commands, queue| {
                let job = MinterSyncJob::new(
                    Arc::clone(&minter_request),
                    Arc::clone(&store),
                    queue,
                    Arc::clone(&metrics),
                )
                .into_job();
                tokio::spawn(Scheduler::new(job, overlap, Arc::clone(&metrics)).run(commands))
            })
        };

        let (state_tx, _) = watch::channel(WalletState::default());

        Self {
            balance_registry: WorkerRegistry::new(
                config.teardown,
                config.queue_capacity,
                Arc::clone(&metrics),
            ),
            pending_registry: WorkerRegistry::new(
                config.teardown,
                config.queue_capacity,
                Arc::clone(&metrics),
            ),
            minter_registry: WorkerRegistry::new(
                config.teardown,
                config.queue_capacity,
                Arc::clone(&metrics),
            ),
            config,
            clock,
            balance_spawn,
            pending_spawn,
            minter_spawn,
            balance_store,
            pending_store,
            minter_store,
            state_tx,
            workers: tokio::sync::Mutex::new(None),
        }
    }

    /// Spawn (or reuse) the worker contexts and arm their timers.
    ///
    /// Idempotent: a second start while workers are live is a no-op.
    pub async fn start(&self, identity: CallerIdentity) -> Result<(), SyncError> {
        let mut workers = self.workers.lock().await;
        if workers.is_some() {
            return Ok(());
        }

        let balance = self
            .balance_registry
            .get_instance(&self.balance_spawn, true)
            .await;
        let pending = self
            .pending_registry
            .get_instance(&self.pending_spawn, true)
            .await;
        let minter = self
            .minter_registry
            .get_instance(&self.minter_spawn, true)
            .await;

        let forwarders = vec![
            tokio::spawn(forward_balance(
                balance.subscribe().await?,
                self.state_tx.clone(),
                Arc::clone(&self.clock),
            )),
            tokio::spawn(forward_pending(
                pending.subscribe().await?,
                self.state_tx.clone(),
                Arc::clone(&self.clock),
            )),
            tokio::spawn(forward_minter(
                minter.subscribe().await?,
                self.state_tx.clone(),
                Arc::clone(&self.clock),
            )),
        ];

        balance
            .send(WorkerCommand::Start {
                interval: self.config.balance_interval,
                data: identity.clone(),
            })
            .await?;
        pending
            .send(WorkerCommand::Start {
                interval: self.config.pending_interval,
                data: identity.clone(),
            })
            .await?;
        minter
            .send(WorkerCommand::Start {
                interval: self.config.minter_interval,
                data: identity,
            })
            .await?;

        info!("wallet sync started");
        *workers = Some(ActiveWorkers {
            balance,
            pending,
            minter,
            forwarders,
        });
        Ok(())
    }

    /// Disarm all worker timers without tearing the contexts down.
    pub async fn stop(&self) -> Result<(), SyncError> {
        let workers = self.workers.lock().await;
        if let Some(w) = workers.as_ref() {
            w.balance.send(WorkerCommand::Stop).await?;
            w.pending.send(WorkerCommand::Stop).await?;
            w.minter.send(WorkerCommand::Stop).await?;
            info!("wallet sync stopped");
        }
        Ok(())
    }

    /// Run every sync job once, outside its schedule.
    pub async fn refresh(&self, identity: CallerIdentity) -> Result<(), SyncError> {
        let workers = self.workers.lock().await;
        if let Some(w) = workers.as_ref() {
            w.balance
                .send(WorkerCommand::Trigger {
                    data: identity.clone(),
                })
                .await?;
            w.pending
                .send(WorkerCommand::Trigger {
                    data: identity.clone(),
                })
                .await?;
            w.minter
                .send(WorkerCommand::Trigger { data: identity })
                .await?;
        }
        Ok(())
    }

    /// Tear the worker contexts down and stop republishing events.
    pub async fn shutdown(&self) {
        let workers = self.workers.lock().await.take();
        if let Some(w) = workers {
            w.balance.destroy().await;
            w.pending.destroy().await;
            w.minter.destroy().await;
            for handle in w.forwarders {
                handle.abort();
            }
            info!("wallet sync shut down");
        }
    }

    /// Observe the wallet state. Each caller gets an independent receiver.
    pub fn state(&self) -> watch::Receiver<WalletState> {
        self.state_tx.subscribe()
    }

    pub fn balance_store(&self) -> BalanceStore {
        Arc::clone(&self.balance_store)
    }

    pub fn pending_store(&self) -> PendingStore {
        Arc::clone(&self.pending_store)
    }

    pub fn minter_store(&self) -> MinterStore {
        Arc::clone(&self.minter_store)
    }
}

async fn forward_balance(
    mut rx: broadcast::Receiver<BalanceSyncEvent>,
    tx: watch::Sender<WalletState>,
    clock: Arc<dyn Clock>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => tx.send_modify(|state| match event {
                BalanceSyncEvent::Synced { balance, certified } => {
                    state.balance = Some(balance);
                    state.balance_certified = certified;
                    state.last_synced_at_ms = Some(clock.now_ms());
                    state.last_error = None;
                }
                BalanceSyncEvent::SyncFailed { reason, .. } => {
                    state.last_error = Some(reason);
                }
            }),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn forward_pending(
    mut rx: broadcast::Receiver<PendingTxSyncEvent>,
    tx: watch::Sender<WalletState>,
    clock: Arc<dyn Clock>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => tx.send_modify(|state| match event {
                PendingTxSyncEvent::Synced { pending } => {
                    state.pending_utxos = pending;
                    state.last_synced_at_ms = Some(clock.now_ms());
                    state.last_error = None;
                }
                PendingTxSyncEvent::SyncFailed { reason } => {
                    state.last_error = Some(reason);
                }
            }),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn forward_minter(
    mut rx: broadcast::Receiver<MinterInfoEvent>,
    tx: watch::Sender<WalletState>,
    clock: Arc<dyn Clock>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => tx.send_modify(|state| match event {
                MinterInfoEvent::Synced { info, .. } => {
                    state.minter = Some(info);
                    state.last_synced_at_ms = Some(clock.now_ms());
                    state.last_error = None;
                }
                MinterInfoEvent::SyncFailed { reason, .. } => {
                    state.last_error = Some(reason);
                }
            }),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
