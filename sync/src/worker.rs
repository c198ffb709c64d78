//! Worker contexts — isolated execution with singleton reuse.
//!
//! A worker context is a spawned task reachable only by message passing: it
//! owns the receiving end of a command channel and posts events outward
//! through a [`BackpressureQueue`] that a drain loop fans out to
//! subscribers. The [`WorkerRegistry`] is an explicit arena holding the
//! shared singleton slot and its reference count; nothing here relies on
//! module-level statics, so refcounting is testable in isolation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skiff_types::WorkerCommand;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::backpressure::{self, BackpressureQueue};
use crate::error::SyncError;
use crate::metrics::SyncMetrics;

/// Capacity of a worker's inbound command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Builds a worker's body: receives the command channel and the outbound
/// event queue, returns the handle of the spawned context task.
pub type SpawnFn<D, E> = Arc<
    dyn Fn(mpsc::Receiver<WorkerCommand<D>>, BackpressureQueue<E>) -> JoinHandle<()>
        + Send
        + Sync,
>;

/// When a shared (singleton) worker is actually terminated.
///
/// `Deferred` waits until the reference count reaches zero and is the safe
/// default; `Immediate` terminates on the first destroy, dropping any other
/// consumers still holding the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    Deferred,
    Immediate,
}

/// Optional hook invoked after a context has been terminated.
pub type TeardownCallback = Arc<dyn Fn() + Send + Sync>;

struct WorkerEntry<D, E> {
    commands: mpsc::Sender<WorkerCommand<D>>,
    events: broadcast::Sender<E>,
    context: JoinHandle<()>,
    drain: JoinHandle<()>,
}

struct ChannelState<D, E> {
    entry: Option<WorkerEntry<D, E>>,
    ref_count: usize,
    tearing_down: bool,
}

/// Arena owning the singleton slot for one kind of worker.
pub struct WorkerRegistry<D, E> {
    shared: Arc<Mutex<ChannelState<D, E>>>,
    policy: TeardownPolicy,
    queue_capacity: usize,
    metrics: Arc<SyncMetrics>,
    on_teardown: Option<TeardownCallback>,
}

/// A call site's handle to a worker context.
///
/// Singleton handles share one underlying context through the registry's
/// slot; exclusive handles own theirs outright.
pub struct WorkerChannel<D, E> {
    state: Arc<Mutex<ChannelState<D, E>>>,
    singleton: bool,
    policy: TeardownPolicy,
    metrics: Arc<SyncMetrics>,
    on_teardown: Option<TeardownCallback>,
}

impl<D, E> WorkerRegistry<D, E>
where
    D: Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new(policy: TeardownPolicy, queue_capacity: usize, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ChannelState {
                entry: None,
                ref_count: 0,
                tearing_down: false,
            })),
            policy,
            queue_capacity,
            metrics,
            on_teardown: None,
        }
    }

    /// Install a hook that runs after a context is terminated.
    pub fn with_teardown_callback(mut self, callback: TeardownCallback) -> Self {
        self.on_teardown = Some(callback);
        self
    }

    /// Obtain a worker context.
    ///
    /// `as_singleton = true` reuses (or creates) the shared context and
    /// bumps its reference count; `false` spawns a fresh, exclusively owned
    /// context.
    pub async fn get_instance(
        &self,
        spawn: &SpawnFn<D, E>,
        as_singleton: bool,
    ) -> WorkerChannel<D, E> {
        let state = if as_singleton {
            let mut st = self.shared.lock().await;
            if st.entry.is_none() {
                st.entry = Some(self.spawn_entry(spawn));
                st.ref_count = 1;
            } else {
                st.ref_count += 1;
            }
            Arc::clone(&self.shared)
        } else {
            Arc::new(Mutex::new(ChannelState {
                entry: Some(self.spawn_entry(spawn)),
                ref_count: 1,
                tearing_down: false,
            }))
        };

        WorkerChannel {
            state,
            singleton: as_singleton,
            policy: self.policy,
            metrics: Arc::clone(&self.metrics),
            on_teardown: self.on_teardown.clone(),
        }
    }

    /// Current reference count of the shared singleton slot.
    pub async fn ref_count(&self) -> usize {
        self.shared.lock().await.ref_count
    }

    fn spawn_entry(&self, spawn: &SpawnFn<D, E>) -> WorkerEntry<D, E> {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (queue, mut queue_rx) = backpressure::channel::<E>(self.queue_capacity);
        let (event_tx, _) = broadcast::channel(self.queue_capacity);

        // Drain loop: forwards the bounded queue to subscribers. A send
        // error only means no subscriber is currently attached.
        let drain_tx = event_tx.clone();
        let drain = tokio::spawn(async move {
            while let Some(event) = queue_rx.recv().await {
                let _ = drain_tx.send(event);
            }
        });

        let context = spawn(command_rx, queue);
        self.metrics.workers_live.inc();
        tracing::debug!("worker context spawned");

        WorkerEntry {
            commands: command_tx,
            events: event_tx,
            context,
            drain,
        }
    }
}

impl<D, E> WorkerChannel<D, E>
where
    D: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Send a control command into the worker.
    pub async fn send(&self, command: WorkerCommand<D>) -> Result<(), SyncError> {
        let sender = {
            let st = self.state.lock().await;
            match &st.entry {
                Some(entry) => entry.commands.clone(),
                None => return Err(SyncError::WorkerDestroyed),
            }
        };
        sender
            .send(command)
            .await
            .map_err(|_| SyncError::WorkerDestroyed)
    }

    /// Attach a listener for worker events. Listeners are additive: every
    /// subscriber gets its own receiver, so independent consumers of a
    /// shared context never clobber each other.
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<E>, SyncError> {
        let st = self.state.lock().await;
        match &st.entry {
            Some(entry) => Ok(entry.events.subscribe()),
            None => Err(SyncError::WorkerDestroyed),
        }
    }

    /// Whether the underlying context is still alive.
    pub async fn is_alive(&self) -> bool {
        self.state.lock().await.entry.is_some()
    }

    /// Current reference count on the underlying context.
    pub async fn ref_count(&self) -> usize {
        self.state.lock().await.ref_count
    }

    /// Release this handle's claim on the context.
    ///
    /// In singleton mode the reference count is decremented and the context
    /// is only terminated when the count reaches zero (under
    /// [`TeardownPolicy::Deferred`]). Exclusive contexts terminate
    /// unconditionally. Returns `true` when the underlying context was
    /// actually terminated. Idempotent: destroying an already-destroyed
    /// handle is a no-op, never an error.
    pub async fn destroy(&self) -> bool {
        let entry = {
            let mut st = self.state.lock().await;
            // Reentrancy guard: a destroy arriving while teardown runs
            // (e.g. from an in-flight event handler) must not double-run
            // the teardown sequence.
            if st.tearing_down || st.entry.is_none() {
                return false;
            }
            if self.singleton {
                st.ref_count = st.ref_count.saturating_sub(1);
                let terminate = match self.policy {
                    TeardownPolicy::Deferred => st.ref_count == 0,
                    TeardownPolicy::Immediate => true,
                };
                if !terminate {
                    return false;
                }
                st.ref_count = 0;
            } else {
                st.ref_count = 0;
            }
            st.tearing_down = true;
            st.entry.take()
        };

        // Teardown steps are best-effort and sequenced; none of them can
        // fail in a way that skips the rest, and the guard is cleared
        // unconditionally afterwards.
        if let Some(entry) = entry {
            // 1. Ask the worker to disarm its timer.
            let _ = entry.commands.try_send(WorkerCommand::Stop);
            // 2. Hard-stop the context. In-flight work is cut off, not
            //    gracefully unwound.
            entry.context.abort();
            // 3. Drop the event fan-out; subscribers observe channel close.
            entry.drain.abort();
            self.metrics.workers_live.dec();
            tracing::debug!("worker context terminated");
            // 4. Notify the owner.
            if let Some(callback) = &self.on_teardown {
                callback();
            }
        }

        self.state.lock().await.tearing_down = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// A worker body that echoes trigger data back as events.
    fn echo_spawn() -> SpawnFn<u32, String> {
        Arc::new(|mut commands, queue| {
            tokio::spawn(async move {
                while let Some(command) = commands.recv().await {
                    match command {
                        WorkerCommand::Trigger { data } => {
                            let _ = queue.send(format!("run:{data}")).await;
                        }
                        WorkerCommand::Start { .. } | WorkerCommand::Stop => {}
                    }
                }
            })
        })
    }

    fn registry(policy: TeardownPolicy) -> WorkerRegistry<u32, String> {
        WorkerRegistry::new(policy, 8, Arc::new(SyncMetrics::new()))
    }

    #[tokio::test]
    async fn singleton_refcounting_end_to_end() {
        let registry = registry(TeardownPolicy::Deferred);
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, true).await;
        let b = registry.get_instance(&spawn, true).await;
        let c = registry.get_instance(&spawn, true).await;
        assert_eq!(registry.ref_count().await, 3);

        // All three handles talk to the same context: a subscriber on `a`
        // sees a trigger sent through `c`.
        let mut events = a.subscribe().await.unwrap();
        c.send(WorkerCommand::Trigger { data: 7 }).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), "run:7");

        // First two destroys only decrement.
        assert!(!a.destroy().await);
        assert_eq!(registry.ref_count().await, 2);
        assert!(!b.destroy().await);
        assert_eq!(registry.ref_count().await, 1);
        assert!(c.is_alive().await);

        // Third destroy terminates.
        assert!(c.destroy().await);
        assert_eq!(registry.ref_count().await, 0);
        assert!(!c.is_alive().await);
        assert!(matches!(
            c.send(WorkerCommand::Trigger { data: 1 }).await,
            Err(SyncError::WorkerDestroyed)
        ));

        // A fourth, spurious destroy is a no-op and does not panic.
        assert!(!c.destroy().await);
        assert_eq!(registry.ref_count().await, 0);
    }

    #[tokio::test]
    async fn non_singleton_contexts_are_independent() {
        let registry = registry(TeardownPolicy::Deferred);
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, false).await;
        let b = registry.get_instance(&spawn, false).await;

        // Destroying one exclusive context terminates it unconditionally
        // and leaves the other untouched.
        assert!(a.destroy().await);
        assert!(!a.is_alive().await);
        assert!(b.is_alive().await);

        let mut events = b.subscribe().await.unwrap();
        b.send(WorkerCommand::Trigger { data: 3 }).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), "run:3");

        assert!(b.destroy().await);
    }

    #[tokio::test]
    async fn immediate_policy_terminates_on_first_destroy() {
        let registry = registry(TeardownPolicy::Immediate);
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, true).await;
        let b = registry.get_instance(&spawn, true).await;
        assert_eq!(registry.ref_count().await, 2);

        // First destroy drops the shared context for everyone.
        assert!(a.destroy().await);
        assert!(!b.is_alive().await);
        assert!(!b.destroy().await);
    }

    #[tokio::test]
    async fn singleton_recreated_after_full_teardown() {
        let registry = registry(TeardownPolicy::Deferred);
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, true).await;
        assert!(a.destroy().await);

        let b = registry.get_instance(&spawn, true).await;
        assert_eq!(registry.ref_count().await, 1);
        let mut events = b.subscribe().await.unwrap();
        b.send(WorkerCommand::Trigger { data: 9 }).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), "run:9");
        assert!(b.destroy().await);
    }

    #[tokio::test]
    async fn listeners_are_additive_on_shared_context() {
        let registry = registry(TeardownPolicy::Deferred);
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, true).await;
        let b = registry.get_instance(&spawn, true).await;

        let mut events_a = a.subscribe().await.unwrap();
        let mut events_b = b.subscribe().await.unwrap();

        a.send(WorkerCommand::Trigger { data: 5 }).await.unwrap();
        assert_eq!(events_a.recv().await.unwrap(), "run:5");
        assert_eq!(events_b.recv().await.unwrap(), "run:5");

        a.destroy().await;
        b.destroy().await;
    }

    #[tokio::test]
    async fn teardown_callback_runs_once_at_termination() {
        let calls = Arc::new(AtomicU32::new(0));
        let callback: TeardownCallback = {
            let calls = Arc::clone(&calls);
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let registry =
            registry(TeardownPolicy::Deferred).with_teardown_callback(callback);
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, true).await;
        let b = registry.get_instance(&spawn, true).await;

        a.destroy().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        b.destroy().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        b.destroy().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribers_observe_close_on_teardown() {
        let registry = registry(TeardownPolicy::Deferred);
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, true).await;
        let mut events = a.subscribe().await.unwrap();
        a.destroy().await;

        // Give the aborted drain task a moment to wind down.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            events.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn workers_live_gauge_tracks_contexts() {
        let metrics = Arc::new(SyncMetrics::new());
        let registry: WorkerRegistry<u32, String> =
            WorkerRegistry::new(TeardownPolicy::Deferred, 8, Arc::clone(&metrics));
        let spawn = echo_spawn();

        let a = registry.get_instance(&spawn, false).await;
        let b = registry.get_instance(&spawn, false).await;
        assert_eq!(metrics.workers_live.get(), 2);

        a.destroy().await;
        b.destroy().await;
        assert_eq!(metrics.workers_live.get(), 0);
    }
}
