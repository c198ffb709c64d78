//! Nullable ledger — a scriptable request collaborator.
//!
//! Each branch of a racing query (uncertified / certified) pops the next
//! scripted outcome for its flag. Outcomes can respond after a virtual
//! delay, fail, or hang forever, which is enough to drive every
//! interleaving the coordinator has to handle. All delays use tokio time,
//! so tests running under paused time stay fully deterministic.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use skiff_types::{LedgerError, QueryParams};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One scripted reply from the null ledger.
#[derive(Clone, Debug)]
pub enum ScriptedOutcome<R> {
    /// Resolve with `value` after `delay` of virtual time.
    Respond { value: R, delay: Duration },
    /// Reject with `error` after `delay` of virtual time.
    Fail { error: LedgerError, delay: Duration },
    /// Never settle.
    Hang,
}

/// A deterministic stand-in for the replicated ledger network.
pub struct NullLedger<R> {
    uncertified: Mutex<VecDeque<ScriptedOutcome<R>>>,
    certified: Mutex<VecDeque<ScriptedOutcome<R>>>,
    seen: Mutex<Vec<QueryParams>>,
}

impl<R: Clone + Send + Sync + 'static> NullLedger<R> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            uncertified: Mutex::new(VecDeque::new()),
            certified: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Script the next outcome for an uncertified request.
    pub fn script_uncertified(&self, outcome: ScriptedOutcome<R>) {
        lock(&self.uncertified).push_back(outcome);
    }

    /// Script the next outcome for a certified request.
    pub fn script_certified(&self, outcome: ScriptedOutcome<R>) {
        lock(&self.certified).push_back(outcome);
    }

    /// Script both branches to respond, each after its own delay.
    pub fn respond_both(
        &self,
        uncertified_value: R,
        uncertified_delay: Duration,
        certified_value: R,
        certified_delay: Duration,
    ) {
        self.script_uncertified(ScriptedOutcome::Respond {
            value: uncertified_value,
            delay: uncertified_delay,
        });
        self.script_certified(ScriptedOutcome::Respond {
            value: certified_value,
            delay: certified_delay,
        });
    }

    /// Every request this ledger has received, in arrival order.
    pub fn requests_seen(&self) -> Vec<QueryParams> {
        lock(&self.seen).clone()
    }

    /// Build the request function handed to the sync core.
    pub fn request_fn(
        self: &Arc<Self>,
    ) -> impl Fn(QueryParams) -> BoxFuture<'static, Result<R, LedgerError>> + Send + Sync + Clone
    {
        let ledger = Arc::clone(self);
        move |params: QueryParams| {
            let ledger = Arc::clone(&ledger);
            async move {
                lock(&ledger.seen).push(params.clone());
                let outcome = if params.certified {
                    lock(&ledger.certified).pop_front()
                } else {
                    lock(&ledger.uncertified).pop_front()
                };
                match outcome {
                    Some(ScriptedOutcome::Respond { value, delay }) => {
                        tokio::time::sleep(delay).await;
                        Ok(value)
                    }
                    Some(ScriptedOutcome::Fail { error, delay }) => {
                        tokio::time::sleep(delay).await;
                        Err(error)
                    }
                    Some(ScriptedOutcome::Hang) => std::future::pending().await,
                    None => Err(LedgerError::Rejected("unscripted request".to_string())),
                }
            }
            .boxed()
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
