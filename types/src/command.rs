//! Inbound control protocol for sync workers.

use crate::interval::SyncInterval;

/// A command sent from the owning service into a worker context.
///
/// This is the worker's entire control surface. The worker's command loop
/// matches exhaustively; there is nothing to silently ignore on the control
/// side because the protocol is a closed enum rather than a string envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerCommand<D> {
    /// Arm the worker's periodic schedule (or register a triggerable job
    /// when the interval is [`SyncInterval::Disabled`]).
    Start { interval: SyncInterval, data: D },
    /// Disarm the periodic schedule. In-flight work is not cancelled.
    Stop,
    /// Run the job exactly once, immediately, without touching the schedule.
    Trigger { data: D },
}
