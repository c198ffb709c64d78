//! Prometheus metrics for the synchronization core.
//!
//! Counters cover query issuance, response delivery and suppression, timer
//! activity, and job failures. The [`SyncMetrics`] struct owns a dedicated
//! [`Registry`] that an application-level metrics endpoint can encode into
//! the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

/// Central collection of sync-core Prometheus metrics.
pub struct SyncMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Uncertified (fast, single-replica) requests issued.
    pub queries_uncertified: IntCounter,
    /// Certified (consensus-confirmed) requests issued.
    pub queries_certified: IntCounter,
    /// Responses delivered to load callbacks.
    pub responses_delivered: IntCounter,
    /// Late branch results dropped after a certified response was final.
    pub responses_suppressed: IntCounter,
    /// Request branch failures surfaced through error callbacks.
    pub request_errors: IntCounter,
    /// Uncertified writes refused because certified data was already stored.
    pub stale_writes_refused: IntCounter,
    /// Periodic ticks dispatched by timers.
    pub ticks_fired: IntCounter,
    /// Ticks skipped because the previous run was still in flight.
    pub ticks_skipped: IntCounter,
    /// Job runs that returned an error (caught at the tick boundary).
    pub jobs_failed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Worker contexts currently alive.
    pub workers_live: IntGauge,
}

impl SyncMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let queries_uncertified = register_int_counter_with_registry!(
            Opts::new(
                "skiff_queries_uncertified_total",
                "Uncertified ledger requests issued"
            ),
            registry
        )
        .expect("failed to register queries_uncertified counter");

        let queries_certified = register_int_counter_with_registry!(
            Opts::new(
                "skiff_queries_certified_total",
                "Certified ledger requests issued"
            ),
            registry
        )
        .expect("failed to register queries_certified counter");

        let responses_delivered = register_int_counter_with_registry!(
            Opts::new(
                "skiff_responses_delivered_total",
                "Responses delivered to load callbacks"
            ),
            registry
        )
        .expect("failed to register responses_delivered counter");

        let responses_suppressed = register_int_counter_with_registry!(
            Opts::new(
                "skiff_responses_suppressed_total",
                "Late branch results dropped after certified delivery"
            ),
            registry
        )
        .expect("failed to register responses_suppressed counter");

        let request_errors = register_int_counter_with_registry!(
            Opts::new(
                "skiff_request_errors_total",
                "Request branch failures surfaced through error callbacks"
            ),
            registry
        )
        .expect("failed to register request_errors counter");

        let stale_writes_refused = register_int_counter_with_registry!(
            Opts::new(
                "skiff_stale_writes_refused_total",
                "Uncertified writes refused because certified data exists"
            ),
            registry
        )
        .expect("failed to register stale_writes_refused counter");

        let ticks_fired = register_int_counter_with_registry!(
            Opts::new("skiff_ticks_fired_total", "Periodic ticks dispatched"),
            registry
        )
        .expect("failed to register ticks_fired counter");

        let ticks_skipped = register_int_counter_with_registry!(
            Opts::new(
                "skiff_ticks_skipped_total",
                "Ticks skipped under single-flight overlap policy"
            ),
            registry
        )
        .expect("failed to register ticks_skipped counter");

        let jobs_failed = register_int_counter_with_registry!(
            Opts::new("skiff_jobs_failed_total", "Job runs that returned an error"),
            registry
        )
        .expect("failed to register jobs_failed counter");

        let workers_live = register_int_gauge_with_registry!(
            Opts::new("skiff_workers_live", "Worker contexts currently alive"),
            registry
        )
        .expect("failed to register workers_live gauge");

        Self {
            registry,
            queries_uncertified,
            queries_certified,
            responses_delivered,
            responses_suppressed,
            request_errors,
            stale_writes_refused,
            ticks_fired,
            ticks_skipped,
            jobs_failed,
            workers_live,
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_register_cleanly() {
        let metrics = SyncMetrics::new();
        metrics.queries_certified.inc();
        metrics.ticks_fired.inc();
        metrics.workers_live.set(2);

        let families = metrics.registry.gather();
        assert!(!families.is_empty());
    }

    #[test]
    fn two_instances_do_not_collide() {
        // Each instance owns its own registry, so duplicate registration
        // across instances must be impossible.
        let _a = SyncMetrics::new();
        let _b = SyncMetrics::new();
    }
}
