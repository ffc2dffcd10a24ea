//! Observability infrastructure for ktop
//!
//! Provides:
//! - Prometheus metrics for the fetch fan-out (success/failure counters, latency)
//! - Structured logging of session events with tracing

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use tracing::{info, warn};

/// Histogram buckets for per-entity fetch latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Counters and gauges for the fetch fan-out and ranking.
///
/// Each instance owns its own registry, so clones share the same
/// underlying metrics while separate instances stay independent.
#[derive(Clone)]
pub struct FetchMetrics {
    registry: Registry,
    fetch_success: IntCounter,
    fetch_failures: IntCounter,
    inventory_failures: IntCounter,
    poll_cycles: IntCounter,
    entities_collected: IntGauge,
    rows_ranked: IntGauge,
    fetch_latency_seconds: Histogram,
}

impl FetchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let fetch_success = IntCounter::new(
            "ktop_fetch_success_total",
            "Per-entity metric fetches that completed",
        )?;
        let fetch_failures = IntCounter::new(
            "ktop_fetch_failures_total",
            "Per-entity metric fetches dropped after a failure",
        )?;
        let inventory_failures = IntCounter::new(
            "ktop_inventory_failures_total",
            "Inventory listings that failed after startup",
        )?;
        let poll_cycles = IntCounter::new(
            "ktop_poll_cycles_total",
            "Poll cycles started",
        )?;
        let entities_collected = IntGauge::new(
            "ktop_entities_collected",
            "Entities in the current collection at the last refresh",
        )?;
        let rows_ranked = IntGauge::new(
            "ktop_rows_ranked",
            "Rows in the last ranked view",
        )?;
        let fetch_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ktop_fetch_latency_seconds",
                "Time spent in a single metric fetch, excluding jitter",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(fetch_success.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(inventory_failures.clone()))?;
        registry.register(Box::new(poll_cycles.clone()))?;
        registry.register(Box::new(entities_collected.clone()))?;
        registry.register(Box::new(rows_ranked.clone()))?;
        registry.register(Box::new(fetch_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            fetch_success,
            fetch_failures,
            inventory_failures,
            poll_cycles,
            entities_collected,
            rows_ranked,
            fetch_latency_seconds,
        })
    }

    pub fn inc_fetch_success(&self) {
        self.fetch_success.inc();
    }

    pub fn inc_fetch_failures(&self) {
        self.fetch_failures.inc();
    }

    pub fn inc_inventory_failures(&self) {
        self.inventory_failures.inc();
    }

    pub fn inc_poll_cycles(&self) {
        self.poll_cycles.inc();
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.fetch_latency_seconds.observe(duration_secs);
    }

    /// Record the size of the collection and of the view at a refresh
    pub fn set_ranked(&self, collected: usize, rows: usize) {
        self.entities_collected.set(collected as i64);
        self.rows_ranked.set(rows as i64);
    }

    pub fn fetch_success(&self) -> u64 {
        self.fetch_success.get()
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.get()
    }

    pub fn inventory_failures(&self) -> u64 {
        self.inventory_failures.get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for session events
///
/// Emits named events with the display mode attached so log lines
/// from node and pod sessions can be told apart.
#[derive(Clone)]
pub struct StructuredLogger {
    mode: String,
}

impl StructuredLogger {
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }

    /// Log session startup
    pub fn log_startup(&self, version: &str, metric_key: &str, top_k: usize) {
        info!(
            event = "session_started",
            mode = %self.mode,
            version = %version,
            metric_key = %metric_key,
            top_k = top_k,
            "ktop session started"
        );
    }

    /// Log the start of a poll cycle
    pub fn log_poll_cycle(&self, generation: u64, entities: usize) {
        info!(
            event = "poll_cycle",
            mode = %self.mode,
            generation = generation,
            entities = entities,
            "Started poll cycle"
        );
    }

    /// Log a failed inventory listing after startup
    pub fn log_inventory_failure(&self, generation: u64, error: &str) {
        warn!(
            event = "inventory_failed",
            mode = %self.mode,
            generation = generation,
            error = %error,
            "Inventory listing failed, keeping previous collection"
        );
    }

    /// Log session shutdown
    pub fn log_shutdown(&self, reason: &str, renders: u64) {
        info!(
            event = "session_stopped",
            mode = %self.mode,
            reason = %reason,
            renders = renders,
            "ktop session stopped"
        );
    }
}
