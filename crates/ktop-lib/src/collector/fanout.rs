//! Concurrent per-entity fetch fan-out
//!
//! Launches one task per entity. Each task waits a random delay to spread
//! load on the metrics API, fetches, and appends to the collection it was
//! handed at launch. Failed fetches are dropped and counted.

use super::{MetricsSource, SharedCollection};
use crate::models::{EntityMetric, EntityRef};
use crate::observability::FetchMetrics;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Spawns fetch tasks for a poll cycle
#[derive(Clone)]
pub struct FanOut {
    /// Upper bound (exclusive) of the random start delay
    jitter_max: Duration,
    /// Optional counters for dropped and completed fetches
    metrics: Option<FetchMetrics>,
}

/// Tasks of one fan-out.
///
/// Nothing in the live display waits on these: a cycle's tasks are
/// either detached or joined explicitly, never dropped by accident.
#[must_use = "fan-out tasks should be detached or joined explicitly"]
pub struct FanOutHandle {
    generation: u64,
    tasks: Vec<JoinHandle<()>>,
}

impl FanOut {
    pub fn new(jitter_max: Duration) -> Self {
        Self {
            jitter_max,
            metrics: None,
        }
    }

    /// Attach a metrics hook for fetch outcomes
    pub fn with_metrics(mut self, metrics: FetchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Launch one fetch task per entity, appending into `collection`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(
        &self,
        entities: Vec<EntityRef>,
        source: Arc<dyn MetricsSource>,
        collection: Arc<SharedCollection>,
    ) -> FanOutHandle {
        let generation = collection.generation();
        debug!(
            generation = generation,
            entities = entities.len(),
            jitter_ms = self.jitter_max.as_millis() as u64,
            "Launching fetch fan-out"
        );

        let tasks = entities
            .into_iter()
            .map(|entity| {
                let delay = jitter_delay(self.jitter_max);
                tokio::spawn(fetch_one(
                    entity,
                    delay,
                    source.clone(),
                    collection.clone(),
                    self.metrics.clone(),
                ))
            })
            .collect();

        FanOutHandle { generation, tasks }
    }
}

impl FanOutHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Abandon the tasks. They keep running and finish against the
    /// collection they were launched with, even after it is rotated out.
    pub fn detach(self) {
        trace!(
            generation = self.generation,
            tasks = self.tasks.len(),
            "Detaching fetch tasks"
        );
    }

    /// Wait for every task of this fan-out to finish
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                debug!(generation = self.generation, error = %e, "Fetch task ended abnormally");
            }
        }
    }
}

async fn fetch_one(
    entity: EntityRef,
    delay: Duration,
    source: Arc<dyn MetricsSource>,
    collection: Arc<SharedCollection>,
    metrics: Option<FetchMetrics>,
) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let start = Instant::now();
    let result = source.fetch_metric(&entity).await;
    if let Some(metrics) = &metrics {
        metrics.observe_fetch_latency(start.elapsed().as_secs_f64());
    }

    match result {
        Ok(raw) => {
            collection.push(EntityMetric::from_raw(&entity, &raw)).await;
            if let Some(metrics) = &metrics {
                metrics.inc_fetch_success();
            }
        }
        Err(e) => {
            if let Some(metrics) = &metrics {
                metrics.inc_fetch_failures();
            }
            debug!(
                entity = %entity.qualified_name(),
                generation = collection.generation(),
                error = %e,
                "Dropping entity from poll cycle"
            );
        }
    }
}

/// Uniform random delay in `[0, max)`, zero when `max` is zero
pub(crate) fn jitter_delay(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}
