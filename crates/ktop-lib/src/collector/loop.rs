//! Poll cycle loop
//!
//! Lists the inventory on a fixed period and launches a fresh fan-out for
//! every cycle. Each cycle gets its own collection, published to readers
//! through a watch channel; the previous one is replaced, never cleared.

use super::{FanOut, MetricsSource, SharedCollection};
use crate::error::TopError;
use crate::models::EntityRef;
use crate::observability::{FetchMetrics, StructuredLogger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Drives poll cycles for a display session
pub struct PollLoop {
    /// Cluster inventory and metrics
    source: Arc<dyn MetricsSource>,
    /// Fetch task launcher
    fan_out: FanOut,
    /// Time between poll cycles
    poll_period: Duration,
    /// Collection of the current cycle
    current: watch::Sender<Arc<SharedCollection>>,
    /// Generation of the published collection
    generation: u64,
    logger: StructuredLogger,
    metrics: Option<FetchMetrics>,
}

impl PollLoop {
    pub fn builder() -> PollLoopBuilder {
        PollLoopBuilder::new()
    }

    /// Generation of the currently published collection
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run poll cycles until shutdown
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            poll_secs = self.poll_period.as_secs_f64(),
            "Starting poll loop"
        );

        let mut ticker = interval_at(Instant::now() + self.poll_period, self.poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Shutting down poll loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_cycle().await;
                }
            }
        }
    }

    /// List the inventory and rotate to a new collection.
    ///
    /// A failed listing keeps the previous collection published.
    async fn poll_cycle(&mut self) {
        let generation = self.generation + 1;

        match self.source.list_entities().await {
            Ok(entities) => {
                let collection = Arc::new(SharedCollection::new(generation));
                self.generation = generation;
                self.current.send_replace(collection.clone());
                self.launch(entities, collection);
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_inventory_failures();
                }
                self.logger
                    .log_inventory_failure(generation, &e.to_string());
            }
        }
    }

    fn launch(&self, entities: Vec<EntityRef>, collection: Arc<SharedCollection>) {
        self.logger
            .log_poll_cycle(collection.generation(), entities.len());
        if let Some(metrics) = &self.metrics {
            metrics.inc_poll_cycles();
        }

        // Late results land in the collection they were launched with
        self.fan_out
            .launch(entities, self.source.clone(), collection)
            .detach();
    }
}

/// Builder for creating and starting the poll loop
pub struct PollLoopBuilder {
    source: Option<Arc<dyn MetricsSource>>,
    poll_period: Duration,
    jitter: Duration,
    logger: Option<StructuredLogger>,
    metrics: Option<FetchMetrics>,
}

impl PollLoopBuilder {
    /// Create a new builder with default periods
    pub fn new() -> Self {
        Self {
            source: None,
            poll_period: Duration::from_secs(10),
            jitter: Duration::from_secs(1),
            logger: None,
            metrics: None,
        }
    }

    /// Set the metrics source
    pub fn source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the poll period
    pub fn poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }

    /// Set the maximum per-fetch jitter
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn metrics(mut self, metrics: FetchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the first poll cycle and return the loop with a reader for
    /// the published collection.
    ///
    /// The first inventory listing must succeed; its failure is returned.
    pub async fn start(
        self,
    ) -> Result<(PollLoop, watch::Receiver<Arc<SharedCollection>>), TopError> {
        let source = self.source.ok_or(TopError::Incomplete("metrics source"))?;
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("unknown"));

        let mut fan_out = FanOut::new(self.jitter);
        if let Some(metrics) = &self.metrics {
            fan_out = fan_out.with_metrics(metrics.clone());
        }

        let entities = source.list_entities().await?;
        let collection = Arc::new(SharedCollection::new(1));
        let (current, reader) = watch::channel(collection.clone());

        let poll_loop = PollLoop {
            source,
            fan_out,
            poll_period: self.poll_period,
            current,
            generation: 1,
            logger,
            metrics: self.metrics,
        };
        poll_loop.launch(entities, collection);

        Ok((poll_loop, reader))
    }
}

impl Default for PollLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
