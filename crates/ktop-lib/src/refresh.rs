//! Refresh loop
//!
//! Re-ranks the current collection and redraws it on a fixed period.
//! Draws once immediately, then alternates between waiting for the next
//! tick and rendering, until a cancellation arrives. Cancellation is
//! checked first whenever both are ready, and never waits for a tick.

use crate::collector::SharedCollection;
use crate::config::TopConfig;
use crate::error::TopError;
use crate::models::MetricKey;
use crate::observability::FetchMetrics;
use crate::view::{RenderSink, RowFormatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Timer-driven re-rank and redraw of the top-K view
pub struct RefreshLoop<S: RenderSink> {
    /// Collection published by the poll loop
    collections: watch::Receiver<Arc<SharedCollection>>,
    sink: S,
    formatter: RowFormatter,
    metric_key: MetricKey,
    top_k: usize,
    period: Duration,
    metrics: Option<FetchMetrics>,
}

impl<S: RenderSink> RefreshLoop<S> {
    pub fn new(
        collections: watch::Receiver<Arc<SharedCollection>>,
        sink: S,
        config: &TopConfig,
    ) -> Self {
        Self {
            collections,
            sink,
            formatter: RowFormatter::new(config),
            metric_key: config.metric_key,
            top_k: config.top_k,
            period: config.refresh_period,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: FetchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Render until `shutdown` fires or closes; returns the number of frames drawn.
    ///
    /// A sink failure ends the loop with the error.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<u64, TopError> {
        let (renders, result) = self.run_counted(shutdown).await;
        result.map(|()| renders)
    }

    /// Like [`run`](Self::run), but reports the frames drawn on failure too
    pub async fn run_counted(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> (u64, Result<(), TopError>) {
        info!(
            refresh_ms = self.period.as_millis() as u64,
            metric_key = %self.metric_key,
            top_k = self.top_k,
            "Starting refresh loop"
        );

        let mut renders = 0u64;
        if let Err(e) = self.render_tick().await {
            return (renders, Err(e));
        }
        renders += 1;

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(renders = renders, "Refresh loop cancelled");
                    return (renders, Ok(()));
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.render_tick().await {
                        return (renders, Err(e));
                    }
                    renders += 1;
                }
            }
        }
    }

    async fn render_tick(&mut self) -> Result<(), TopError> {
        let collection = self.collections.borrow().clone();
        let view = collection.rank(self.metric_key, self.top_k).await;

        if let Some(metrics) = &self.metrics {
            metrics.set_ranked(view.collected, view.rows.len());
        }
        debug!(
            generation = view.generation,
            collected = view.collected,
            rows = view.rows.len(),
            "Rendering ranked view"
        );

        let frame = self.formatter.frame(&view);
        self.sink.render(&frame)?;
        Ok(())
    }
}
