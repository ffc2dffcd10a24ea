//! Display session entry points
//!
//! Wires the poll loop, refresh loop and render sink together for a live
//! session, and provides a one-shot snapshot for non-interactive use.

use crate::collector::{FanOut, MetricsSource, PollLoop, RankedView, SharedCollection};
use crate::config::TopConfig;
use crate::error::TopError;
use crate::observability::{FetchMetrics, StructuredLogger};
use crate::refresh::RefreshLoop;
use crate::view::RenderSink;
use std::sync::Arc;
use tokio::sync::broadcast;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of a session that ended by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames drawn, including the initial one
    pub renders: u64,
}

/// A validated, ready-to-run display session
pub struct Session<S: RenderSink> {
    config: TopConfig,
    source: Arc<dyn MetricsSource>,
    sink: S,
    metrics: Option<FetchMetrics>,
    logger: StructuredLogger,
}

impl<S: RenderSink> Session<S> {
    pub fn builder() -> SessionBuilder<S> {
        SessionBuilder::new()
    }

    /// Run until `shutdown` fires.
    ///
    /// Fails before drawing anything if the first inventory listing fails.
    /// Fetch tasks still in flight when the session ends are abandoned.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<SessionSummary, TopError> {
        self.logger.log_startup(
            VERSION,
            &self.config.metric_key.to_string(),
            self.config.top_k,
        );

        let mut poll_builder = PollLoop::builder()
            .source(self.source.clone())
            .poll_period(self.config.poll_period)
            .jitter(self.config.jitter_max)
            .logger(self.logger.clone());
        if let Some(metrics) = &self.metrics {
            poll_builder = poll_builder.metrics(metrics.clone());
        }

        let (poll_loop, collections) = match poll_builder.start().await {
            Ok(started) => started,
            Err(e) => {
                self.logger.log_shutdown(&e.to_string(), 0);
                return Err(e);
            }
        };
        let poll_task = tokio::spawn(poll_loop.run(shutdown.resubscribe()));

        let mut refresh = RefreshLoop::new(collections, self.sink, &self.config);
        if let Some(metrics) = &self.metrics {
            refresh = refresh.with_metrics(metrics.clone());
        }
        let (renders, result) = refresh.run_counted(shutdown).await;

        // Covers exits that did not come from the shutdown channel
        poll_task.abort();

        match result {
            Ok(()) => {
                self.logger.log_shutdown("cancelled", renders);
                Ok(SessionSummary { renders })
            }
            Err(e) => {
                self.logger.log_shutdown(&e.to_string(), renders);
                Err(e)
            }
        }
    }
}

/// Builder for a display session
pub struct SessionBuilder<S: RenderSink> {
    config: TopConfig,
    source: Option<Arc<dyn MetricsSource>>,
    sink: Option<S>,
    metrics: Option<FetchMetrics>,
}

impl<S: RenderSink> SessionBuilder<S> {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: TopConfig::default(),
            source: None,
            sink: None,
            metrics: None,
        }
    }

    pub fn config(mut self, config: TopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sink(mut self, sink: S) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach the counter hook for fetch outcomes
    pub fn metrics(mut self, metrics: FetchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and build the session.
    ///
    /// Nothing is fetched before this succeeds.
    pub fn build(self) -> Result<Session<S>, TopError> {
        self.config.validate()?;
        let source = self.source.ok_or(TopError::Incomplete("metrics source"))?;
        let sink = self.sink.ok_or(TopError::Incomplete("render sink"))?;

        Ok(Session {
            logger: StructuredLogger::new(self.config.display_mode.to_string()),
            config: self.config,
            source,
            sink,
            metrics: self.metrics,
        })
    }
}

impl<S: RenderSink> Default for SessionBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a single poll cycle to completion and rank it once
pub async fn snapshot(
    config: &TopConfig,
    source: Arc<dyn MetricsSource>,
    metrics: Option<FetchMetrics>,
) -> Result<RankedView, TopError> {
    config.validate()?;

    let entities = source.list_entities().await?;
    let collection = Arc::new(SharedCollection::new(1));

    let mut fan_out = FanOut::new(config.jitter_max);
    if let Some(metrics) = &metrics {
        fan_out = fan_out.with_metrics(metrics.clone());
        metrics.inc_poll_cycles();
    }
    fan_out
        .launch(entities, source, collection.clone())
        .join()
        .await;

    let view = collection.rank(config.metric_key, config.top_k).await;
    if let Some(metrics) = &metrics {
        metrics.set_ranked(view.collected, view.rows.len());
    }
    Ok(view)
}
