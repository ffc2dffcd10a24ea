//! Metrics collection from the cluster
//!
//! This module fans per-entity metric requests out over concurrent tasks,
//! accumulates the results into a per-cycle shared collection and rotates
//! that collection on every poll cycle.

mod aggregator;
mod fanout;
mod r#loop;


pub use aggregator::{rank, RankedView, SharedCollection};
pub use fanout::{FanOut, FanOutHandle};
pub use r#loop::{PollLoop, PollLoopBuilder};

use crate::error::RetrievalError;
use crate::models::{EntityRef, RawMetric};

pub use async_trait::async_trait;

/// Inventory and metric queries against a cluster
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// List the entities to poll in the next cycle
    async fn list_entities(&self) -> Result<Vec<EntityRef>, RetrievalError>;

    /// Fetch current usage for a single entity
    async fn fetch_metric(&self, entity: &EntityRef) -> Result<RawMetric, RetrievalError>;
}
