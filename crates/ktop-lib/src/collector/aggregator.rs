//! Shared per-cycle collection and top-K ranking

use crate::models::{EntityMetric, MetricKey};
use tokio::sync::Mutex;

/// Entity metrics gathered during one poll cycle.
///
/// All appends and rankings go through the same lock, so a ranking never
/// observes a half-finished append.
#[derive(Debug)]
pub struct SharedCollection {
    generation: u64,
    entries: Mutex<Vec<EntityMetric>>,
}

/// Top-K snapshot of a collection, detached from it once produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedView {
    /// Poll cycle the snapshot was taken from
    pub generation: u64,
    /// Collection size at ranking time
    pub collected: usize,
    /// At most K rows, ranking key descending
    pub rows: Vec<EntityMetric>,
}

impl SharedCollection {
    /// Create an empty collection for poll cycle `generation`
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append one fetched entity
    pub async fn push(&self, metric: EntityMetric) {
        self.entries.lock().await.push(metric);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Sort by `key` descending and copy out the first `k` entries.
    ///
    /// Entries themselves are never reordered; the stable sort runs over
    /// references, so equal keys always come out in insertion order.
    pub async fn rank(&self, key: MetricKey, k: usize) -> RankedView {
        let entries = self.entries.lock().await;
        let mut ordered: Vec<&EntityMetric> = entries.iter().collect();
        ordered.sort_by(|a, b| b.key(key).total_cmp(&a.key(key)));

        RankedView {
            generation: self.generation,
            collected: entries.len(),
            rows: ordered.into_iter().take(k).cloned().collect(),
        }
    }
}

/// Rank `collection` by `key`, keeping at most `k` rows
pub async fn rank(collection: &SharedCollection, key: MetricKey, k: usize) -> RankedView {
    collection.rank(key, k).await
}
