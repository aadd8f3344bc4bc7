// Aggregation Cache - last known per-queue counts

use crate::domain::{AggregationSnapshot, QueueName};
use crate::error::{AppError, Result};
use crate::port::QueueRepository;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owns the most recent successful snapshot.
///
/// Readers never touch the store; only `refresh` does.
pub struct AggregationCache {
    repo: Arc<dyn QueueRepository>,
    tracked_queues: Vec<QueueName>,
    latest: RwLock<Option<AggregationSnapshot>>,
}

impl AggregationCache {
    /// `tracked_queues` empty = report whatever queues currently have callers
    pub fn new(repo: Arc<dyn QueueRepository>, tracked_queues: Vec<QueueName>) -> Self {
        Self {
            repo,
            tracked_queues,
            latest: RwLock::new(None),
        }
    }

    /// Rebuild the snapshot from the store.
    ///
    /// On failure the previous snapshot is kept.
    pub async fn refresh(&self) -> Result<AggregationSnapshot> {
        let snapshot = self
            .repo
            .count_by_queue(&self.tracked_queues)
            .await
            .map_err(|e| AppError::AggregationFailure(e.to_string()))?;

        *self.latest.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Last successful snapshot, `None` before the first refresh
    pub async fn latest(&self) -> Option<AggregationSnapshot> {
        self.latest.read().await.clone()
    }

    pub fn tracked_queues(&self) -> &[QueueName] {
        &self.tracked_queues
    }
}
