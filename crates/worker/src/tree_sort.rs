//! Hourly tree sort-order recomputation.
//!
//! [`TreeSortScheduler`] runs as a background task, periodically triggering
//! the global pre-order recomputation for the area and category trees.
//! Both jobs are gated by their last-processed timestamps, so a tick with
//! no structural changes is a cheap no-op.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use navwarn_db::repositories::{AreaRepo, CategoryRepo};
use navwarn_db::DbPool;

/// How often the scheduler recomputes the tree sort order.
const DEFAULT_RECOMPUTE_INTERVAL: Duration = Duration::from_secs(3600);

/// Background service recomputing the global tree sort order.
pub struct TreeSortScheduler {
    pool: DbPool,
    interval: Duration,
}

impl TreeSortScheduler {
    /// Create a scheduler with the default hourly interval.
    pub fn new(pool: DbPool) -> Self {
        Self::with_interval(pool, DEFAULT_RECOMPUTE_INTERVAL)
    }

    /// Create a scheduler with a custom interval.
    pub fn with_interval(pool: DbPool, interval: Duration) -> Self {
        Self { pool, interval }
    }

    /// Run the scheduler loop. Exits gracefully when the provided
    /// [`CancellationToken`] is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Tree sort scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.recompute().await;
                }
            }
        }
    }

    /// One recomputation pass. A failing tree does not stop the other.
    async fn recompute(&self) {
        if let Err(e) = AreaRepo::recompute_tree_sort_order(&self.pool).await {
            tracing::error!(error = %e, "Failed to recompute area tree sort order");
        }
        if let Err(e) = CategoryRepo::recompute_tree_sort_order(&self.pool).await {
            tracing::error!(error = %e, "Failed to recompute category tree sort order");
        }
    }
}
