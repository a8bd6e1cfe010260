//! `navwarn-worker` -- background worker for the navigational-warning
//! administration core.
//!
//! Hosts the periodic jobs: the hourly area/category tree sort-order
//! recomputation and the nightly firing-exercise reconciliation.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default | Description                         |
//! |----------------------------|----------|---------|-------------------------------------|
//! | `DATABASE_URL`             | yes      | --      | PostgreSQL connection URL           |
//! | `TREE_SORT_INTERVAL_SECS`  | no       | `3600`  | Seconds between tree-sort passes    |

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use navwarn_firing::exercise::FiringExerciseService;
use navwarn_firing::scheduler::FiringExerciseScheduler;
use navwarn_firing::store::PgMessageStore;
use navwarn_worker::tree_sort::TreeSortScheduler;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navwarn_worker=info,navwarn_db=info,navwarn_firing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::error!("DATABASE_URL environment variable is required");
        std::process::exit(1);
    });

    let pool = match navwarn_db::create_pool(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to the database");
            std::process::exit(1);
        }
    };
    if let Err(e) = navwarn_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Failed to apply database migrations");
        std::process::exit(1);
    }

    let tree_scheduler = match std::env::var("TREE_SORT_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        Some(secs) => TreeSortScheduler::with_interval(pool.clone(), Duration::from_secs(secs)),
        None => TreeSortScheduler::new(pool.clone()),
    };

    let store = Arc::new(PgMessageStore::new(pool.clone()));
    let firing_scheduler =
        FiringExerciseScheduler::new(FiringExerciseService::new(pool.clone(), store));

    let cancel = CancellationToken::new();
    let tree_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { tree_scheduler.run(cancel).await }
    });
    let firing_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { firing_scheduler.run(cancel).await }
    });

    tracing::info!("Worker started");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for the shutdown signal");
    }
    tracing::info!("Shutting down");
    cancel.cancel();
    let _ = tree_handle.await;
    let _ = firing_handle.await;
}
