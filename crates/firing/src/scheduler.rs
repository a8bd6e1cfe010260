//! Nightly firing-exercise scheduler.
//!
//! [`FiringExerciseScheduler`] runs as a background task and triggers the
//! exercise reconciliation once per night at a fixed UTC hour. The loop
//! exits gracefully when the provided [`CancellationToken`] is cancelled.

use std::time::Duration;

use chrono::{NaiveTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use navwarn_core::types::Timestamp;

use crate::exercise::FiringExerciseService;

/// UTC hour of the nightly run.
const RUN_HOUR_UTC: u32 = 3;

/// Background service evaluating the firing schedules once per night.
pub struct FiringExerciseScheduler {
    service: FiringExerciseService,
}

impl FiringExerciseScheduler {
    pub fn new(service: FiringExerciseService) -> Self {
        Self { service }
    }

    /// Run the scheduler loop.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let delay = delay_until_next_run(Utc::now());
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Firing exercise scheduler cancelled");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    match self.service.update_firing_exercises().await {
                        Ok(summary) => tracing::info!(
                            schedules = summary.schedules,
                            published = summary.published,
                            cancelled = summary.cancelled,
                            failed = summary.failed,
                            "Firing exercise update completed"
                        ),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to update firing exercises")
                        }
                    }
                }
            }
        }
    }
}

/// Time remaining until the next nightly run.
fn delay_until_next_run(now: Timestamp) -> Duration {
    let run_time = NaiveTime::from_hms_opt(RUN_HOUR_UTC, 0, 0).unwrap_or(NaiveTime::MIN);
    let today_run = Utc.from_utc_datetime(&now.date_naive().and_time(run_time));
    let next = if today_run > now {
        today_run
    } else {
        today_run + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
