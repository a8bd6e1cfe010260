//! Firing schedule configuration model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use navwarn_core::types::{DbId, Timestamp};

/// A row from the `firing_schedules` table.
///
/// Links a source domain (whose published firing-area messages and firing
/// periods are the inputs) to a target domain and message series where the
/// generated firing-exercise messages are published.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FiringSchedule {
    pub id: DbId,
    pub domain_id: DbId,
    pub target_domain_id: DbId,
    pub target_series_id: String,
    /// Lookahead window in days for collecting firing periods.
    pub schedule_days: i32,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new firing schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFiringSchedule {
    pub domain_id: DbId,
    pub target_domain_id: DbId,
    pub target_series_id: String,
    pub schedule_days: Option<i32>,
    pub active: Option<bool>,
}

/// DTO for updating an existing firing schedule. `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFiringSchedule {
    pub target_series_id: Option<String>,
    pub schedule_days: Option<i32>,
    pub active: Option<bool>,
}
