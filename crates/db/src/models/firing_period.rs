//! Firing period entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use navwarn_core::firing::FiringInterval;
use navwarn_core::types::{DbId, Timestamp};

/// A row from the `firing_periods` table: one time interval during which a
/// firing area is active.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FiringPeriod {
    pub id: DbId,
    pub area_id: DbId,
    pub from_date: Timestamp,
    pub to_date: Timestamp,
    /// Identifier carried over from migrated legacy systems.
    pub legacy_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FiringPeriod {
    pub fn interval(&self) -> FiringInterval {
        FiringInterval::new(self.from_date, self.to_date)
    }
}

/// DTO for creating a new firing period. All of `area_id`, `from_date` and
/// `to_date` are required; an `id` marks an already-persisted period and is
/// rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFiringPeriod {
    pub id: Option<DbId>,
    pub area_id: Option<DbId>,
    pub from_date: Option<Timestamp>,
    pub to_date: Option<Timestamp>,
    pub legacy_id: Option<String>,
}

/// DTO for updating an existing firing period. `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFiringPeriod {
    pub from_date: Option<Timestamp>,
    pub to_date: Option<Timestamp>,
}
