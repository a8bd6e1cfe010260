//! Repository for the `firing_schedules` table.

use sqlx::PgPool;

use navwarn_core::error::CoreError;
use navwarn_core::types::DbId;

use crate::error::DbError;
use crate::models::firing_schedule::{CreateFiringSchedule, FiringSchedule, UpdateFiringSchedule};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, domain_id, target_domain_id, target_series_id, schedule_days, \
    active, created_at, updated_at";

/// Provides CRUD operations for firing schedules.
pub struct FiringScheduleRepo;

impl FiringScheduleRepo {
    /// Insert a new firing schedule. The lookahead window defaults to 30
    /// days.
    pub async fn create(
        pool: &PgPool,
        input: &CreateFiringSchedule,
    ) -> Result<FiringSchedule, DbError> {
        let insert = format!(
            "INSERT INTO firing_schedules \
                (domain_id, target_domain_id, target_series_id, schedule_days, active) \
             VALUES ($1, $2, $3, COALESCE($4, 30), COALESCE($5, true)) \
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as(&insert)
            .bind(input.domain_id)
            .bind(input.target_domain_id)
            .bind(&input.target_series_id)
            .bind(input.schedule_days)
            .bind(input.active)
            .fetch_one(pool)
            .await?)
    }

    /// Update an existing firing schedule.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateFiringSchedule,
    ) -> Result<FiringSchedule, DbError> {
        let update = format!(
            "UPDATE firing_schedules SET \
                target_series_id = COALESCE($1, target_series_id), \
                schedule_days = COALESCE($2, schedule_days), \
                active = COALESCE($3, active), \
                updated_at = NOW() \
             WHERE id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as(&update)
            .bind(&input.target_series_id)
            .bind(input.schedule_days)
            .bind(input.active)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("firing schedule {id}")).into())
    }

    /// Delete a firing schedule.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM firing_schedules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a firing schedule by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<FiringSchedule>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM firing_schedules WHERE id = $1");
        Ok(sqlx::query_as(&query).bind(id).fetch_optional(pool).await?)
    }

    /// All firing schedules.
    pub async fn list(pool: &PgPool) -> Result<Vec<FiringSchedule>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM firing_schedules ORDER BY id");
        Ok(sqlx::query_as(&query).fetch_all(pool).await?)
    }

    /// The active firing schedules evaluated by the nightly job.
    pub async fn find_active(pool: &PgPool) -> Result<Vec<FiringSchedule>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM firing_schedules WHERE active ORDER BY id");
        Ok(sqlx::query_as(&query).fetch_all(pool).await?)
    }
}
