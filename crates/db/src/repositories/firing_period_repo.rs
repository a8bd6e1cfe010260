//! Repository for the `firing_periods` table.

use sqlx::PgPool;

use navwarn_core::error::CoreError;
use navwarn_core::firing;
use navwarn_core::types::{DbId, Timestamp};

use crate::error::DbError;
use crate::models::firing_period::{CreateFiringPeriod, FiringPeriod, UpdateFiringPeriod};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, area_id, from_date, to_date, legacy_id, created_at, updated_at";

/// Provides CRUD operations for firing periods.
pub struct FiringPeriodRepo;

impl FiringPeriodRepo {
    /// Insert a new firing period.
    ///
    /// The area and both interval endpoints are required; a DTO carrying an
    /// id denotes an already-persisted period and is rejected.
    pub async fn add(pool: &PgPool, input: &CreateFiringPeriod) -> Result<FiringPeriod, DbError> {
        if input.id.is_some() {
            return Err(CoreError::Validation(
                "firing period has already been persisted".to_string(),
            )
            .into());
        }
        let (area_id, from_date, to_date) =
            firing::validate_period(input.area_id, input.from_date, input.to_date)?;

        let insert = format!(
            "INSERT INTO firing_periods (area_id, from_date, to_date, legacy_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as(&insert)
            .bind(area_id)
            .bind(from_date)
            .bind(to_date)
            .bind(&input.legacy_id)
            .fetch_one(pool)
            .await?)
    }

    /// Update an existing firing period's interval. Updating a period that
    /// does not exist is a validation failure.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateFiringPeriod,
    ) -> Result<FiringPeriod, DbError> {
        let existing = Self::find_by_id(pool, id).await?.ok_or_else(|| {
            CoreError::Validation(format!("firing period {id} does not exist"))
        })?;

        let from_date = input.from_date.unwrap_or(existing.from_date);
        let to_date = input.to_date.unwrap_or(existing.to_date);

        let update = format!(
            "UPDATE firing_periods SET from_date = $1, to_date = $2, updated_at = NOW() \
             WHERE id = $3 \
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as(&update)
            .bind(from_date)
            .bind(to_date)
            .bind(id)
            .fetch_one(pool)
            .await?)
    }

    /// Delete a firing period.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM firing_periods WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a firing period by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<FiringPeriod>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM firing_periods WHERE id = $1");
        Ok(sqlx::query_as(&query).bind(id).fetch_optional(pool).await?)
    }

    /// All firing periods of an area, in display order.
    pub async fn find_by_area(pool: &PgPool, area_id: DbId) -> Result<Vec<FiringPeriod>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM firing_periods WHERE area_id = $1 \
             ORDER BY from_date, to_date, id"
        );
        Ok(sqlx::query_as(&query)
            .bind(area_id)
            .fetch_all(pool)
            .await?)
    }

    /// Firing periods of the given areas whose interval intersects the
    /// closed window `[from, to]`.
    pub async fn find_in_window(
        pool: &PgPool,
        area_ids: &[DbId],
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<FiringPeriod>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM firing_periods \
             WHERE area_id = ANY($1) AND from_date <= $3 AND to_date >= $2 \
             ORDER BY from_date, to_date, id"
        );
        Ok(sqlx::query_as(&query)
            .bind(area_ids)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await?)
    }
}
