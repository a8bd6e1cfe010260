//! Repository for the `settings` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use navwarn_core::types::Timestamp;

use crate::error::DbError;

/// Provides access to single named values. Timestamps are stored as
/// RFC 3339 text.
pub struct SettingRepo;

impl SettingRepo {
    /// Get a setting value, `None` when absent.
    pub async fn get(pool: &PgPool, key: &str) -> Result<Option<String>, DbError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = $1")
                .bind(key)
                .fetch_optional(pool)
                .await?;
        Ok(row.and_then(|(value,)| value))
    }

    /// Upsert a setting value.
    pub async fn set(pool: &PgPool, key: &str, value: &str) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Get a timestamp-valued setting. Unparseable values read as absent.
    pub async fn get_timestamp(pool: &PgPool, key: &str) -> Result<Option<Timestamp>, DbError> {
        let value = Self::get(pool, key).await?;
        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    /// Upsert a timestamp-valued setting.
    pub async fn set_timestamp(pool: &PgPool, key: &str, value: Timestamp) -> Result<(), DbError> {
        Self::set(pool, key, &value.to_rfc3339()).await
    }
}
