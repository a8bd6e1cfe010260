//! Repository for the `messages` and `message_areas` tables.

use std::collections::HashMap;

use sqlx::PgPool;

use navwarn_core::types::DbId;

use crate::error::DbError;
use crate::models::message::{CreateMessage, Message, MessageStatus, MessageWithAreas};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, uid, domain_id, series_id, status, publish_date_from, \
    publish_date_to, geometry, categories, charts, parts, descs, auto_title, \
    created_at, updated_at";

/// Qualified column list for joined queries.
const M_COLUMNS: &str = "m.id, m.uid, m.domain_id, m.series_id, m.status, \
    m.publish_date_from, m.publish_date_to, m.geometry, m.categories, m.charts, \
    m.parts, m.descs, m.auto_title, m.created_at, m.updated_at";

/// Provides persistence for the message slice used by the firing-exercise
/// generator.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a new message and its area references in one transaction.
    pub async fn create(pool: &PgPool, input: &CreateMessage) -> Result<MessageWithAreas, DbError> {
        let parts = serde_json::to_value(&input.parts)?;
        let descs = serde_json::to_value(&input.descs)?;

        let mut tx = pool.begin().await?;
        let insert = format!(
            "INSERT INTO messages \
                (uid, domain_id, series_id, status, publish_date_from, publish_date_to, \
                 geometry, categories, charts, parts, descs, auto_title) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        let message: Message = sqlx::query_as(&insert)
            .bind(&input.uid)
            .bind(input.domain_id)
            .bind(&input.series_id)
            .bind(input.status.as_str())
            .bind(input.publish_date_from)
            .bind(input.publish_date_to)
            .bind(&input.geometry)
            .bind(&input.categories)
            .bind(&input.charts)
            .bind(&parts)
            .bind(&descs)
            .bind(input.auto_title)
            .fetch_one(&mut *tx)
            .await?;

        for area_id in &input.area_ids {
            sqlx::query("INSERT INTO message_areas (message_id, area_id) VALUES ($1, $2)")
                .bind(message.id)
                .bind(area_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(MessageWithAreas {
            message,
            area_ids: input.area_ids.clone(),
        })
    }

    /// Transition a message to a new status by its UID. Returns whether a
    /// message was updated.
    pub async fn update_status(
        pool: &PgPool,
        uid: &str,
        status: MessageStatus,
    ) -> Result<bool, DbError> {
        let result =
            sqlx::query("UPDATE messages SET status = $1, updated_at = NOW() WHERE uid = $2")
                .bind(status.as_str())
                .bind(uid)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a message by its UID.
    pub async fn find_by_uid(pool: &PgPool, uid: &str) -> Result<Option<MessageWithAreas>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM messages WHERE uid = $1");
        let message: Option<Message> =
            sqlx::query_as(&query).bind(uid).fetch_optional(pool).await?;
        match message {
            Some(message) => {
                let mut areas = Self::area_ids_for(pool, &[message.id]).await?;
                let area_ids = areas.remove(&message.id).unwrap_or_default();
                Ok(Some(MessageWithAreas { message, area_ids }))
            }
            None => Ok(None),
        }
    }

    /// Published messages of a domain referencing at least one of the given
    /// areas, optionally restricted to a message series.
    pub async fn search_published(
        pool: &PgPool,
        domain_id: DbId,
        series_id: Option<&str>,
        area_ids: &[DbId],
    ) -> Result<Vec<MessageWithAreas>, DbError> {
        let query = format!(
            "SELECT DISTINCT {M_COLUMNS} FROM messages m \
             JOIN message_areas ma ON ma.message_id = m.id \
             WHERE m.domain_id = $1 \
               AND m.status = $2 \
               AND ma.area_id = ANY($3) \
               AND ($4::text IS NULL OR m.series_id = $4) \
             ORDER BY m.id"
        );
        let messages: Vec<Message> = sqlx::query_as(&query)
            .bind(domain_id)
            .bind(MessageStatus::Published.as_str())
            .bind(area_ids)
            .bind(series_id)
            .fetch_all(pool)
            .await?;

        let ids: Vec<DbId> = messages.iter().map(|m| m.id).collect();
        let mut areas = Self::area_ids_for(pool, &ids).await?;
        Ok(messages
            .into_iter()
            .map(|message| {
                let area_ids = areas.remove(&message.id).unwrap_or_default();
                MessageWithAreas { message, area_ids }
            })
            .collect())
    }

    /// Area references for a set of messages.
    async fn area_ids_for(
        pool: &PgPool,
        message_ids: &[DbId],
    ) -> Result<HashMap<DbId, Vec<DbId>>, DbError> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(DbId, DbId)> = sqlx::query_as(
            "SELECT message_id, area_id FROM message_areas \
             WHERE message_id = ANY($1) ORDER BY message_id, area_id",
        )
        .bind(message_ids)
        .fetch_all(pool)
        .await?;

        let mut by_message: HashMap<DbId, Vec<DbId>> = HashMap::new();
        for (message_id, area_id) in rows {
            by_message.entry(message_id).or_default().push(area_id);
        }
        Ok(by_message)
    }
}
