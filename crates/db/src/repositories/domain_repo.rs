//! Repository for the `domains` and `domain_areas` tables.

use sqlx::{PgPool, Postgres, Transaction};

use navwarn_core::types::DbId;

use crate::error::DbError;
use crate::models::area::{Area, AREA_TYPE_FIRING};
use crate::models::domain::{CreateDomain, Domain};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, domain_key, name, active, created_at, updated_at";

/// Column list for the `areas` table (used in scoped queries).
const AREA_COLUMNS: &str = "a.id, a.parent_id, a.sibling_sort_order, a.tree_sort_order, \
    a.lineage, a.area_type, a.geometry, a.created_at, a.updated_at";

/// Provides CRUD operations for publishing domains and their area scoping.
pub struct DomainRepo;

impl DomainRepo {
    /// Insert a new domain. Linked areas are written in the same
    /// transaction.
    pub async fn create(pool: &PgPool, input: &CreateDomain) -> Result<Domain, DbError> {
        let mut tx = pool.begin().await?;

        let insert = format!(
            "INSERT INTO domains (domain_key, name, active) \
             VALUES ($1, $2, COALESCE($3, true)) \
             RETURNING {COLUMNS}"
        );
        let domain: Domain = sqlx::query_as(&insert)
            .bind(&input.domain_key)
            .bind(&input.name)
            .bind(input.active)
            .fetch_one(&mut *tx)
            .await?;

        if !input.area_ids.is_empty() {
            Self::set_areas_tx(&mut tx, domain.id, &input.area_ids).await?;
        }

        tx.commit().await?;
        Ok(domain)
    }

    /// Find a domain by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Domain>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM domains WHERE id = $1");
        Ok(sqlx::query_as(&query).bind(id).fetch_optional(pool).await?)
    }

    /// Find a domain by its stable external key.
    pub async fn find_by_key(pool: &PgPool, domain_key: &str) -> Result<Option<Domain>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM domains WHERE domain_key = $1");
        Ok(sqlx::query_as(&query)
            .bind(domain_key)
            .fetch_optional(pool)
            .await?)
    }

    /// Replace a domain's linked area set.
    pub async fn set_areas(pool: &PgPool, domain_id: DbId, area_ids: &[DbId]) -> Result<(), DbError> {
        let mut tx = pool.begin().await?;
        Self::set_areas_tx(&mut tx, domain_id, area_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    /// IDs of the areas linked to a domain.
    pub async fn find_area_ids(pool: &PgPool, domain_id: DbId) -> Result<Vec<DbId>, DbError> {
        let rows: Vec<(DbId,)> =
            sqlx::query_as("SELECT area_id FROM domain_areas WHERE domain_id = $1 ORDER BY area_id")
                .bind(domain_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Firing areas visible to a domain.
    ///
    /// A domain linked to area subtrees sees the firing areas whose lineage
    /// falls under any linked area (materialized-path prefix match); a
    /// domain with no linked areas sees every firing area.
    pub async fn find_firing_areas(pool: &PgPool, domain_id: DbId) -> Result<Vec<Area>, DbError> {
        let query = format!(
            "SELECT {AREA_COLUMNS} FROM areas a \
             WHERE a.area_type = $2 \
               AND ( \
                 NOT EXISTS (SELECT 1 FROM domain_areas da WHERE da.domain_id = $1) \
                 OR EXISTS ( \
                   SELECT 1 FROM domain_areas da \
                   JOIN areas r ON r.id = da.area_id \
                   WHERE da.domain_id = $1 AND a.lineage LIKE r.lineage || '%' \
                 ) \
               ) \
             ORDER BY a.tree_sort_order, a.id"
        );
        Ok(sqlx::query_as(&query)
            .bind(domain_id)
            .bind(AREA_TYPE_FIRING)
            .fetch_all(pool)
            .await?)
    }

    async fn set_areas_tx(
        tx: &mut Transaction<'_, Postgres>,
        domain_id: DbId,
        area_ids: &[DbId],
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM domain_areas WHERE domain_id = $1")
            .bind(domain_id)
            .execute(&mut **tx)
            .await?;
        for area_id in area_ids {
            sqlx::query("INSERT INTO domain_areas (domain_id, area_id) VALUES ($1, $2)")
                .bind(domain_id)
                .bind(area_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}
