//! Repository for the `areas` and `area_descs` tables.
//!
//! Besides plain CRUD this repository carries the tree-mutation service:
//! two-phase create (the lineage needs the generated id), move with a
//! global lineage refresh, sibling reordering and the timestamp-gated
//! global tree-sort recomputation. The tree arithmetic itself lives in
//! `navwarn_core::tree`; this layer loads a forest snapshot, runs the pure
//! functions and persists exactly the returned change sets.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};

use navwarn_core::error::CoreError;
use navwarn_core::tree;
use navwarn_core::types::{DbId, Timestamp};

use crate::error::DbError;
use crate::models::area::{Area, AreaDesc, AreaWithDescs, CreateArea, DescInput, UpdateArea};
use crate::models::setting::SETTING_AREA_LAST_UPDATE;
use crate::repositories::SettingRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, parent_id, sibling_sort_order, tree_sort_order, lineage, \
    area_type, geometry, created_at, updated_at";

/// Column list for the `area_descs` table.
const DESC_COLUMNS: &str = "id, area_id, lang, name";

/// Provides CRUD and tree-mutation operations for areas.
pub struct AreaRepo;

impl AreaRepo {
    // -----------------------------------------------------------------------
    // Create / update / delete
    // -----------------------------------------------------------------------

    /// Insert a new area, optionally attached under a parent.
    ///
    /// Attaching computes the sibling sort key and a `tree_sort_order`
    /// placeholder from the parent's current last child. The lineage is
    /// written in a second step because it embeds the generated id.
    pub async fn create(pool: &PgPool, input: &CreateArea) -> Result<AreaWithDescs, DbError> {
        let mut tx = pool.begin().await?;

        let (sibling_sort, tree_sort, parent_lineage) = match input.parent_id {
            Some(parent_id) => {
                let parent = Self::find_by_id_tx(&mut tx, parent_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("area {parent_id}")))?;
                let last_child = Self::find_last_child_tx(&mut tx, parent_id).await?;
                let (sibling_sort, tree_sort) = tree::child_attach_orders(
                    last_child.map(|c| (c.sibling_sort_order, c.tree_sort_order)),
                    parent.tree_sort_order,
                );
                (sibling_sort, tree_sort, parent.lineage)
            }
            None => (input.sibling_sort_order.unwrap_or(0.0), 0, None),
        };

        let insert = format!(
            "INSERT INTO areas (parent_id, sibling_sort_order, tree_sort_order, area_type, geometry) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let area: Area = sqlx::query_as(&insert)
            .bind(input.parent_id)
            .bind(sibling_sort)
            .bind(tree_sort)
            .bind(&input.area_type)
            .bind(&input.geometry)
            .fetch_one(&mut *tx)
            .await?;

        // Second phase: the lineage requires the generated id.
        let lineage = tree::lineage_of(parent_lineage.as_deref(), area.id);
        let update = format!("UPDATE areas SET lineage = $1 WHERE id = $2 RETURNING {COLUMNS}");
        let area: Area = sqlx::query_as(&update)
            .bind(&lineage)
            .bind(area.id)
            .fetch_one(&mut *tx)
            .await?;

        let descs = Self::replace_descs_tx(&mut tx, area.id, &input.descs).await?;
        tx.commit().await?;

        Ok(AreaWithDescs { area, descs })
    }

    /// Update an area's data fields.
    ///
    /// Persists nothing when the payload matches the stored state, so a
    /// repeated identical update is a no-op.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateArea,
    ) -> Result<AreaWithDescs, DbError> {
        let existing = Self::find_by_id_with_descs(pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("area {id}")))?;

        if !Self::has_changed(&existing, input) {
            return Ok(existing);
        }

        let mut tx = pool.begin().await?;
        let update = format!(
            "UPDATE areas SET \
                area_type = COALESCE($1, area_type), \
                geometry = COALESCE($2, geometry), \
                sibling_sort_order = COALESCE($3, sibling_sort_order), \
                updated_at = NOW() \
             WHERE id = $4 \
             RETURNING {COLUMNS}"
        );
        let area: Area = sqlx::query_as(&update)
            .bind(&input.area_type)
            .bind(&input.geometry)
            .bind(input.sibling_sort_order)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let descs = match &input.descs {
            Some(descs) => Self::replace_descs_tx(&mut tx, id, descs).await?,
            None => existing.descs,
        };
        tx.commit().await?;

        Ok(AreaWithDescs { area, descs })
    }

    /// Delete an area. Children must have been reparented or deleted first;
    /// a remaining child makes the delete fail on the parent FK.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM areas WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Find an area by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Area>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM areas WHERE id = $1");
        Ok(sqlx::query_as(&query).bind(id).fetch_optional(pool).await?)
    }

    /// Find an area by ID, enriched with its localized descriptions.
    pub async fn find_by_id_with_descs(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<AreaWithDescs>, DbError> {
        let area = Self::find_by_id(pool, id).await?;
        match area {
            Some(area) => {
                let query = format!(
                    "SELECT {DESC_COLUMNS} FROM area_descs WHERE area_id = $1 ORDER BY lang"
                );
                let descs = sqlx::query_as(&query).bind(id).fetch_all(pool).await?;
                Ok(Some(AreaWithDescs { area, descs }))
            }
            None => Ok(None),
        }
    }

    /// All areas, ordered by the global pre-order index.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Area>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM areas ORDER BY tree_sort_order, id");
        Ok(sqlx::query_as(&query).fetch_all(pool).await?)
    }

    /// All areas with their descriptions eagerly loaded, ordered by the
    /// global pre-order index.
    pub async fn find_all_with_descs(pool: &PgPool) -> Result<Vec<AreaWithDescs>, DbError> {
        let areas = Self::find_all(pool).await?;
        let query = format!("SELECT {DESC_COLUMNS} FROM area_descs ORDER BY area_id, lang");
        let descs: Vec<AreaDesc> = sqlx::query_as(&query).fetch_all(pool).await?;

        let mut by_area: HashMap<DbId, Vec<AreaDesc>> = HashMap::new();
        for desc in descs {
            by_area.entry(desc.area_id).or_default().push(desc);
        }
        Ok(areas
            .into_iter()
            .map(|area| {
                let descs = by_area.remove(&area.id).unwrap_or_default();
                AreaWithDescs { area, descs }
            })
            .collect())
    }

    /// All root areas, ordered by sibling sort key.
    pub async fn find_roots(pool: &PgPool) -> Result<Vec<Area>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM areas WHERE parent_id IS NULL ORDER BY sibling_sort_order, id"
        );
        Ok(sqlx::query_as(&query).fetch_all(pool).await?)
    }

    /// Areas matching a set of IDs.
    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Area>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM areas WHERE id = ANY($1) ORDER BY id");
        Ok(sqlx::query_as(&query).bind(ids).fetch_all(pool).await?)
    }

    /// Find an area by localized name, optionally restricted to a language
    /// and/or a parent. Name matching is case-insensitive.
    pub async fn find_by_name(
        pool: &PgPool,
        name: &str,
        lang: Option<&str>,
        parent_id: Option<DbId>,
    ) -> Result<Option<Area>, DbError> {
        let query = "SELECT a.id, a.parent_id, a.sibling_sort_order, a.tree_sort_order, a.lineage, \
                    a.area_type, a.geometry, a.created_at, a.updated_at \
             FROM areas a \
             JOIN area_descs d ON d.area_id = a.id \
             WHERE LOWER(d.name) = LOWER($1) \
               AND ($2::text IS NULL OR d.lang = $2) \
               AND ($3::bigint IS NULL OR a.parent_id = $3) \
             ORDER BY a.id LIMIT 1";

        Ok(sqlx::query_as(query)
            .bind(name)
            .bind(lang)
            .bind(parent_id)
            .fetch_optional(pool)
            .await?)
    }

    /// Localized descriptions for a set of areas.
    pub async fn find_descs_for(pool: &PgPool, ids: &[DbId]) -> Result<Vec<AreaDesc>, DbError> {
        let query = format!(
            "SELECT {DESC_COLUMNS} FROM area_descs WHERE area_id = ANY($1) ORDER BY area_id, lang"
        );
        Ok(sqlx::query_as(&query).bind(ids).fetch_all(pool).await?)
    }

    /// Most recent modification timestamp across all areas, `None` when the
    /// table is empty.
    pub async fn max_updated_at(pool: &PgPool) -> Result<Option<Timestamp>, DbError> {
        let row: (Option<Timestamp>,) = sqlx::query_as("SELECT MAX(updated_at) FROM areas")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    // -----------------------------------------------------------------------
    // Tree mutation
    // -----------------------------------------------------------------------

    /// Move an area under a new parent (or detach it as a root).
    ///
    /// Returns `false` without persisting when the area is already under
    /// the requested parent. A successful move triggers a global lineage
    /// refresh; `tree_sort_order` stays a placeholder until the next
    /// scheduled recomputation.
    pub async fn move_area(
        pool: &PgPool,
        id: DbId,
        new_parent_id: Option<DbId>,
    ) -> Result<bool, DbError> {
        let area = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("area {id}")))?;
        if area.parent_id == new_parent_id {
            return Ok(false);
        }

        let mut tx = pool.begin().await?;
        let (sibling_sort, tree_sort) = match new_parent_id {
            Some(parent_id) => {
                let parent = Self::find_by_id_tx(&mut tx, parent_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("area {parent_id}")))?;
                let last_child = Self::find_last_child_tx(&mut tx, parent_id).await?;
                tree::child_attach_orders(
                    last_child.map(|c| (c.sibling_sort_order, c.tree_sort_order)),
                    parent.tree_sort_order,
                )
            }
            // Detaching to the root level keeps the current keys.
            None => (area.sibling_sort_order, area.tree_sort_order),
        };

        sqlx::query(
            "UPDATE areas SET parent_id = $1, sibling_sort_order = $2, tree_sort_order = $3, \
             updated_at = NOW() WHERE id = $4",
        )
        .bind(new_parent_id)
        .bind(sibling_sort)
        .bind(tree_sort)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::update_lineages(pool).await?;
        Ok(true)
    }

    /// Move an area one step up or down among its siblings by assigning it
    /// a new fractional sort key. Sibling keys are never touched.
    ///
    /// Returns whether a change was persisted. Reordering root areas is not
    /// supported.
    pub async fn change_sort_order(
        pool: &PgPool,
        id: DbId,
        move_up: bool,
    ) -> Result<bool, DbError> {
        let area = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("area {id}")))?;

        let Some(parent_id) = area.parent_id else {
            tracing::warn!(area_id = id, "Sort-order changes are not supported for root areas");
            return Ok(false);
        };

        let query = format!(
            "SELECT {COLUMNS} FROM areas WHERE parent_id = $1 ORDER BY sibling_sort_order, id"
        );
        let siblings: Vec<Area> = sqlx::query_as(&query).bind(parent_id).fetch_all(pool).await?;
        let Some(index) = siblings.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        let orders: Vec<f64> = siblings.iter().map(|s| s.sibling_sort_order).collect();

        match tree::sibling_sort_for_move(&orders, index, move_up) {
            Some(new_sort) => {
                sqlx::query(
                    "UPDATE areas SET sibling_sort_order = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(new_sort)
                .bind(id)
                .execute(pool)
                .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Recompute lineages across the whole forest and persist only the rows
    /// whose lineage actually changed. Idempotent.
    pub async fn update_lineages(pool: &PgPool) -> Result<usize, DbError> {
        let rows = Self::find_all(pool).await?;
        let mut forest = tree::build_forest(rows.iter().map(Area::tree_node).collect());
        let changed = tree::update_lineages(&mut forest);
        if changed.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        for (id, lineage) in &changed {
            sqlx::query("UPDATE areas SET lineage = $1, updated_at = NOW() WHERE id = $2")
                .bind(lineage)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(changed.len())
    }

    /// Recompute the global pre-order `tree_sort_order` across all areas.
    ///
    /// Skips entirely when nothing was modified since the last processed
    /// timestamp (the `area_last_update` setting); otherwise persists the
    /// dirty set returned by the pure assignment pass and advances the
    /// gate. Returns whether any row was updated.
    pub async fn recompute_tree_sort_order(pool: &PgPool) -> Result<bool, DbError> {
        let Some(max_updated) = Self::max_updated_at(pool).await? else {
            tracing::debug!("No areas exist, skipping tree sort recomputation");
            return Ok(false);
        };
        if let Some(last_processed) =
            SettingRepo::get_timestamp(pool, SETTING_AREA_LAST_UPDATE).await?
        {
            if max_updated <= last_processed {
                return Ok(false);
            }
        }

        let rows = Self::find_all(pool).await?;
        let mut forest = tree::build_forest(rows.iter().map(Area::tree_node).collect());
        let updated = tree::assign_tree_sort_order(&mut forest);

        if !updated.is_empty() {
            let mut tx = pool.begin().await?;
            for (id, sort_order) in &updated {
                sqlx::query(
                    "UPDATE areas SET tree_sort_order = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(sort_order)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
        }

        SettingRepo::set_timestamp(pool, SETTING_AREA_LAST_UPDATE, max_updated).await?;
        tracing::info!(count = updated.len(), "Recomputed area tree sort order");
        Ok(!updated.is_empty())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn find_by_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<Area>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM areas WHERE id = $1");
        Ok(sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?)
    }

    async fn find_last_child_tx(
        tx: &mut Transaction<'_, Postgres>,
        parent_id: DbId,
    ) -> Result<Option<Area>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM areas WHERE parent_id = $1 \
             ORDER BY sibling_sort_order DESC, id DESC LIMIT 1"
        );
        Ok(sqlx::query_as(&query)
            .bind(parent_id)
            .fetch_optional(&mut **tx)
            .await?)
    }

    async fn replace_descs_tx(
        tx: &mut Transaction<'_, Postgres>,
        area_id: DbId,
        descs: &[DescInput],
    ) -> Result<Vec<AreaDesc>, DbError> {
        sqlx::query("DELETE FROM area_descs WHERE area_id = $1")
            .bind(area_id)
            .execute(&mut **tx)
            .await?;

        let mut rows = Vec::with_capacity(descs.len());
        let insert = format!(
            "INSERT INTO area_descs (area_id, lang, name) VALUES ($1, $2, $3) \
             RETURNING {DESC_COLUMNS}"
        );
        for desc in descs {
            let row: AreaDesc = sqlx::query_as(&insert)
                .bind(area_id)
                .bind(&desc.lang)
                .bind(&desc.name)
                .fetch_one(&mut **tx)
                .await?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Deep comparison deciding whether an update payload is a no-op.
    fn has_changed(existing: &AreaWithDescs, input: &UpdateArea) -> bool {
        if let Some(area_type) = &input.area_type {
            if existing.area.area_type.as_deref() != Some(area_type.as_str()) {
                return true;
            }
        }
        if let Some(geometry) = &input.geometry {
            if existing.area.geometry.as_ref() != Some(geometry) {
                return true;
            }
        }
        if let Some(sort) = input.sibling_sort_order {
            if existing.area.sibling_sort_order != sort {
                return true;
            }
        }
        if let Some(descs) = &input.descs {
            let existing_descs: HashMap<&str, &str> = existing
                .descs
                .iter()
                .map(|d| (d.lang.as_str(), d.name.as_str()))
                .collect();
            let new_descs: HashMap<&str, &str> = descs
                .iter()
                .map(|d| (d.lang.as_str(), d.name.as_str()))
                .collect();
            if existing_descs != new_descs {
                return true;
            }
        }
        false
    }
}
