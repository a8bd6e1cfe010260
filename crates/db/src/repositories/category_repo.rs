//! Repository for the `categories` and `category_descs` tables.
//!
//! The category hierarchy is the areas' structural twin: the same
//! tree-mutation operations apply, gated by the `category_last_update`
//! setting instead.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};

use navwarn_core::error::CoreError;
use navwarn_core::tree;
use navwarn_core::types::{DbId, Timestamp};

use crate::error::DbError;
use crate::models::area::DescInput;
use crate::models::category::{
    Category, CategoryDesc, CategoryWithDescs, CreateCategory, UpdateCategory,
};
use crate::models::setting::SETTING_CATEGORY_LAST_UPDATE;
use crate::repositories::SettingRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, parent_id, sibling_sort_order, tree_sort_order, lineage, created_at, updated_at";

/// Column list for the `category_descs` table.
const DESC_COLUMNS: &str = "id, category_id, lang, name";

/// Provides CRUD and tree-mutation operations for categories.
pub struct CategoryRepo;

impl CategoryRepo {
    // -----------------------------------------------------------------------
    // Create / update / delete
    // -----------------------------------------------------------------------

    /// Insert a new category, optionally attached under a parent. The
    /// lineage is written in a second step because it embeds the generated
    /// id.
    pub async fn create(
        pool: &PgPool,
        input: &CreateCategory,
    ) -> Result<CategoryWithDescs, DbError> {
        let mut tx = pool.begin().await?;

        let (sibling_sort, tree_sort, parent_lineage) = match input.parent_id {
            Some(parent_id) => {
                let parent = Self::find_by_id_tx(&mut tx, parent_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("category {parent_id}")))?;
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
            "INSERT INTO categories (parent_id, sibling_sort_order, tree_sort_order) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        let category: Category = sqlx::query_as(&insert)
            .bind(input.parent_id)
            .bind(sibling_sort)
            .bind(tree_sort)
            .fetch_one(&mut *tx)
            .await?;

        let lineage = tree::lineage_of(parent_lineage.as_deref(), category.id);
        let update =
            format!("UPDATE categories SET lineage = $1 WHERE id = $2 RETURNING {COLUMNS}");
        let category: Category = sqlx::query_as(&update)
            .bind(&lineage)
            .bind(category.id)
            .fetch_one(&mut *tx)
            .await?;

        let descs = Self::replace_descs_tx(&mut tx, category.id, &input.descs).await?;
        tx.commit().await?;

        Ok(CategoryWithDescs { category, descs })
    }

    /// Update a category's data fields; identical payloads persist nothing.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCategory,
    ) -> Result<CategoryWithDescs, DbError> {
        let existing = Self::find_by_id_with_descs(pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("category {id}")))?;

        if !Self::has_changed(&existing, input) {
            return Ok(existing);
        }

        let mut tx = pool.begin().await?;
        let update = format!(
            "UPDATE categories SET \
                sibling_sort_order = COALESCE($1, sibling_sort_order), \
                updated_at = NOW() \
             WHERE id = $2 \
             RETURNING {COLUMNS}"
        );
        let category: Category = sqlx::query_as(&update)
            .bind(input.sibling_sort_order)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let descs = match &input.descs {
            Some(descs) => Self::replace_descs_tx(&mut tx, id, descs).await?,
            None => existing.descs,
        };
        tx.commit().await?;

        Ok(CategoryWithDescs { category, descs })
    }

    /// Delete a category. Children must have been reparented or deleted
    /// first.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Find a category by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Category>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as(&query).bind(id).fetch_optional(pool).await?)
    }

    /// Find a category by ID, enriched with its localized descriptions.
    pub async fn find_by_id_with_descs(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CategoryWithDescs>, DbError> {
        let category = Self::find_by_id(pool, id).await?;
        match category {
            Some(category) => {
                let query = format!(
                    "SELECT {DESC_COLUMNS} FROM category_descs WHERE category_id = $1 \
                     ORDER BY lang"
                );
                let descs = sqlx::query_as(&query).bind(id).fetch_all(pool).await?;
                Ok(Some(CategoryWithDescs { category, descs }))
            }
            None => Ok(None),
        }
    }

    /// All categories, ordered by the global pre-order index.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Category>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM categories ORDER BY tree_sort_order, id");
        Ok(sqlx::query_as(&query).fetch_all(pool).await?)
    }

    /// All categories with their descriptions eagerly loaded.
    pub async fn find_all_with_descs(pool: &PgPool) -> Result<Vec<CategoryWithDescs>, DbError> {
        let categories = Self::find_all(pool).await?;
        let query = format!("SELECT {DESC_COLUMNS} FROM category_descs ORDER BY category_id, lang");
        let descs: Vec<CategoryDesc> = sqlx::query_as(&query).fetch_all(pool).await?;

        let mut by_category: HashMap<DbId, Vec<CategoryDesc>> = HashMap::new();
        for desc in descs {
            by_category.entry(desc.category_id).or_default().push(desc);
        }
        Ok(categories
            .into_iter()
            .map(|category| {
                let descs = by_category.remove(&category.id).unwrap_or_default();
                CategoryWithDescs { category, descs }
            })
            .collect())
    }

    /// All root categories, ordered by sibling sort key.
    pub async fn find_roots(pool: &PgPool) -> Result<Vec<Category>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM categories WHERE parent_id IS NULL \
             ORDER BY sibling_sort_order, id"
        );
        Ok(sqlx::query_as(&query).fetch_all(pool).await?)
    }

    /// Most recent modification timestamp across all categories.
    pub async fn max_updated_at(pool: &PgPool) -> Result<Option<Timestamp>, DbError> {
        let row: (Option<Timestamp>,) = sqlx::query_as("SELECT MAX(updated_at) FROM categories")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    // -----------------------------------------------------------------------
    // Tree mutation
    // -----------------------------------------------------------------------

    /// Move a category under a new parent (or detach it as a root).
    /// `false` when it is already under the requested parent.
    pub async fn move_category(
        pool: &PgPool,
        id: DbId,
        new_parent_id: Option<DbId>,
    ) -> Result<bool, DbError> {
        let category = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("category {id}")))?;
        if category.parent_id == new_parent_id {
            return Ok(false);
        }

        let mut tx = pool.begin().await?;
        let (sibling_sort, tree_sort) = match new_parent_id {
            Some(parent_id) => {
                let parent = Self::find_by_id_tx(&mut tx, parent_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("category {parent_id}")))?;
                let last_child = Self::find_last_child_tx(&mut tx, parent_id).await?;
                tree::child_attach_orders(
                    last_child.map(|c| (c.sibling_sort_order, c.tree_sort_order)),
                    parent.tree_sort_order,
                )
            }
            None => (category.sibling_sort_order, category.tree_sort_order),
        };

        sqlx::query(
            "UPDATE categories SET parent_id = $1, sibling_sort_order = $2, \
             tree_sort_order = $3, updated_at = NOW() WHERE id = $4",
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

    /// Move a category one step up or down among its siblings. Reordering
    /// root categories is not supported.
    pub async fn change_sort_order(
        pool: &PgPool,
        id: DbId,
        move_up: bool,
    ) -> Result<bool, DbError> {
        let category = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("category {id}")))?;

        let Some(parent_id) = category.parent_id else {
            tracing::warn!(
                category_id = id,
                "Sort-order changes are not supported for root categories"
            );
            return Ok(false);
        };

        let query = format!(
            "SELECT {COLUMNS} FROM categories WHERE parent_id = $1 \
             ORDER BY sibling_sort_order, id"
        );
        let siblings: Vec<Category> =
            sqlx::query_as(&query).bind(parent_id).fetch_all(pool).await?;
        let Some(index) = siblings.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        let orders: Vec<f64> = siblings.iter().map(|s| s.sibling_sort_order).collect();

        match tree::sibling_sort_for_move(&orders, index, move_up) {
            Some(new_sort) => {
                sqlx::query(
                    "UPDATE categories SET sibling_sort_order = $1, updated_at = NOW() \
                     WHERE id = $2",
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

    /// Recompute lineages across the category forest, persisting only the
    /// changed rows. Idempotent.
    pub async fn update_lineages(pool: &PgPool) -> Result<usize, DbError> {
        let rows = Self::find_all(pool).await?;
        let mut forest = tree::build_forest(rows.iter().map(Category::tree_node).collect());
        let changed = tree::update_lineages(&mut forest);
        if changed.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        for (id, lineage) in &changed {
            sqlx::query("UPDATE categories SET lineage = $1, updated_at = NOW() WHERE id = $2")
                .bind(lineage)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(changed.len())
    }

    /// Recompute the global pre-order `tree_sort_order` across all
    /// categories, gated by the `category_last_update` setting.
    pub async fn recompute_tree_sort_order(pool: &PgPool) -> Result<bool, DbError> {
        let Some(max_updated) = Self::max_updated_at(pool).await? else {
            tracing::debug!("No categories exist, skipping tree sort recomputation");
            return Ok(false);
        };
        if let Some(last_processed) =
            SettingRepo::get_timestamp(pool, SETTING_CATEGORY_LAST_UPDATE).await?
        {
            if max_updated <= last_processed {
                return Ok(false);
            }
        }

        let rows = Self::find_all(pool).await?;
        let mut forest = tree::build_forest(rows.iter().map(Category::tree_node).collect());
        let updated = tree::assign_tree_sort_order(&mut forest);

        if !updated.is_empty() {
            let mut tx = pool.begin().await?;
            for (id, sort_order) in &updated {
                sqlx::query(
                    "UPDATE categories SET tree_sort_order = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(sort_order)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
        }

        SettingRepo::set_timestamp(pool, SETTING_CATEGORY_LAST_UPDATE, max_updated).await?;
        tracing::info!(count = updated.len(), "Recomputed category tree sort order");
        Ok(!updated.is_empty())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn find_by_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<Category>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?)
    }

    async fn find_last_child_tx(
        tx: &mut Transaction<'_, Postgres>,
        parent_id: DbId,
    ) -> Result<Option<Category>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM categories WHERE parent_id = $1 \
             ORDER BY sibling_sort_order DESC, id DESC LIMIT 1"
        );
        Ok(sqlx::query_as(&query)
            .bind(parent_id)
            .fetch_optional(&mut **tx)
            .await?)
    }

    async fn replace_descs_tx(
        tx: &mut Transaction<'_, Postgres>,
        category_id: DbId,
        descs: &[DescInput],
    ) -> Result<Vec<CategoryDesc>, DbError> {
        sqlx::query("DELETE FROM category_descs WHERE category_id = $1")
            .bind(category_id)
            .execute(&mut **tx)
            .await?;

        let mut rows = Vec::with_capacity(descs.len());
        let insert = format!(
            "INSERT INTO category_descs (category_id, lang, name) VALUES ($1, $2, $3) \
             RETURNING {DESC_COLUMNS}"
        );
        for desc in descs {
            let row: CategoryDesc = sqlx::query_as(&insert)
                .bind(category_id)
                .bind(&desc.lang)
                .bind(&desc.name)
                .fetch_one(&mut **tx)
                .await?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Deep comparison deciding whether an update payload is a no-op.
    fn has_changed(existing: &CategoryWithDescs, input: &UpdateCategory) -> bool {
        if let Some(sort) = input.sibling_sort_order {
            if existing.category.sibling_sort_order != sort {
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
