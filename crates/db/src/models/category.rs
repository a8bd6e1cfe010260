//! Category entity model and DTOs.
//!
//! Categories are the second tree hierarchy of the system and share the
//! areas' node shape (parent link, sibling sort key, pre-order index,
//! lineage) without the geometry/type payload.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use navwarn_core::tree::TreeNode;
use navwarn_core::types::{DbId, Timestamp};

use super::area::DescInput;

/// A row from the `categories` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub sibling_sort_order: f64,
    pub tree_sort_order: i32,
    pub lineage: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Category {
    pub fn tree_node(&self) -> TreeNode {
        TreeNode {
            id: self.id,
            parent_id: self.parent_id,
            sibling_sort_order: self.sibling_sort_order,
            tree_sort_order: self.tree_sort_order,
            lineage: self.lineage.clone(),
            children: Vec::new(),
        }
    }
}

/// A row from the `category_descs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CategoryDesc {
    pub id: DbId,
    pub category_id: DbId,
    pub lang: String,
    pub name: String,
}

/// A category enriched with its localized descriptions.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithDescs {
    #[serde(flatten)]
    pub category: Category,
    pub descs: Vec<CategoryDesc>,
}

/// DTO for creating a new category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCategory {
    pub parent_id: Option<DbId>,
    pub sibling_sort_order: Option<f64>,
    #[serde(default)]
    pub descs: Vec<DescInput>,
}

/// DTO for updating an existing category. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategory {
    pub sibling_sort_order: Option<f64>,
    pub descs: Option<Vec<DescInput>>,
}
