//! Area entity model and DTOs.
//!
//! Areas form the hierarchical sea-area tree: every row carries a
//! `parent_id` back-reference, a fractional sibling sort key, the global
//! pre-order index and a materialized lineage path. Localized names live in
//! `area_descs`, one row per language.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use navwarn_core::tree::TreeNode;
use navwarn_core::types::{DbId, Timestamp};

/// Area type marking tree nodes that carry firing periods.
pub const AREA_TYPE_FIRING: &str = "FIRING_AREA";

/// A row from the `areas` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Area {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub sibling_sort_order: f64,
    pub tree_sort_order: i32,
    pub lineage: Option<String>,
    pub area_type: Option<String>,
    /// GeoJSON geometry payload, when the area is drawn on the chart.
    pub geometry: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Area {
    pub fn is_firing_area(&self) -> bool {
        self.area_type.as_deref() == Some(AREA_TYPE_FIRING)
    }

    /// Snapshot this row as a tree node (children are attached by
    /// `navwarn_core::tree::build_forest`).
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

/// A row from the `area_descs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AreaDesc {
    pub id: DbId,
    pub area_id: DbId,
    pub lang: String,
    pub name: String,
}

/// Localized description input, shared by the area and category DTOs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescInput {
    pub lang: String,
    pub name: String,
}

/// An area enriched with its localized descriptions.
#[derive(Debug, Clone, Serialize)]
pub struct AreaWithDescs {
    #[serde(flatten)]
    pub area: Area,
    pub descs: Vec<AreaDesc>,
}

/// DTO for creating a new area, optionally attached under a parent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateArea {
    pub parent_id: Option<DbId>,
    pub area_type: Option<String>,
    pub geometry: Option<serde_json::Value>,
    /// Only honoured for root areas; children get their key computed from
    /// the current last sibling.
    pub sibling_sort_order: Option<f64>,
    #[serde(default)]
    pub descs: Vec<DescInput>,
}

/// DTO for updating an existing area. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArea {
    pub area_type: Option<String>,
    pub geometry: Option<serde_json::Value>,
    pub sibling_sort_order: Option<f64>,
    pub descs: Option<Vec<DescInput>>,
}
