//! Named setting model.
//!
//! Settings are single named values; the tree-sort recomputation jobs use
//! them to remember the last processed modification timestamp.

use serde::Serialize;
use sqlx::FromRow;

use navwarn_core::types::Timestamp;

/// Gate for the hourly area tree-sort recomputation.
pub const SETTING_AREA_LAST_UPDATE: &str = "area_last_update";

/// Gate for the hourly category tree-sort recomputation.
pub const SETTING_CATEGORY_LAST_UPDATE: &str = "category_last_update";

/// A row from the `settings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: Option<String>,
    pub updated_at: Timestamp,
}
