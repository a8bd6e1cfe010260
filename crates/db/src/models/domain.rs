//! Publishing domain model and DTOs.
//!
//! A domain scopes what its editors see and publish. Its visible area set
//! is defined by linked area subtrees; a domain with no linked areas sees
//! everything.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use navwarn_core::types::{DbId, Timestamp};

/// A row from the `domains` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Domain {
    pub id: DbId,
    /// Stable external key, e.g. `"niord-nw"`.
    pub domain_key: String,
    pub name: String,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new domain.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDomain {
    pub domain_key: String,
    pub name: String,
    pub active: Option<bool>,
    /// Root area ids whose subtrees are visible to the domain.
    #[serde(default)]
    pub area_ids: Vec<DbId>,
}
