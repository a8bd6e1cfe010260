//! Message entity model and DTOs.
//!
//! Only the slice of the message aggregate the firing-exercise generator
//! needs is modelled: identity, domain/series placement, publication
//! status and dates, chart payloads (geometry, categories, charts) and the
//! JSONB-encoded parts/descriptions. Referenced areas live in the
//! `message_areas` junction so published messages can be searched by area.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use navwarn_core::error::CoreError;
use navwarn_core::firing::FiringInterval;
use navwarn_core::types::{DbId, Timestamp};

/// Message part type holding the exercise time intervals.
pub const PART_TYPE_TIME: &str = "TIME";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Publication status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Draft,
    Published,
    Cancelled,
    Expired,
}

impl MessageStatus {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parse from a string, returning an error for unknown statuses.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "PUBLISHED" => Ok(Self::Published),
            "CANCELLED" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(CoreError::Validation(format!(
                "unknown message status: {s}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// JSONB payloads
// ---------------------------------------------------------------------------

/// Localized description of a message part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePartDesc {
    pub lang: String,
    pub details: String,
}

/// One part of a message body. Firing exercises carry a single TIME part
/// whose event dates are the matched firing periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    pub part_type: String,
    #[serde(default)]
    pub event_dates: Vec<FiringInterval>,
    #[serde(default)]
    pub descs: Vec<MessagePartDesc>,
}

/// Localized message description (title/subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDesc {
    pub lang: String,
    pub title: Option<String>,
    pub subject: Option<String>,
}

// ---------------------------------------------------------------------------
// Rows and DTOs
// ---------------------------------------------------------------------------

/// A row from the `messages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: DbId,
    /// Stable unique identifier used by external collaborators.
    pub uid: String,
    pub domain_id: DbId,
    pub series_id: String,
    pub status: String,
    pub publish_date_from: Option<Timestamp>,
    pub publish_date_to: Option<Timestamp>,
    pub geometry: Option<serde_json::Value>,
    pub categories: Option<serde_json::Value>,
    pub charts: Option<serde_json::Value>,
    pub parts: serde_json::Value,
    pub descs: serde_json::Value,
    pub auto_title: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Message {
    pub fn status(&self) -> Result<MessageStatus, CoreError> {
        MessageStatus::from_str(&self.status)
    }

    /// Decode the JSONB parts column; malformed payloads decode empty.
    pub fn parts(&self) -> Vec<MessagePart> {
        serde_json::from_value(self.parts.clone()).unwrap_or_default()
    }

    /// Decode the JSONB descs column; malformed payloads decode empty.
    pub fn descs(&self) -> Vec<MessageDesc> {
        serde_json::from_value(self.descs.clone()).unwrap_or_default()
    }

    /// All event intervals of the message's TIME parts.
    pub fn event_intervals(&self) -> Vec<FiringInterval> {
        self.parts()
            .into_iter()
            .filter(|p| p.part_type == PART_TYPE_TIME)
            .flat_map(|p| p.event_dates)
            .collect()
    }
}

/// A message enriched with the ids of the areas it references.
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithAreas {
    #[serde(flatten)]
    pub message: Message,
    pub area_ids: Vec<DbId>,
}

/// DTO for creating a new message.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessage {
    pub uid: String,
    pub domain_id: DbId,
    pub series_id: String,
    pub status: MessageStatus,
    pub publish_date_from: Option<Timestamp>,
    pub publish_date_to: Option<Timestamp>,
    pub geometry: Option<serde_json::Value>,
    pub categories: Option<serde_json::Value>,
    pub charts: Option<serde_json::Value>,
    pub parts: Vec<MessagePart>,
    pub descs: Vec<MessageDesc>,
    pub auto_title: bool,
    pub area_ids: Vec<DbId>,
}
