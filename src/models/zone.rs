//! Administrative zone types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Polygon;

pub type ZoneId = i64;

/// Zone category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneCategory {
    Metropolitan,
    Rural,
}

impl std::fmt::Display for ZoneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneCategory::Metropolitan => write!(f, "metropolitan"),
            ZoneCategory::Rural => write!(f, "rural"),
        }
    }
}

/// A zone boundary as produced by the extractor, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDraft {
    /// Canonical catalog name
    pub name: String,

    pub category: ZoneCategory,

    pub boundary: Polygon,

    /// Hex color, "#rrggbb"
    pub color: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A persisted zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,

    /// Unique display name
    pub name: String,

    pub category: ZoneCategory,

    pub boundary: Polygon,

    pub color: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Zones are soft-deactivated, never deleted
    pub active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Zone {
    /// Create an active zone from a draft
    pub fn from_draft(id: ZoneId, draft: ZoneDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: draft.name,
            category: draft.category,
            boundary: draft.boundary,
            color: draft.color,
            description: draft.description,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the boundary data from a fresh import and reactivate.
    pub fn apply_draft(&mut self, draft: ZoneDraft) {
        self.category = draft.category;
        self.boundary = draft.boundary;
        self.color = draft.color;
        self.description = draft.description;
        self.active = true;
        self.updated_at = Utc::now();
    }
}
