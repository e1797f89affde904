//! Imported coordinates.

use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;
use super::zone::ZoneId;

pub type CoordinateId = i64;

/// A geocoded point imported from an external source.
///
/// Only `zone_id` changes after import, when the classifier backfills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub id: CoordinateId,

    pub point: GeoPoint,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,

    /// Import source tag, e.g. "csv" or "manual"
    pub source: String,
}

impl Coordinate {
    pub fn new(id: CoordinateId, point: GeoPoint, source: &str) -> Self {
        Self {
            id,
            point,
            address: None,
            zone_id: None,
            source: source.to_string(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}
