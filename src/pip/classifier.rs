//! Zone classification for a single coordinate.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::geometry::{centroid, distance_meters};
use crate::models::{GeoPoint, ZoneId};
use crate::store::{StoreError, ZoneStore};

/// Beyond this distance from the nearest zone centroid, a point has no zone.
pub const NEAREST_ZONE_MAX_METERS: f64 = 50_000.0;

/// How a detection was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Exact polygon containment
    Contained,
    /// Nearest zone centroid within range
    Nearest { distance_m: f64 },
    /// Nothing within range
    Unmatched,
    /// The zone collaborator failed; degraded to no zone
    Failed { reason: String },
}

/// Outcome of classifying one point. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDetection {
    pub zone_id: Option<ZoneId>,
    pub zone_name: Option<String>,
    /// 0..1
    pub confidence: f64,
    pub method: DetectionMethod,
}

impl ZoneDetection {
    fn none(method: DetectionMethod) -> Self {
        Self {
            zone_id: None,
            zone_name: None,
            confidence: 0.0,
            method,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.method, DetectionMethod::Failed { .. })
    }
}

/// Maps coordinates to the containing or nearest active zone
pub struct ZoneClassifier<'a, S> {
    store: &'a S,
}

impl<'a, S: ZoneStore> ZoneClassifier<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Classify one point. Collaborator failures become `DetectionMethod::Failed`.
    pub async fn detect(&self, point: &GeoPoint) -> ZoneDetection {
        match self.try_detect(point).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!(
                    "Zone detection failed at ({}, {}): {}",
                    point.lat, point.lon, e
                );
                ZoneDetection::none(DetectionMethod::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Classify points one after another, in input order.
    pub async fn detect_many(&self, points: &[GeoPoint]) -> Vec<ZoneDetection> {
        let mut detections = Vec::with_capacity(points.len());
        for point in points {
            detections.push(self.detect(point).await);
        }
        detections
    }

    async fn try_detect(&self, point: &GeoPoint) -> Result<ZoneDetection, StoreError> {
        if let Some(zone) = self
            .store
            .find_zone_containing_point(point.lat, point.lon)
            .await?
        {
            debug!("({}, {}) inside zone {}", point.lat, point.lon, zone.name);
            return Ok(ZoneDetection {
                zone_id: Some(zone.id),
                zone_name: Some(zone.name),
                confidence: 1.0,
                method: DetectionMethod::Contained,
            });
        }

        let zones = self.store.find_all_active().await?;
        let nearest = zones
            .into_iter()
            .filter_map(|zone| {
                let center = centroid(&zone.boundary.points)?;
                Some((distance_meters(point, &center), zone))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((distance_m, zone)) if distance_m < NEAREST_ZONE_MAX_METERS => {
                debug!(
                    "({}, {}) nearest zone {} at {:.0} m",
                    point.lat, point.lon, zone.name, distance_m
                );
                Ok(ZoneDetection {
                    zone_id: Some(zone.id),
                    zone_name: Some(zone.name),
                    confidence: (1.0 - distance_m / NEAREST_ZONE_MAX_METERS).max(0.0),
                    method: DetectionMethod::Nearest { distance_m },
                })
            }
            _ => Ok(ZoneDetection::none(DetectionMethod::Unmatched)),
        }
    }
}
