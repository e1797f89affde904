//! Spatial index for fast zone containment lookups.

use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use super::geometry::{bounding_box, point_in_polygon, polygon_area};
use crate::models::{GeoPoint, Zone};

/// Wrapper for R-tree indexing of zones
#[derive(Clone)]
pub struct IndexedZone {
    pub zone: Arc<Zone>,
    area_m2: f64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedZone {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedZone {
    pub fn new(zone: Zone) -> Option<Self> {
        let bbox = bounding_box(&zone.boundary.points)?;
        Some(Self {
            area_m2: polygon_area(&zone.boundary),
            zone: Arc::new(zone),
            envelope: AABB::from_corners(
                [bbox.min_lon, bbox.min_lat],
                [bbox.max_lon, bbox.max_lat],
            ),
        })
    }
}

/// Spatial index over active zone boundaries using an R-tree
pub struct ZoneSpatialIndex {
    tree: RTree<IndexedZone>,
}

impl ZoneSpatialIndex {
    /// Build the index. Inactive zones and zones without a boundary are left out.
    pub fn build(zones: Vec<Zone>) -> Self {
        let indexed: Vec<IndexedZone> = zones
            .into_iter()
            .filter(|z| z.active)
            .filter_map(IndexedZone::new)
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Zone spatial index built with {} entries", tree.size());

        Self { tree }
    }

    /// Find the zone containing a point.
    ///
    /// Envelope candidates are refined with the ray-casting test. When zones
    /// overlap, the smallest one wins.
    pub fn lookup(&self, point: &GeoPoint) -> Option<Arc<Zone>> {
        let query_envelope = AABB::from_point([point.lon, point.lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|iz| point_in_polygon(point, &iz.zone.boundary))
            .min_by(|a, b| a.area_m2.total_cmp(&b.area_m2))
            .map(|iz| Arc::clone(&iz.zone))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Iterate over all indexed zones
    pub fn zones(&self) -> impl Iterator<Item = &Arc<Zone>> {
        self.tree.iter().map(|iz| &iz.zone)
    }
}
