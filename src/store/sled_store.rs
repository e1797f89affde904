use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use super::{InspectorStore, RoutePointStore, RouteStore, StoreError, WorkloadStore, ZoneStore};
use crate::models::{
    Coordinate, CoordinateId, GeoPoint, Inspector, InspectorId, Route, RouteId, RoutePoint,
    RouteStatus, WorkloadMetrics, Zone, ZoneDraft,
};
use crate::pip::ZoneSpatialIndex;

/// Embedded store keeping each record as JSON in its own sled tree.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    zones: Tree,
    inspectors: Tree,
    routes: Tree,
    route_points: Tree,
    coordinates: Tree,
    /// Rebuilt lazily after any zone write
    zone_index: Arc<RwLock<Option<Arc<ZoneSpatialIndex>>>>,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        info!("Opening store at {}...", path.as_ref().display());
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store that is discarded on drop
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            zones: db.open_tree("zones")?,
            inspectors: db.open_tree("inspectors")?,
            routes: db.open_tree("routes")?,
            route_points: db.open_tree("route_points")?,
            coordinates: db.open_tree("coordinates")?,
            zone_index: Arc::new(RwLock::new(None)),
            db,
        })
    }

    fn next_id(&self) -> Result<i64, StoreError> {
        // generate_id starts at 0
        Ok(self.db.generate_id()? as i64 + 1)
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }

    pub fn insert_inspector(&self, inspector: &Inspector) -> Result<(), StoreError> {
        put(&self.inspectors, inspector.id, inspector)
    }

    pub fn insert_route(&self, route: &Route) -> Result<(), StoreError> {
        put(&self.routes, route.id, route)
    }

    pub fn insert_coordinate(&self, coordinate: &Coordinate) -> Result<(), StoreError> {
        put(&self.coordinates, coordinate.id, coordinate)
    }

    pub fn insert_route_point(&self, point: &RoutePoint) -> Result<(), StoreError> {
        let value = serde_json::to_vec(point)?;
        self.route_points
            .insert(route_point_key(point.route_id, point.point_order), value)?;
        Ok(())
    }

    fn zone_index(&self) -> Result<Arc<ZoneSpatialIndex>, StoreError> {
        {
            let cached = self
                .zone_index
                .read()
                .map_err(|_| StoreError::Backend("zone index lock poisoned".to_string()))?;
            if let Some(index) = cached.as_ref() {
                return Ok(Arc::clone(index));
            }
        }

        let zones: Vec<Zone> = all(&self.zones)?;
        let index = Arc::new(ZoneSpatialIndex::build(zones));
        let mut slot = self
            .zone_index
            .write()
            .map_err(|_| StoreError::Backend("zone index lock poisoned".to_string()))?;
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    fn invalidate_zone_index(&self) {
        if let Ok(mut slot) = self.zone_index.write() {
            *slot = None;
        }
    }
}

impl ZoneStore for SledStore {
    async fn find_zone_containing_point(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Option<Zone>, StoreError> {
        let index = self.zone_index()?;
        let point = GeoPoint::new_unchecked(lat, lon);
        Ok(index.lookup(&point).map(|z| z.as_ref().clone()))
    }

    async fn find_all_active(&self) -> Result<Vec<Zone>, StoreError> {
        let zones: Vec<Zone> = all(&self.zones)?;
        Ok(zones.into_iter().filter(|z| z.active).collect())
    }

    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>, StoreError> {
        let zones: Vec<Zone> = all(&self.zones)?;
        Ok(zones.into_iter().find(|z| z.name == name))
    }

    async fn create_zone(&self, draft: ZoneDraft) -> Result<Zone, StoreError> {
        let zone = Zone::from_draft(self.next_id()?, draft);
        put(&self.zones, zone.id, &zone)?;
        self.invalidate_zone_index();
        debug!("Created zone {} ({})", zone.id, zone.name);
        Ok(zone)
    }

    async fn update_zone(&self, zone: &Zone) -> Result<(), StoreError> {
        if !self.zones.contains_key(zone.id.to_be_bytes())? {
            return Err(StoreError::NotFound {
                kind: "zone",
                id: zone.id,
            });
        }
        put(&self.zones, zone.id, zone)?;
        self.invalidate_zone_index();
        Ok(())
    }
}

impl InspectorStore for SledStore {
    async fn find_active_inspectors(&self) -> Result<Vec<Inspector>, StoreError> {
        let inspectors: Vec<Inspector> = all(&self.inspectors)?;
        Ok(inspectors.into_iter().filter(|i| i.active).collect())
    }

    async fn find_inspector(&self, id: InspectorId) -> Result<Option<Inspector>, StoreError> {
        get(&self.inspectors, id)
    }
}

impl RouteStore for SledStore {
    async fn find_route(&self, id: RouteId) -> Result<Option<Route>, StoreError> {
        get(&self.routes, id)
    }

    async fn find_routes_by_status(&self, status: RouteStatus) -> Result<Vec<Route>, StoreError> {
        let routes: Vec<Route> = all(&self.routes)?;
        Ok(routes.into_iter().filter(|r| r.status == status).collect())
    }

    async fn find_routes_by_inspector(
        &self,
        inspector_id: InspectorId,
    ) -> Result<Vec<Route>, StoreError> {
        let routes: Vec<Route> = all(&self.routes)?;
        Ok(routes
            .into_iter()
            .filter(|r| r.assigned_inspector_id == Some(inspector_id))
            .collect())
    }

    async fn update_assignment(
        &self,
        id: RouteId,
        status: RouteStatus,
        inspector_id: Option<InspectorId>,
    ) -> Result<(), StoreError> {
        let mut route: Route =
            get(&self.routes, id)?.ok_or(StoreError::NotFound { kind: "route", id })?;
        route.status = status;
        route.assigned_inspector_id = inspector_id;
        put(&self.routes, id, &route)
    }
}

impl RoutePointStore for SledStore {
    async fn find_coordinate(&self, id: CoordinateId) -> Result<Option<Coordinate>, StoreError> {
        get(&self.coordinates, id)
    }

    async fn route_points(&self, route_id: RouteId) -> Result<Vec<RoutePoint>, StoreError> {
        self.route_points
            .scan_prefix(route_id.to_be_bytes())
            .values()
            .map(|v| Ok(serde_json::from_slice(&v?)?))
            .collect()
    }

    async fn replace_route_points(
        &self,
        route_id: RouteId,
        points: &[RoutePoint],
    ) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for key in self.route_points.scan_prefix(route_id.to_be_bytes()).keys() {
            batch.remove(key?);
        }
        for point in points {
            batch.insert(
                route_point_key(route_id, point.point_order).to_vec(),
                serde_json::to_vec(point)?,
            );
        }
        self.route_points.apply_batch(batch)?;
        Ok(())
    }
}

impl WorkloadStore for SledStore {
    async fn calculate_all_inspector_workloads(
        &self,
    ) -> Result<HashMap<InspectorId, WorkloadMetrics>, StoreError> {
        let inspectors = self.find_active_inspectors().await?;
        let routes: Vec<Route> = all(&self.routes)?;

        // (route count, total minutes) per inspector
        let mut load: HashMap<InspectorId, (u32, u64)> = HashMap::new();
        for route in routes.iter().filter(|r| r.status.is_active()) {
            if let Some(inspector_id) = route.assigned_inspector_id {
                let entry = load.entry(inspector_id).or_default();
                entry.0 += 1;
                entry.1 += u64::from(route.estimated_duration_minutes);
            }
        }

        Ok(inspectors
            .into_iter()
            .map(|i| {
                let (count, minutes) = load.get(&i.id).copied().unwrap_or_default();
                (
                    i.id,
                    WorkloadMetrics::from_load(i.id, count, i.max_daily_routes, minutes),
                )
            })
            .collect())
    }
}

fn route_point_key(route_id: RouteId, order: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[0..8].copy_from_slice(&route_id.to_be_bytes());
    key[8..12].copy_from_slice(&order.to_be_bytes());
    key
}

fn put<T: Serialize>(tree: &Tree, id: i64, value: &T) -> Result<(), StoreError> {
    tree.insert(id.to_be_bytes(), serde_json::to_vec(value)?)?;
    Ok(())
}

fn get<T: DeserializeOwned>(tree: &Tree, id: i64) -> Result<Option<T>, StoreError> {
    match tree.get(id.to_be_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn all<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StoreError> {
    tree.iter()
        .values()
        .map(|v| Ok(serde_json::from_slice(&v?)?))
        .collect()
}
