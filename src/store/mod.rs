//! Persistence collaborators.
//!
//! The core only talks to storage through these traits. Handles are passed
//! into each component explicitly; nothing here is global.

mod sled_store;

use hashbrown::HashMap;
use thiserror::Error;

use crate::models::{
    Coordinate, CoordinateId, Inspector, InspectorId, Route, RouteId, RoutePoint, RouteStatus,
    TransitionError, WorkloadMetrics, Zone, ZoneDraft,
};

pub use sled_store::SledStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to encode or decode record: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Zone lookup and boundary persistence
#[allow(async_fn_in_trait)]
pub trait ZoneStore {
    /// Spatially indexed exact containment
    async fn find_zone_containing_point(&self, lat: f64, lon: f64)
        -> Result<Option<Zone>, StoreError>;

    async fn find_all_active(&self) -> Result<Vec<Zone>, StoreError>;

    /// Lookup by display name, active or not
    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>, StoreError>;

    async fn create_zone(&self, draft: ZoneDraft) -> Result<Zone, StoreError>;

    async fn update_zone(&self, zone: &Zone) -> Result<(), StoreError>;
}

#[allow(async_fn_in_trait)]
pub trait InspectorStore {
    async fn find_active_inspectors(&self) -> Result<Vec<Inspector>, StoreError>;

    async fn find_inspector(&self, id: InspectorId) -> Result<Option<Inspector>, StoreError>;
}

#[allow(async_fn_in_trait)]
pub trait RouteStore {
    async fn find_route(&self, id: RouteId) -> Result<Option<Route>, StoreError>;

    async fn find_routes_by_status(&self, status: RouteStatus) -> Result<Vec<Route>, StoreError>;

    async fn find_routes_by_inspector(
        &self,
        inspector_id: InspectorId,
    ) -> Result<Vec<Route>, StoreError>;

    /// Persist the status and assignment fields of a route
    async fn update_assignment(
        &self,
        id: RouteId,
        status: RouteStatus,
        inspector_id: Option<InspectorId>,
    ) -> Result<(), StoreError>;
}

/// Ordered waypoints of routes and the coordinates they refer to
#[allow(async_fn_in_trait)]
pub trait RoutePointStore {
    async fn find_coordinate(&self, id: CoordinateId) -> Result<Option<Coordinate>, StoreError>;

    /// Route points of a route in `point_order`
    async fn route_points(&self, route_id: RouteId) -> Result<Vec<RoutePoint>, StoreError>;

    /// Replace all points of a route
    async fn replace_route_points(
        &self,
        route_id: RouteId,
        points: &[RoutePoint],
    ) -> Result<(), StoreError>;
}

#[allow(async_fn_in_trait)]
pub trait WorkloadStore {
    /// Current load of every active inspector, keyed by inspector id
    async fn calculate_all_inspector_workloads(
        &self,
    ) -> Result<HashMap<InspectorId, WorkloadMetrics>, StoreError>;
}
