//! Core data models for zone classification and inspector dispatch.

pub mod coordinate;
pub mod geo;
pub mod inspector;
pub mod route;
pub mod zone;

pub use coordinate::{Coordinate, CoordinateId};
pub use geo::{BoundingBox, CoordinateError, GeoPoint, Polygon};
pub use inspector::{Inspector, InspectorId, WorkloadMetrics};
pub use route::{
    Route, RouteAction, RouteId, RoutePoint, RoutePriority, RouteStatus, TransitionError,
};
pub use zone::{Zone, ZoneCategory, ZoneDraft, ZoneId};
