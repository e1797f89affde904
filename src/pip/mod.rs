//! Point-in-Polygon (PIP) zone lookup.
//!
//! Holds the geometry kernel, an R-tree spatial index over zone boundaries,
//! and the classifier that maps a coordinate to its zone.

pub mod classifier;
pub mod geometry;
mod index;

pub use classifier::{DetectionMethod, ZoneClassifier, ZoneDetection, NEAREST_ZONE_MAX_METERS};
pub use index::ZoneSpatialIndex;
