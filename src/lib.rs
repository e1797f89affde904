//! Fieldzone - zone classification and inspector dispatch for field inspections
//!
//! This library provides shared types and modules for the `zones` and
//! `dispatch` binaries.

pub mod assignment;
pub mod config;
pub mod coordinates;
pub mod kmz;
pub mod models;
pub mod pip;
pub mod routing;
pub mod store;

pub use models::{Coordinate, GeoPoint, Inspector, Polygon, Route, Zone};
