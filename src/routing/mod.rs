//! Waypoint ordering for inspection routes.

pub mod sequencer;

pub use sequencer::{optimize, optimize_route, resequence, tour_length_meters, RouteOptimization};
