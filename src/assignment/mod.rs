//! Route-to-inspector assignment.

mod conflicts;
mod context;
mod engine;
mod report;
mod scoring;

use serde::{Deserialize, Serialize};

pub use conflicts::{detect_conflicts, Conflict, ConflictKind};
pub use context::WorkloadContext;
pub use engine::AssignmentEngine;
pub use report::{
    AssignmentBatchResult, InspectorLoad, RouteAssignment, UnassignedRoute,
    WorkloadDistributionEntry, WorkloadRecommendations,
};
pub use scoring::{score_inspector, AssignmentScore, AVAILABILITY_SCORE, NEUTRAL_SCORE};

/// Loaded from the `[assignment]` config section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentOptions {
    /// Percent. Inspectors above it are not considered.
    pub max_utilization_threshold: f64,
    pub allow_cross_zone: bool,
    pub consider_zone_preference: bool,
    pub consider_workload: bool,
    pub consider_availability: bool,
}

impl Default for AssignmentOptions {
    fn default() -> Self {
        Self {
            max_utilization_threshold: 100.0,
            allow_cross_zone: false,
            consider_zone_preference: true,
            consider_workload: true,
            consider_availability: true,
        }
    }
}
