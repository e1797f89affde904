use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::Serialize;

use super::conflicts::Conflict;
use super::context::WorkloadContext;
use super::scoring::AssignmentScore;
use crate::models::{InspectorId, RouteId, ZoneId};

#[derive(Debug, Clone, Serialize)]
pub struct RouteAssignment {
    pub route_id: RouteId,
    pub route_name: String,
    pub inspector_id: InspectorId,
    pub inspector_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    pub score: AssignmentScore,
    pub assigned_at: DateTime<Utc>,
    pub estimated_start: DateTime<Utc>,
    pub estimated_end: DateTime<Utc>,
    pub estimated_duration_minutes: u32,
    /// Resolvable conflicts accepted with this assignment
    pub warnings: Vec<Conflict>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnassignedRoute {
    pub route_id: RouteId,
    pub route_name: String,
    pub reason: String,
    pub conflicts: Vec<Conflict>,
}

/// Batch load per (inspector, zone)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadDistributionEntry {
    pub inspector_id: InspectorId,
    pub inspector_name: String,
    pub zone_id: Option<ZoneId>,
    pub route_count: u32,
    pub total_minutes: u64,
    /// Inspector utilization after the batch
    pub utilization_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentBatchResult {
    pub assignments: Vec<RouteAssignment>,
    pub unassigned: Vec<UnassignedRoute>,
    pub distribution: Vec<WorkloadDistributionEntry>,
    /// Collaborator failures met along the way
    pub errors: Vec<String>,
    pub success: bool,
    pub elapsed_ms: u128,
}

impl AssignmentBatchResult {
    pub(crate) fn failed(message: String) -> Self {
        Self {
            errors: vec![message],
            success: false,
            ..Default::default()
        }
    }

    /// Group the batch's assignments by (inspector, zone), sorted by inspector name.
    pub(crate) fn summarize(&mut self, context: &WorkloadContext) {
        let mut groups: HashMap<(InspectorId, Option<ZoneId>), WorkloadDistributionEntry> =
            HashMap::new();

        for assignment in &self.assignments {
            let entry = groups
                .entry((assignment.inspector_id, assignment.zone_id))
                .or_insert_with(|| WorkloadDistributionEntry {
                    inspector_id: assignment.inspector_id,
                    inspector_name: assignment.inspector_name.clone(),
                    zone_id: assignment.zone_id,
                    route_count: 0,
                    total_minutes: 0,
                    utilization_percentage: context
                        .metrics(assignment.inspector_id)
                        .map_or(0.0, |m| m.utilization_percentage),
                });
            entry.route_count += 1;
            entry.total_minutes += u64::from(assignment.estimated_duration_minutes);
        }

        let mut distribution: Vec<_> = groups.into_values().collect();
        distribution.sort_by(|a, b| {
            a.inspector_name
                .cmp(&b.inspector_name)
                .then(a.inspector_id.cmp(&b.inspector_id))
                .then(a.zone_id.cmp(&b.zone_id))
        });
        self.distribution = distribution;
    }
}

/// One inspector's load, for the recommendation report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectorLoad {
    pub inspector_id: InspectorId,
    pub inspector_name: String,
    pub current_routes: u32,
    pub max_daily_routes: u32,
    pub available_capacity: i64,
    pub utilization_percentage: f64,
}

/// Over- and under-utilized inspectors. Nothing is reassigned automatically.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkloadRecommendations {
    /// Above 100% utilization
    pub overloaded: Vec<InspectorLoad>,
    /// Below 50% utilization with spare capacity
    pub underutilized: Vec<InspectorLoad>,
    pub recommendations: Vec<String>,
}
