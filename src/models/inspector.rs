//! Inspectors and their workload snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::zone::ZoneId;

pub type InspectorId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspector {
    pub id: InspectorId,
    pub name: String,

    /// Unique identification (national id, badge number)
    pub identification: String,

    #[serde(default)]
    pub preferred_zones: BTreeSet<ZoneId>,

    /// Always > 0
    pub max_daily_routes: u32,

    pub active: bool,
}

impl Inspector {
    pub fn new(id: InspectorId, name: &str, identification: &str, max_daily_routes: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            identification: identification.to_string(),
            preferred_zones: BTreeSet::new(),
            max_daily_routes: max_daily_routes.max(1),
            active: true,
        }
    }

    pub fn with_preferred_zone(mut self, zone_id: ZoneId) -> Self {
        self.preferred_zones.insert(zone_id);
        self
    }

    pub fn prefers(&self, zone_id: ZoneId) -> bool {
        self.preferred_zones.contains(&zone_id)
    }
}

/// Per-inspector load, as reported by the workload collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMetrics {
    pub inspector_id: InspectorId,
    pub current_routes: u32,
    pub max_daily_routes: u32,
    pub available_capacity: i64,
    pub utilization_percentage: f64,
    pub estimated_work_hours: f64,
}

impl WorkloadMetrics {
    /// Derive metrics from a route count and the summed route minutes.
    pub fn from_load(
        inspector_id: InspectorId,
        current_routes: u32,
        max_daily_routes: u32,
        total_minutes: u64,
    ) -> Self {
        Self {
            inspector_id,
            current_routes,
            max_daily_routes,
            available_capacity: i64::from(max_daily_routes) - i64::from(current_routes),
            utilization_percentage: utilization(current_routes, max_daily_routes),
            estimated_work_hours: total_minutes as f64 / 60.0,
        }
    }

    /// Utilization if one more route were added
    pub fn projected_utilization(&self) -> f64 {
        utilization(self.current_routes + 1, self.max_daily_routes)
    }

    /// Account for one more route of `minutes` duration.
    pub fn add_route(&mut self, minutes: u32) {
        self.current_routes += 1;
        self.available_capacity -= 1;
        self.utilization_percentage = utilization(self.current_routes, self.max_daily_routes);
        self.estimated_work_hours += f64::from(minutes) / 60.0;
    }
}

fn utilization(current: u32, max: u32) -> f64 {
    if max == 0 {
        return 100.0;
    }
    f64::from(current) / f64::from(max) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_route_updates_metrics() {
        let mut metrics = WorkloadMetrics::from_load(1, 1, 4, 60);
        assert_eq!(metrics.utilization_percentage, 25.0);
        assert_eq!(metrics.projected_utilization(), 50.0);

        metrics.add_route(90);
        assert_eq!(metrics.current_routes, 2);
        assert_eq!(metrics.available_capacity, 2);
        assert_eq!(metrics.utilization_percentage, 50.0);
        assert!((metrics.estimated_work_hours - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_is_full() {
        let metrics = WorkloadMetrics::from_load(1, 0, 0, 0);
        assert_eq!(metrics.utilization_percentage, 100.0);
        assert_eq!(metrics.available_capacity, 0);
    }
}
