use serde::Serialize;

use super::AssignmentOptions;
use crate::models::{Inspector, InspectorId, Route, WorkloadMetrics};

/// Placeholder availability until schedules exist
pub const AVAILABILITY_SCORE: f64 = 80.0;

/// Score of a factor that has been switched off
pub const NEUTRAL_SCORE: f64 = 50.0;

const ZONE_WEIGHT: f64 = 0.4;
const WORKLOAD_WEIGHT: f64 = 0.3;
const AVAILABILITY_WEIGHT: f64 = 0.2;
const PRIORITY_WEIGHT: f64 = 0.1;

/// Weighted fit of one inspector for one route. Factors are 0..100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentScore {
    pub inspector_id: InspectorId,
    pub total: f64,
    pub zone_match: f64,
    pub workload_balance: f64,
    pub availability: f64,
    pub priority_weight: f64,
}

pub fn score_inspector(
    route: &Route,
    inspector: &Inspector,
    metrics: &WorkloadMetrics,
    options: &AssignmentOptions,
) -> AssignmentScore {
    let zone_match = if !options.consider_zone_preference {
        NEUTRAL_SCORE
    } else if route.zone_id.is_some_and(|z| inspector.prefers(z)) {
        100.0
    } else if options.allow_cross_zone {
        30.0
    } else {
        0.0
    };

    let workload_balance = if options.consider_workload {
        (100.0 - metrics.utilization_percentage).max(0.0)
    } else {
        NEUTRAL_SCORE
    };

    let availability = if options.consider_availability {
        AVAILABILITY_SCORE
    } else {
        NEUTRAL_SCORE
    };

    let priority_weight = route.priority.weight();

    AssignmentScore {
        inspector_id: inspector.id,
        total: ZONE_WEIGHT * zone_match
            + WORKLOAD_WEIGHT * workload_balance
            + AVAILABILITY_WEIGHT * availability
            + PRIORITY_WEIGHT * priority_weight,
        zone_match,
        workload_balance,
        availability,
        priority_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoutePriority;

    #[test]
    fn test_weighted_total() {
        let route = Route::new(1, "R1", RoutePriority::High, Some(5));
        let inspector = Inspector::new(1, "Ana", "CC-1", 4).with_preferred_zone(5);
        let metrics = WorkloadMetrics::from_load(1, 1, 4, 0);

        let score = score_inspector(&route, &inspector, &metrics, &AssignmentOptions::default());
        assert_eq!(score.zone_match, 100.0);
        assert_eq!(score.workload_balance, 75.0);
        assert_eq!(score.availability, 80.0);
        assert_eq!(score.priority_weight, 100.0);
        // 40 + 22.5 + 16 + 10
        assert!((score.total - 88.5).abs() < 1e-9);
    }

    #[test]
    fn test_zone_factor_variants() {
        let route = Route::new(1, "R1", RoutePriority::Low, Some(5));
        let inspector = Inspector::new(1, "Ana", "CC-1", 4).with_preferred_zone(6);
        let metrics = WorkloadMetrics::from_load(1, 0, 4, 0);

        let strict = score_inspector(&route, &inspector, &metrics, &AssignmentOptions::default());
        assert_eq!(strict.zone_match, 0.0);

        let cross = AssignmentOptions {
            allow_cross_zone: true,
            ..Default::default()
        };
        assert_eq!(
            score_inspector(&route, &inspector, &metrics, &cross).zone_match,
            30.0
        );

        let ignored = AssignmentOptions {
            consider_zone_preference: false,
            consider_workload: false,
            consider_availability: false,
            ..Default::default()
        };
        let score = score_inspector(&route, &inspector, &metrics, &ignored);
        assert_eq!(score.zone_match, NEUTRAL_SCORE);
        assert_eq!(score.workload_balance, NEUTRAL_SCORE);
        assert_eq!(score.availability, NEUTRAL_SCORE);
        assert_eq!(score.priority_weight, 40.0);
    }

    #[test]
    fn test_overloaded_balance_floors_at_zero() {
        let route = Route::new(1, "R1", RoutePriority::Medium, None);
        let inspector = Inspector::new(1, "Ana", "CC-1", 2);
        let metrics = WorkloadMetrics::from_load(1, 3, 2, 0);
        let score = score_inspector(&route, &inspector, &metrics, &AssignmentOptions::default());
        assert_eq!(score.workload_balance, 0.0);
    }
}
