use serde::Serialize;

use super::AssignmentOptions;
use crate::models::{Inspector, InspectorId, Route, WorkloadMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    CapacityExceeded,
    ZoneMismatch,
    UtilizationExceeded,
    /// Every active inspector was over the utilization threshold
    NoCandidates,
    /// The assignment could not be written
    Persistence,
}

/// Why a route could not go, or went with a caveat, to an inspector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspector_id: Option<InspectorId>,
    pub message: String,
    /// Resolvable conflicts do not block an assignment
    pub resolvable: bool,
}

impl Conflict {
    pub fn new(
        kind: ConflictKind,
        inspector_id: Option<InspectorId>,
        message: String,
        resolvable: bool,
    ) -> Self {
        Self {
            kind,
            inspector_id,
            message,
            resolvable,
        }
    }
}

/// Conflicts of assigning `route` to `inspector` given its current load.
pub fn detect_conflicts(
    route: &Route,
    inspector: &Inspector,
    metrics: &WorkloadMetrics,
    options: &AssignmentOptions,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    if metrics.available_capacity <= 0 {
        conflicts.push(Conflict::new(
            ConflictKind::CapacityExceeded,
            Some(inspector.id),
            format!(
                "{} has no remaining capacity ({}/{} routes)",
                inspector.name, metrics.current_routes, metrics.max_daily_routes
            ),
            false,
        ));
    }

    if let Some(zone_id) = route.zone_id {
        if !inspector.prefers(zone_id) {
            conflicts.push(Conflict::new(
                ConflictKind::ZoneMismatch,
                Some(inspector.id),
                format!("{} does not cover zone {}", inspector.name, zone_id),
                options.allow_cross_zone,
            ));
        }
    }

    let projected = metrics.projected_utilization();
    if projected > options.max_utilization_threshold {
        conflicts.push(Conflict::new(
            ConflictKind::UtilizationExceeded,
            Some(inspector.id),
            format!(
                "{} would reach {:.0}% utilization (threshold {:.0}%)",
                inspector.name, projected, options.max_utilization_threshold
            ),
            true,
        ));
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoutePriority;

    fn kinds(conflicts: &[Conflict]) -> Vec<(ConflictKind, bool)> {
        conflicts.iter().map(|c| (c.kind, c.resolvable)).collect()
    }

    #[test]
    fn test_no_conflicts_for_good_fit() {
        let route = Route::new(1, "R1", RoutePriority::High, Some(5));
        let inspector = Inspector::new(1, "Ana", "CC-1", 4).with_preferred_zone(5);
        let metrics = WorkloadMetrics::from_load(1, 1, 4, 0);
        assert!(detect_conflicts(&route, &inspector, &metrics, &AssignmentOptions::default())
            .is_empty());
    }

    #[test]
    fn test_full_inspector_blocks() {
        let route = Route::new(1, "R1", RoutePriority::High, Some(5));
        let inspector = Inspector::new(1, "Ana", "CC-1", 2).with_preferred_zone(5);
        let metrics = WorkloadMetrics::from_load(1, 2, 2, 0);
        let conflicts = detect_conflicts(&route, &inspector, &metrics, &AssignmentOptions::default());
        assert_eq!(
            kinds(&conflicts),
            vec![
                (ConflictKind::CapacityExceeded, false),
                (ConflictKind::UtilizationExceeded, true)
            ]
        );
    }

    #[test]
    fn test_zone_mismatch_resolvable_only_cross_zone() {
        let route = Route::new(1, "R1", RoutePriority::High, Some(5));
        let inspector = Inspector::new(1, "Ana", "CC-1", 4);
        let metrics = WorkloadMetrics::from_load(1, 0, 4, 0);

        let strict = detect_conflicts(&route, &inspector, &metrics, &AssignmentOptions::default());
        assert_eq!(kinds(&strict), vec![(ConflictKind::ZoneMismatch, false)]);

        let cross = AssignmentOptions {
            allow_cross_zone: true,
            ..Default::default()
        };
        let relaxed = detect_conflicts(&route, &inspector, &metrics, &cross);
        assert_eq!(kinds(&relaxed), vec![(ConflictKind::ZoneMismatch, true)]);
    }

    #[test]
    fn test_route_without_zone_never_mismatches() {
        let route = Route::new(1, "R1", RoutePriority::Low, None);
        let inspector = Inspector::new(1, "Ana", "CC-1", 4);
        let metrics = WorkloadMetrics::from_load(1, 0, 4, 0);
        assert!(detect_conflicts(&route, &inspector, &metrics, &AssignmentOptions::default())
            .is_empty());
    }

    #[test]
    fn test_projected_utilization_warning() {
        let route = Route::new(1, "R1", RoutePriority::Low, None);
        let inspector = Inspector::new(1, "Ana", "CC-1", 4);
        let metrics = WorkloadMetrics::from_load(1, 2, 4, 0);
        let options = AssignmentOptions {
            max_utilization_threshold: 60.0,
            ..Default::default()
        };
        assert_eq!(
            kinds(&detect_conflicts(&route, &inspector, &metrics, &options)),
            vec![(ConflictKind::UtilizationExceeded, true)]
        );
    }
}
