use chrono::{Duration, Utc};
use hashbrown::HashSet;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::conflicts::{detect_conflicts, Conflict, ConflictKind};
use super::context::WorkloadContext;
use super::report::{
    AssignmentBatchResult, InspectorLoad, RouteAssignment, UnassignedRoute,
    WorkloadRecommendations,
};
use super::scoring::{score_inspector, AssignmentScore};
use super::AssignmentOptions;
use crate::models::{InspectorId, Route, RouteAction, RouteId, RouteStatus};
use crate::store::{InspectorStore, RouteStore, StoreError, WorkloadStore};

/// Matches pending routes to inspectors.
pub struct AssignmentEngine<'a, S> {
    store: &'a S,
    options: AssignmentOptions,
}

enum Attempt {
    Assigned(RouteAssignment),
    Blocked(UnassignedRoute),
}

impl<'a, S> AssignmentEngine<'a, S>
where
    S: InspectorStore + RouteStore + WorkloadStore,
{
    pub fn new(store: &'a S, options: AssignmentOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &AssignmentOptions {
        &self.options
    }

    /// Assign the given routes, highest priority first.
    ///
    /// Routes that are missing or not pending are skipped. Store failures are
    /// collected in `errors`; assignments made before a failure stay made.
    pub async fn assign_routes(&self, route_ids: &[RouteId]) -> AssignmentBatchResult {
        let started = Instant::now();
        let mut result = AssignmentBatchResult::default();

        let mut routes = Vec::new();
        let mut seen = HashSet::new();
        for &id in route_ids {
            if !seen.insert(id) {
                continue;
            }
            match self.store.find_route(id).await {
                Ok(Some(route)) if route.status == RouteStatus::Pending => routes.push(route),
                Ok(Some(route)) => debug!("Skipping route {}: status {}", id, route.status),
                Ok(None) => debug!("Skipping route {}: not found", id),
                Err(e) => {
                    error!("Failed to load route {}: {}", id, e);
                    result.errors.push(format!("route {}: {}", id, e));
                }
            }
        }

        // Stable: equal priorities keep request order
        routes.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));

        let mut context = match WorkloadContext::load(self.store).await {
            Ok(context) => context,
            Err(e) => {
                error!("Failed to load workload snapshot: {}", e);
                result.errors.push(format!("workload snapshot: {}", e));
                result.elapsed_ms = started.elapsed().as_millis();
                return result;
            }
        };

        for route in routes {
            match self.assign_one(&route, &mut context, &mut result.errors).await {
                Attempt::Assigned(assignment) => result.assignments.push(assignment),
                Attempt::Blocked(unassigned) => result.unassigned.push(unassigned),
            }
        }

        result.summarize(&context);
        result.success = result.errors.is_empty();
        result.elapsed_ms = started.elapsed().as_millis();

        info!(
            "Assigned {} routes, {} unassigned, {} errors in {} ms",
            result.assignments.len(),
            result.unassigned.len(),
            result.errors.len(),
            result.elapsed_ms
        );
        result
    }

    async fn assign_one(
        &self,
        route: &Route,
        context: &mut WorkloadContext,
        errors: &mut Vec<String>,
    ) -> Attempt {
        let mut candidates: Vec<AssignmentScore> = context
            .inspectors()
            .iter()
            .filter_map(|inspector| {
                let metrics = context.metrics(inspector.id)?;
                if metrics.utilization_percentage > self.options.max_utilization_threshold {
                    return None;
                }
                Some(score_inspector(route, inspector, metrics, &self.options))
            })
            .collect();

        if candidates.is_empty() {
            return Attempt::Blocked(UnassignedRoute {
                route_id: route.id,
                route_name: route.name.clone(),
                reason: "no inspector under the utilization threshold".to_string(),
                conflicts: vec![Conflict::new(
                    ConflictKind::NoCandidates,
                    None,
                    format!(
                        "all active inspectors are above {:.0}% utilization",
                        self.options.max_utilization_threshold
                    ),
                    false,
                )],
            });
        }

        candidates.sort_by(|a, b| b.total.total_cmp(&a.total));

        let mut blocking = Vec::new();
        for score in candidates {
            let (Some(inspector), Some(metrics)) = (
                context.inspector(score.inspector_id),
                context.metrics(score.inspector_id),
            ) else {
                continue;
            };

            let conflicts = detect_conflicts(route, inspector, metrics, &self.options);
            if conflicts.iter().any(|c| !c.resolvable) {
                debug!(
                    "Route {}: inspector {} blocked by {} conflict(s)",
                    route.id,
                    inspector.id,
                    conflicts.len()
                );
                blocking.extend(conflicts);
                continue;
            }

            let inspector_id = inspector.id;
            let inspector_name = inspector.name.clone();

            if let Err(e) = self
                .store
                .update_assignment(route.id, RouteStatus::Assigned, Some(inspector_id))
                .await
            {
                error!("Failed to store assignment of route {}: {}", route.id, e);
                errors.push(format!("route {}: {}", route.id, e));
                return Attempt::Blocked(UnassignedRoute {
                    route_id: route.id,
                    route_name: route.name.clone(),
                    reason: "assignment could not be saved".to_string(),
                    conflicts: vec![Conflict::new(
                        ConflictKind::Persistence,
                        Some(inspector_id),
                        e.to_string(),
                        false,
                    )],
                });
            }

            context.record_assignment(inspector_id, route.estimated_duration_minutes);

            let assigned_at = Utc::now();
            debug!(
                "Route {} -> inspector {} (score {:.1})",
                route.id, inspector_id, score.total
            );
            return Attempt::Assigned(RouteAssignment {
                route_id: route.id,
                route_name: route.name.clone(),
                inspector_id,
                inspector_name,
                zone_id: route.zone_id,
                score,
                assigned_at,
                estimated_start: assigned_at,
                estimated_end: assigned_at
                    + Duration::minutes(i64::from(route.estimated_duration_minutes)),
                estimated_duration_minutes: route.estimated_duration_minutes,
                warnings: conflicts,
            });
        }

        warn!(
            "Route {} left unassigned: {} blocking conflict(s)",
            route.id,
            blocking.len()
        );
        Attempt::Blocked(UnassignedRoute {
            route_id: route.id,
            route_name: route.name.clone(),
            reason: "every candidate inspector had a blocking conflict".to_string(),
            conflicts: blocking,
        })
    }

    /// Assign every pending route in the store.
    pub async fn assign_all_pending(&self) -> AssignmentBatchResult {
        match self.store.find_routes_by_status(RouteStatus::Pending).await {
            Ok(routes) => {
                let ids: Vec<RouteId> = routes.iter().map(|r| r.id).collect();
                info!("Assigning {} pending routes", ids.len());
                self.assign_routes(&ids).await
            }
            Err(e) => {
                error!("Failed to list pending routes: {}", e);
                AssignmentBatchResult::failed(format!("pending routes: {}", e))
            }
        }
    }

    /// Return all active routes of an inspector to pending, then assign them again.
    pub async fn reassign_inspector_routes(&self, inspector_id: InspectorId) -> AssignmentBatchResult {
        let routes = match self.store.find_routes_by_inspector(inspector_id).await {
            Ok(routes) => routes,
            Err(e) => {
                error!("Failed to list routes of inspector {}: {}", inspector_id, e);
                return AssignmentBatchResult::failed(format!("inspector {}: {}", inspector_id, e));
            }
        };

        let mut errors = Vec::new();
        let mut released = Vec::new();
        for mut route in routes.into_iter().filter(|r| r.status.is_active()) {
            if let Err(e) = route.unassign() {
                errors.push(e.to_string());
                continue;
            }
            match self
                .store
                .update_assignment(route.id, route.status, route.assigned_inspector_id)
                .await
            {
                Ok(()) => released.push(route.id),
                Err(e) => {
                    error!("Failed to unassign route {}: {}", route.id, e);
                    errors.push(format!("route {}: {}", route.id, e));
                }
            }
        }

        info!(
            "Released {} routes of inspector {} for reassignment",
            released.len(),
            inspector_id
        );

        let mut result = self.assign_routes(&released).await;
        if !errors.is_empty() {
            errors.append(&mut result.errors);
            result.errors = errors;
            result.success = false;
        }
        result
    }

    /// List overloaded and underused inspectors.
    pub async fn recommendations(&self) -> Result<WorkloadRecommendations, StoreError> {
        let context = WorkloadContext::load(self.store).await?;
        let mut report = WorkloadRecommendations::default();

        for inspector in context.inspectors() {
            let Some(metrics) = context.metrics(inspector.id) else {
                continue;
            };
            let load = InspectorLoad {
                inspector_id: inspector.id,
                inspector_name: inspector.name.clone(),
                current_routes: metrics.current_routes,
                max_daily_routes: metrics.max_daily_routes,
                available_capacity: metrics.available_capacity,
                utilization_percentage: metrics.utilization_percentage,
            };

            if metrics.utilization_percentage > 100.0 {
                report.recommendations.push(format!(
                    "{} is over capacity at {:.0}%; move routes to another inspector",
                    inspector.name, metrics.utilization_percentage
                ));
                report.overloaded.push(load);
            } else if metrics.utilization_percentage < 50.0 && metrics.available_capacity > 0 {
                report.recommendations.push(format!(
                    "{} has {} free slot(s) at {:.0}%",
                    inspector.name, metrics.available_capacity, metrics.utilization_percentage
                ));
                report.underutilized.push(load);
            }
        }

        Ok(report)
    }

    /// Load a route, apply a status transition and store it.
    pub async fn transition_route(
        &self,
        route_id: RouteId,
        action: RouteAction,
    ) -> Result<Route, StoreError> {
        let mut route = self
            .store
            .find_route(route_id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "route",
                id: route_id,
            })?;

        route.apply(action)?;
        self.store
            .update_assignment(route.id, route.status, route.assigned_inspector_id)
            .await?;

        info!("Route {} is now {}", route.id, route.status);
        Ok(route)
    }
}
