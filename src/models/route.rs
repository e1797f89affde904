//! Routes, route points and the route status machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::coordinate::CoordinateId;
use super::inspector::InspectorId;
use super::zone::ZoneId;

pub type RouteId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePriority {
    Low,
    Medium,
    High,
}

impl RoutePriority {
    /// Ordering rank used to sort a batch (high first)
    pub fn rank(&self) -> u8 {
        match self {
            RoutePriority::High => 3,
            RoutePriority::Medium => 2,
            RoutePriority::Low => 1,
        }
    }

    /// Score contribution, on the same 0..100 scale as the other factors
    pub fn weight(&self) -> f64 {
        match self {
            RoutePriority::High => 100.0,
            RoutePriority::Medium => 70.0,
            RoutePriority::Low => 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RouteStatus {
    /// Assigned or in progress: counts toward an inspector's load
    pub fn is_active(&self) -> bool {
        matches!(self, RouteStatus::Assigned | RouteStatus::InProgress)
    }
}

impl std::fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RouteStatus::Pending => "pending",
            RouteStatus::Assigned => "assigned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Status transitions a caller may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    Start,
    Finish,
    Cancel,
    Unassign,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route {route_id}: cannot {action} from status {from}")]
pub struct TransitionError {
    pub route_id: RouteId,
    pub action: &'static str,
    pub from: RouteStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub priority: RoutePriority,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,

    pub status: RouteStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_inspector_id: Option<InspectorId>,

    pub estimated_duration_minutes: u32,
}

impl Route {
    pub fn new(id: RouteId, name: &str, priority: RoutePriority, zone_id: Option<ZoneId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            priority,
            zone_id,
            status: RouteStatus::Pending,
            assigned_inspector_id: None,
            estimated_duration_minutes: 0,
        }
    }

    fn reject(&self, action: &'static str) -> TransitionError {
        TransitionError {
            route_id: self.id,
            action,
            from: self.status,
        }
    }

    /// pending -> assigned
    pub fn assign(&mut self, inspector_id: InspectorId) -> Result<(), TransitionError> {
        if self.status != RouteStatus::Pending {
            return Err(self.reject("assign"));
        }
        self.status = RouteStatus::Assigned;
        self.assigned_inspector_id = Some(inspector_id);
        Ok(())
    }

    /// assigned -> in_progress
    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.status != RouteStatus::Assigned {
            return Err(self.reject("start"));
        }
        self.status = RouteStatus::InProgress;
        Ok(())
    }

    /// in_progress -> completed
    pub fn finish(&mut self) -> Result<(), TransitionError> {
        if self.status != RouteStatus::InProgress {
            return Err(self.reject("finish"));
        }
        self.status = RouteStatus::Completed;
        Ok(())
    }

    /// pending -> cancelled
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if self.status != RouteStatus::Pending {
            return Err(self.reject("cancel"));
        }
        self.status = RouteStatus::Cancelled;
        Ok(())
    }

    /// assigned | in_progress -> pending
    pub fn unassign(&mut self) -> Result<(), TransitionError> {
        if !self.status.is_active() {
            return Err(self.reject("unassign"));
        }
        self.status = RouteStatus::Pending;
        self.assigned_inspector_id = None;
        Ok(())
    }

    pub fn apply(&mut self, action: RouteAction) -> Result<(), TransitionError> {
        match action {
            RouteAction::Start => self.start(),
            RouteAction::Finish => self.finish(),
            RouteAction::Cancel => self.cancel(),
            RouteAction::Unassign => self.unassign(),
        }
    }
}

/// A waypoint of a route. `point_order` is dense 1..N within a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub route_id: RouteId,
    pub coordinate_id: CoordinateId,
    pub point_order: u32,
}
