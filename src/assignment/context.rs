use hashbrown::HashMap;
use tracing::debug;

use crate::models::{Inspector, InspectorId, WorkloadMetrics};
use crate::store::{InspectorStore, StoreError, WorkloadStore};

/// Workload snapshot owned by one assignment batch.
///
/// Loaded once, then advanced locally as routes are assigned. It is never
/// re-read from the store mid-batch.
#[derive(Debug, Clone)]
pub struct WorkloadContext {
    inspectors: Vec<Inspector>,
    metrics: HashMap<InspectorId, WorkloadMetrics>,
}

impl WorkloadContext {
    /// Inspectors missing from `metrics` start with no load.
    pub fn new(inspectors: Vec<Inspector>, mut metrics: HashMap<InspectorId, WorkloadMetrics>) -> Self {
        for inspector in &inspectors {
            metrics.entry(inspector.id).or_insert_with(|| {
                WorkloadMetrics::from_load(inspector.id, 0, inspector.max_daily_routes, 0)
            });
        }
        Self { inspectors, metrics }
    }

    pub async fn load<S: InspectorStore + WorkloadStore>(store: &S) -> Result<Self, StoreError> {
        let inspectors = store.find_active_inspectors().await?;
        let metrics = store.calculate_all_inspector_workloads().await?;
        debug!("Workload snapshot for {} inspectors", inspectors.len());
        Ok(Self::new(inspectors, metrics))
    }

    pub fn inspectors(&self) -> &[Inspector] {
        &self.inspectors
    }

    pub fn inspector(&self, id: InspectorId) -> Option<&Inspector> {
        self.inspectors.iter().find(|i| i.id == id)
    }

    pub fn metrics(&self, id: InspectorId) -> Option<&WorkloadMetrics> {
        self.metrics.get(&id)
    }

    /// Account for one more route on an inspector
    pub fn record_assignment(&mut self, id: InspectorId, minutes: u32) {
        if let Some(metrics) = self.metrics.get_mut(&id) {
            metrics.add_route(minutes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_metrics_default_to_idle() {
        let context = WorkloadContext::new(vec![Inspector::new(1, "Ana", "CC-1", 5)], HashMap::new());
        let metrics = context.metrics(1).unwrap();
        assert_eq!(metrics.current_routes, 0);
        assert_eq!(metrics.available_capacity, 5);
        assert_eq!(metrics.utilization_percentage, 0.0);
    }

    #[test]
    fn test_record_assignment_advances_snapshot() {
        let mut context =
            WorkloadContext::new(vec![Inspector::new(1, "Ana", "CC-1", 2)], HashMap::new());
        context.record_assignment(1, 120);
        context.record_assignment(1, 60);

        let metrics = context.metrics(1).unwrap();
        assert_eq!(metrics.current_routes, 2);
        assert_eq!(metrics.available_capacity, 0);
        assert_eq!(metrics.utilization_percentage, 100.0);
        assert!((metrics.estimated_work_hours - 3.0).abs() < 1e-9);

        // Unknown inspectors are ignored
        context.record_assignment(9, 60);
        assert!(context.metrics(9).is_none());
    }
}
