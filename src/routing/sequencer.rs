//! Greedy nearest-neighbor ordering of route waypoints.

use hashbrown::HashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{Coordinate, CoordinateId, RouteId, RoutePoint};
use crate::pip::geometry::distance_meters;
use crate::store::{RoutePointStore, StoreError};

/// Order `coordinates` into a short open tour.
///
/// Starts at `start` (or the first coordinate) and repeatedly moves to the
/// nearest unvisited coordinate; ties go to the earlier one. A `start` whose
/// id is not among `coordinates` is emitted first as an extra waypoint.
/// Two or fewer coordinates come back unchanged, whatever the `start`.
pub fn optimize(coordinates: &[Coordinate], start: Option<&Coordinate>) -> Vec<Coordinate> {
    if coordinates.len() <= 2 {
        return coordinates.to_vec();
    }

    let mut remaining: Vec<&Coordinate> = coordinates.iter().collect();
    let first = match start {
        Some(s) => match remaining.iter().position(|c| c.id == s.id) {
            Some(i) => remaining.remove(i),
            None => s,
        },
        None => remaining.remove(0),
    };

    let mut tour = Vec::with_capacity(coordinates.len() + 1);
    tour.push(first.clone());
    let mut current = first;

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (i, candidate) in remaining.iter().enumerate() {
            let d = distance_meters(&current.point, &candidate.point);
            // Strict comparison keeps the first of equal candidates
            if d < best_distance {
                best = i;
                best_distance = d;
            }
        }
        current = remaining.remove(best);
        tour.push(current.clone());
    }

    tour
}

/// Length in meters of the open path through `coordinates`, in order.
pub fn tour_length_meters(coordinates: &[Coordinate]) -> f64 {
    coordinates
        .windows(2)
        .map(|pair| distance_meters(&pair[0].point, &pair[1].point))
        .sum()
}

/// Renumber route points to follow `ordered`, as a dense 1..N sequence.
///
/// Points whose coordinate is missing from `ordered` keep their relative
/// order after the sequenced ones.
pub fn resequence(route_points: &[RoutePoint], ordered: &[Coordinate]) -> Vec<RoutePoint> {
    let position: HashMap<CoordinateId, usize> = ordered
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();

    let mut points = route_points.to_vec();
    points.sort_by_key(|p| {
        (
            position.get(&p.coordinate_id).copied().unwrap_or(usize::MAX),
            p.point_order,
        )
    });
    for (i, point) in points.iter_mut().enumerate() {
        point.point_order = i as u32 + 1;
    }
    points
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteOptimization {
    pub route_id: RouteId,
    pub points: Vec<RoutePoint>,
    pub length_before_m: f64,
    pub length_after_m: f64,
}

/// Re-sequence a stored route's points, starting from its current first point.
pub async fn optimize_route<S: RoutePointStore>(
    store: &S,
    route_id: RouteId,
) -> Result<RouteOptimization, StoreError> {
    let points = store.route_points(route_id).await?;

    let mut coordinates = Vec::with_capacity(points.len());
    for point in &points {
        let coordinate = store
            .find_coordinate(point.coordinate_id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "coordinate",
                id: point.coordinate_id,
            })?;
        coordinates.push(coordinate);
    }

    let ordered = optimize(&coordinates, coordinates.first());
    let resequenced = resequence(&points, &ordered);
    store.replace_route_points(route_id, &resequenced).await?;

    let optimization = RouteOptimization {
        route_id,
        points: resequenced,
        length_before_m: tour_length_meters(&coordinates),
        length_after_m: tour_length_meters(&ordered),
    };
    debug!("Route {} points: {:?}", route_id, optimization.points);
    info!(
        "Optimized route {}: {:.0} m -> {:.0} m",
        route_id, optimization.length_before_m, optimization.length_after_m
    );
    Ok(optimization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::store::SledStore;

    fn coord(id: i64, lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(id, GeoPoint::new_unchecked(lat, lon), "test")
    }

    fn ids(coordinates: &[Coordinate]) -> Vec<i64> {
        coordinates.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_single_point_unchanged() {
        let input = vec![coord(1, 4.6, -74.1)];
        assert_eq!(optimize(&input, None), input);
    }

    #[test]
    fn test_two_points_unchanged() {
        let input = vec![coord(1, 4.6, -74.1), coord(2, 4.0, -74.1)];
        assert_eq!(ids(&optimize(&input, None)), vec![1, 2]);
    }

    #[test]
    fn test_short_input_ignores_start() {
        let input = vec![coord(1, 4.6, -74.1), coord(2, 4.0, -74.1)];
        let second = input[1].clone();
        assert_eq!(ids(&optimize(&input, Some(&second))), vec![1, 2]);

        let depot = coord(9, 4.70, -74.1);
        assert_eq!(ids(&optimize(&input, Some(&depot))), vec![1, 2]);
        assert_eq!(ids(&optimize(&input[..1], Some(&depot))), vec![1]);
    }

    #[test]
    fn test_greedy_order() {
        // Points along a line, shuffled
        let input = vec![
            coord(1, 4.60, -74.1),
            coord(4, 4.63, -74.1),
            coord(2, 4.61, -74.1),
            coord(3, 4.62, -74.1),
        ];
        let tour = optimize(&input, None);
        assert_eq!(ids(&tour), vec![1, 2, 3, 4]);
        assert!(tour_length_meters(&tour) < tour_length_meters(&input));
    }

    #[test]
    fn test_start_point_first() {
        let input = vec![
            coord(1, 4.60, -74.1),
            coord(2, 4.61, -74.1),
            coord(3, 4.62, -74.1),
        ];
        let start = input[2].clone();
        assert_eq!(ids(&optimize(&input, Some(&start))), vec![3, 2, 1]);

        // A start outside the list leads the tour
        let depot = coord(9, 4.70, -74.1);
        assert_eq!(ids(&optimize(&input, Some(&depot))), vec![9, 3, 2, 1]);
    }

    #[test]
    fn test_ties_go_to_earlier_point() {
        let input = vec![
            coord(1, 4.6, 0.0),
            coord(2, 4.6, 0.5),
            coord(3, 4.6, -0.5),
        ];
        // 2 and 3 are equidistant from 1
        assert_eq!(ids(&optimize(&input, None)), vec![1, 2, 3]);
    }

    #[test]
    fn test_resequence_dense() {
        let points: Vec<RoutePoint> = [(10, 1), (20, 2), (30, 3), (40, 4)]
            .into_iter()
            .map(|(coordinate_id, point_order)| RoutePoint {
                route_id: 1,
                coordinate_id,
                point_order,
            })
            .collect();
        let ordered = vec![coord(30, 0.0, 0.0), coord(10, 0.0, 0.0), coord(20, 0.0, 0.0)];

        let result = resequence(&points, &ordered);
        let pairs: Vec<_> = result
            .iter()
            .map(|p| (p.coordinate_id, p.point_order))
            .collect();
        assert_eq!(pairs, vec![(30, 1), (10, 2), (20, 3), (40, 4)]);
    }

    #[tokio::test]
    async fn test_optimize_stored_route() {
        let store = SledStore::temporary().unwrap();
        let placed = [(1, 4.60), (3, 4.62), (2, 4.61)];
        for (order, (id, lat)) in placed.iter().enumerate() {
            store.insert_coordinate(&coord(*id, *lat, -74.1)).unwrap();
            store
                .insert_route_point(&RoutePoint {
                    route_id: 7,
                    coordinate_id: *id,
                    point_order: order as u32 + 1,
                })
                .unwrap();
        }

        let result = optimize_route(&store, 7).await.unwrap();
        assert!(result.length_after_m < result.length_before_m);

        let stored: Vec<_> = store
            .route_points(7)
            .await
            .unwrap()
            .iter()
            .map(|p| p.coordinate_id)
            .collect();
        assert_eq!(stored, vec![1, 2, 3]);
    }

    /// Route points held in memory
    struct MemoryPoints {
        coordinates: Vec<Coordinate>,
        points: std::sync::Mutex<Vec<RoutePoint>>,
    }

    impl RoutePointStore for MemoryPoints {
        async fn find_coordinate(
            &self,
            id: CoordinateId,
        ) -> Result<Option<Coordinate>, StoreError> {
            Ok(self.coordinates.iter().find(|c| c.id == id).cloned())
        }

        async fn route_points(&self, route_id: RouteId) -> Result<Vec<RoutePoint>, StoreError> {
            let mut points: Vec<_> = self
                .points
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.route_id == route_id)
                .cloned()
                .collect();
            points.sort_by_key(|p| p.point_order);
            Ok(points)
        }

        async fn replace_route_points(
            &self,
            route_id: RouteId,
            points: &[RoutePoint],
        ) -> Result<(), StoreError> {
            let mut stored = self.points.lock().unwrap();
            stored.retain(|p| p.route_id != route_id);
            stored.extend_from_slice(points);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_optimize_route_any_store() {
        let coordinates = vec![
            coord(1, 4.60, -74.1),
            coord(2, 4.61, -74.1),
            coord(3, 4.62, -74.1),
            coord(4, 4.63, -74.1),
        ];
        let points = [1, 4, 2, 3]
            .into_iter()
            .enumerate()
            .map(|(i, coordinate_id)| RoutePoint {
                route_id: 3,
                coordinate_id,
                point_order: i as u32 + 1,
            })
            .collect();
        let store = MemoryPoints {
            coordinates,
            points: std::sync::Mutex::new(points),
        };

        let result = optimize_route(&store, 3).await.unwrap();
        let order: Vec<_> = result.points.iter().map(|p| p.coordinate_id).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);

        let stored: Vec<_> = store
            .route_points(3)
            .await
            .unwrap()
            .iter()
            .map(|p| (p.coordinate_id, p.point_order))
            .collect();
        assert_eq!(stored, vec![(1, 1), (2, 2), (3, 3), (4, 4)]);
    }

    #[tokio::test]
    async fn test_optimize_missing_coordinate() {
        let store = SledStore::temporary().unwrap();
        store
            .insert_route_point(&RoutePoint {
                route_id: 7,
                coordinate_id: 99,
                point_order: 1,
            })
            .unwrap();
        assert!(matches!(
            optimize_route(&store, 7).await,
            Err(StoreError::NotFound { kind: "coordinate", id: 99 })
        ));
    }
}
