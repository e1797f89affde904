//! Geometry kernel: pure functions on points and polygon rings.
//!
//! Coordinates are treated as planar (x = lon, y = lat) for containment,
//! area and intersection tests. Distances use the haversine formula.

use geo::{BoundingRect, Coord, LineString};

use crate::models::{BoundingBox, GeoPoint, Polygon};

/// Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Flat meters-per-degree factor used to scale shoelace areas.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Minimum absolute ring area, in degree², for a polygon to be valid.
const MIN_AREA_DEG2: f64 = 1e-10;

const ORIENTATION_EPSILON: f64 = 1e-12;

/// Great-circle distance between two points in meters.
pub fn distance_meters(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    if p1 == p2 {
        return 0.0;
    }

    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let delta_lat = (p2.lat - p1.lat).to_radians();
    let delta_lon = (p2.lon - p1.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Ray-casting parity test. Points exactly on an edge may land either way.
pub fn point_in_polygon(point: &GeoPoint, polygon: &Polygon) -> bool {
    let pts = &polygon.points;
    if pts.len() < 3 {
        return false;
    }

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = pts.len() - 1;

    for i in 0..pts.len() {
        let (xi, yi) = (pts[i].lon, pts[i].lat);
        let (xj, yj) = (pts[j].lon, pts[j].lat);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Signed shoelace area of the ring in degree². Positive for counter-clockwise (lon, lat) order.
pub fn signed_ring_area_deg2(points: &[GeoPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.lon * b.lat - b.lon * a.lat
        })
        .sum();
    twice / 2.0
}

/// Approximate area in m²: |shoelace| scaled by a flat degree size.
pub fn polygon_area(polygon: &Polygon) -> f64 {
    signed_ring_area_deg2(&polygon.points).abs() * METERS_PER_DEGREE * METERS_PER_DEGREE
}

/// Sum of haversine edge lengths around the closed ring, in meters.
pub fn polygon_perimeter(polygon: &Polygon) -> f64 {
    if polygon.points.len() < 2 {
        return 0.0;
    }
    polygon.edges().map(|(a, b)| distance_meters(&a, &b)).sum()
}

/// At least 3 points, non-degenerate area, and no crossing non-adjacent edges.
pub fn polygon_valid(polygon: &Polygon) -> bool {
    let n = polygon.points.len();
    if n < 3 {
        return false;
    }
    if signed_ring_area_deg2(&polygon.points).abs() <= MIN_AREA_DEG2 {
        return false;
    }

    let edges: Vec<(GeoPoint, GeoPoint)> = polygon.edges().collect();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let (p1, q1) = edges[i];
            let (p2, q2) = edges[j];
            if segments_intersect(&p1, &q1, &p2, &q2) {
                return false;
            }
        }
    }

    true
}

/// Arithmetic mean of the points. `None` for an empty slice.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lon) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));
    Some(GeoPoint::new_unchecked(lat / n, lon / n))
}

/// Bounding box of the points. `None` for an empty slice.
pub fn bounding_box(points: &[GeoPoint]) -> Option<BoundingBox> {
    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord { x: p.lon, y: p.lat })
        .collect();
    line.bounding_rect().map(|rect| {
        BoundingBox::new(rect.min().y, rect.min().x, rect.max().y, rect.max().x)
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

fn orientation(p: &GeoPoint, q: &GeoPoint, r: &GeoPoint) -> Orientation {
    let val = (q.lat - p.lat) * (r.lon - q.lon) - (q.lon - p.lon) * (r.lat - q.lat);
    if val.abs() < ORIENTATION_EPSILON {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Whether `q` lies on segment `pr`, given the three are collinear.
fn on_segment(p: &GeoPoint, q: &GeoPoint, r: &GeoPoint) -> bool {
    q.lon <= p.lon.max(r.lon)
        && q.lon >= p.lon.min(r.lon)
        && q.lat <= p.lat.max(r.lat)
        && q.lat >= p.lat.min(r.lat)
}

/// Segment intersection including touching and collinear overlap.
pub fn segments_intersect(p1: &GeoPoint, q1: &GeoPoint, p2: &GeoPoint, q2: &GeoPoint) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(p1, p2, q1))
        || (o2 == Orientation::Collinear && on_segment(p1, q2, q1))
        || (o3 == Orientation::Collinear && on_segment(p2, p1, q2))
        || (o4 == Orientation::Collinear && on_segment(p2, q1, q2))
}
