use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::models::{Coordinate, CoordinateId, ZoneId};
use crate::pip::geometry::distance_meters;
use crate::pip::{DetectionMethod, ZoneClassifier};
use crate::store::ZoneStore;

/// Coordinates classified per bulk chunk
pub const BULK_CHUNK_SIZE: usize = 100;

/// Loaded from the `[batch]` config section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub enable_duplicate_detection: bool,
    pub duplicate_threshold_meters: f64,
    pub enable_zone_validation: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            enable_duplicate_detection: true,
            duplicate_threshold_meters: 10.0,
            enable_zone_validation: true,
        }
    }
}

/// Coordinates within the threshold of the first one (the seed)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub seed: CoordinateId,
    /// Seed first, then the others in input order
    pub coordinate_ids: Vec<CoordinateId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedCoordinate {
    /// `zone_id` is backfilled when a zone was detected
    pub coordinate: Coordinate,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub coordinate_id: CoordinateId,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub processed: Vec<ProcessedCoordinate>,
    pub duplicates: Vec<DuplicateGroup>,
    pub zone_map: BTreeMap<CoordinateId, ZoneId>,
    pub errors: Vec<ItemError>,
    pub elapsed_ms: u128,
}

impl BatchResult {
    fn push(&mut self, mut coordinate: Coordinate, zone: Option<(ZoneId, f64)>) {
        let confidence = match zone {
            Some((zone_id, confidence)) => {
                coordinate.zone_id = Some(zone_id);
                self.zone_map.insert(coordinate.id, zone_id);
                confidence
            }
            None => 0.0,
        };
        self.processed.push(ProcessedCoordinate {
            coordinate,
            confidence,
        });
    }

    fn error(&mut self, coordinate_id: CoordinateId, message: String) {
        self.errors.push(ItemError {
            coordinate_id,
            message,
        });
    }
}

/// Runs coordinates through the zone classifier with duplicate grouping.
pub struct BatchProcessor<'a, S> {
    classifier: ZoneClassifier<'a, S>,
}

impl<'a, S: ZoneStore> BatchProcessor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            classifier: ZoneClassifier::new(store),
        }
    }

    pub async fn process(&self, coordinates: Vec<Coordinate>, options: &BatchOptions) -> BatchResult {
        self.process_with_progress(coordinates, options, |_| {}).await
    }

    /// Like `process`, calling `progress` with the number of coordinates done so far.
    ///
    /// Never aborts. Every input coordinate is emitted, with a zone or without.
    pub async fn process_with_progress<F: FnMut(usize)>(
        &self,
        coordinates: Vec<Coordinate>,
        options: &BatchOptions,
        mut progress: F,
    ) -> BatchResult {
        let started = Instant::now();
        let mut result = BatchResult::default();

        if options.enable_duplicate_detection {
            result.duplicates =
                find_duplicate_groups(&coordinates, options.duplicate_threshold_meters);
        }

        let total = coordinates.len();
        for (done, coordinate) in coordinates.into_iter().enumerate() {
            if !options.enable_zone_validation {
                result.push(coordinate, None);
            } else {
                self.classify_into(coordinate, &mut result).await;
            }
            progress(done + 1);
        }

        result.elapsed_ms = started.elapsed().as_millis();
        info!(
            "Processed {} coordinates: {} zoned, {} duplicate groups, {} errors in {} ms",
            total,
            result.zone_map.len(),
            result.duplicates.len(),
            result.errors.len(),
            result.elapsed_ms
        );
        result
    }

    /// Classification only, in chunks of `BULK_CHUNK_SIZE`.
    ///
    /// `on_chunk` receives the running count after each chunk. Results are
    /// the same as `process` with duplicate detection off.
    pub async fn process_bulk<F: FnMut(usize)>(
        &self,
        coordinates: Vec<Coordinate>,
        mut on_chunk: F,
    ) -> BatchResult {
        let started = Instant::now();
        let mut result = BatchResult::default();
        let mut done = 0;

        let mut remaining = coordinates.into_iter().peekable();
        while remaining.peek().is_some() {
            let chunk: Vec<Coordinate> = remaining.by_ref().take(BULK_CHUNK_SIZE).collect();
            done += chunk.len();
            for coordinate in chunk {
                self.classify_into(coordinate, &mut result).await;
            }
            debug!("Bulk classification: {} coordinates done", done);
            on_chunk(done);
        }

        result.elapsed_ms = started.elapsed().as_millis();
        info!(
            "Bulk classified {} coordinates ({} zoned) in {} ms",
            done,
            result.zone_map.len(),
            result.elapsed_ms
        );
        result
    }

    async fn classify_into(&self, coordinate: Coordinate, result: &mut BatchResult) {
        if !coordinate.point.is_in_range() {
            warn!(
                "Coordinate {} out of range: ({}, {})",
                coordinate.id, coordinate.point.lat, coordinate.point.lon
            );
            result.error(
                coordinate.id,
                format!(
                    "coordinates out of range: ({}, {})",
                    coordinate.point.lat, coordinate.point.lon
                ),
            );
            result.push(coordinate, None);
            return;
        }

        let detection = self.classifier.detect(&coordinate.point).await;
        if let DetectionMethod::Failed { reason } = &detection.method {
            result.error(coordinate.id, format!("zone detection failed: {}", reason));
        }

        let zone = detection.zone_id.map(|id| (id, detection.confidence));
        result.push(coordinate, zone);
    }
}

/// Seed-based grouping: each ungrouped coordinate collects every later
/// ungrouped coordinate within `threshold_meters` of it. Not transitive.
pub fn find_duplicate_groups(
    coordinates: &[Coordinate],
    threshold_meters: f64,
) -> Vec<DuplicateGroup> {
    let mut grouped = vec![false; coordinates.len()];
    let mut groups = Vec::new();

    for (i, seed) in coordinates.iter().enumerate() {
        if grouped[i] {
            continue;
        }
        let mut members = vec![seed.id];
        for (j, other) in coordinates.iter().enumerate().skip(i + 1) {
            if !grouped[j] && distance_meters(&seed.point, &other.point) <= threshold_meters {
                grouped[j] = true;
                members.push(other.id);
            }
        }
        if members.len() >= 2 {
            grouped[i] = true;
            groups.push(DuplicateGroup {
                seed: seed.id,
                coordinate_ids: members,
            });
        }
    }

    groups
}
