//! Completeness, accuracy, coverage and overlap checks for extracted zones.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::catalog::ZONE_CATALOG;
use crate::models::{BoundingBox, ZoneDraft};
use crate::pip::geometry::{bounding_box, polygon_area, polygon_valid};

/// Colombia, used when no bounding box is configured
pub const DEFAULT_COUNTRY_BBOX: BoundingBox = BoundingBox {
    min_lat: -4.3,
    min_lon: -79.1,
    max_lat: 13.5,
    max_lon: -66.8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A structured, non-fatal validation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub message: String,
}

impl ValidationFinding {
    fn error(zone: Option<&str>, message: String) -> Self {
        Self {
            severity: Severity::Error,
            zone: zone.map(str::to_string),
            message,
        }
    }

    fn warning(zone: Option<&str>, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            zone: zone.map(str::to_string),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAccuracy {
    pub zone: String,
    pub point_count: usize,
    pub accurate: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_area_m2: f64,
    pub average_area_m2: f64,
    pub smallest_zone: Option<String>,
    pub largest_zone: Option<String>,
}

/// Two zones whose bounding boxes intersect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneOverlap {
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub missing_zones: Vec<String>,
    /// Names present in the input but absent from the catalog
    pub extra_zones: Vec<String>,
    pub accuracy: Vec<ZoneAccuracy>,
    pub coverage: CoverageSummary,
    pub overlaps: Vec<ZoneOverlap>,
    pub findings: Vec<ValidationFinding>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    /// Names of zones that passed the accuracy check
    pub fn accurate_zones(&self) -> HashSet<&str> {
        self.accuracy
            .iter()
            .filter(|a| a.accurate)
            .map(|a| a.zone.as_str())
            .collect()
    }
}

/// Validate a set of extracted zones against the catalog.
pub fn validate_zones(zones: &[ZoneDraft], country: &BoundingBox) -> ValidationReport {
    let mut report = ValidationReport::default();

    if zones.is_empty() {
        report.findings.push(ValidationFinding::error(
            None,
            "no zones to validate".to_string(),
        ));
        report.missing_zones = ZONE_CATALOG.iter().map(|z| z.name.to_string()).collect();
        report
            .recommendations
            .push("Import a KMZ file containing the zone boundaries".to_string());
        return report;
    }

    check_completeness(zones, &mut report);
    check_accuracy(zones, country, &mut report);
    report.coverage = coverage(zones);
    check_overlaps(zones, &mut report);

    let accuracy_failures = report.accuracy.iter().filter(|a| !a.accurate).count();
    report.is_valid = report.missing_zones.is_empty() && accuracy_failures == 0;

    if accuracy_failures > 0 {
        report.recommendations.push(format!(
            "Correct the boundaries of {} zone(s) with accuracy issues",
            accuracy_failures
        ));
    }

    info!(
        "Validated {} zones: valid={} missing={} overlaps={}",
        zones.len(),
        report.is_valid,
        report.missing_zones.len(),
        report.overlaps.len()
    );

    report
}

fn check_completeness(zones: &[ZoneDraft], report: &mut ValidationReport) {
    let found: HashSet<&str> = zones.iter().map(|z| z.name.as_str()).collect();
    let catalog: HashSet<&str> = ZONE_CATALOG.iter().map(|z| z.name).collect();

    for entry in ZONE_CATALOG.iter() {
        if !found.contains(entry.name) {
            report.missing_zones.push(entry.name.to_string());
            report.findings.push(ValidationFinding::error(
                Some(entry.name),
                "zone missing from import".to_string(),
            ));
        }
    }

    for zone in zones {
        if !catalog.contains(zone.name.as_str()) {
            report.extra_zones.push(zone.name.clone());
            report.findings.push(ValidationFinding::warning(
                Some(zone.name.as_str()),
                "zone is not in the catalog".to_string(),
            ));
        }
    }

    if !report.missing_zones.is_empty() {
        report.recommendations.push(format!(
            "Add the missing zones to the KMZ: {}",
            report.missing_zones.join(", ")
        ));
    }
}

fn check_accuracy(zones: &[ZoneDraft], country: &BoundingBox, report: &mut ValidationReport) {
    for zone in zones {
        let points = &zone.boundary.points;
        let mut issues = Vec::new();

        if points.len() < 3 {
            issues.push(format!("boundary has {} points, need at least 3", points.len()));
        }

        let out_of_range = points.iter().filter(|p| !p.is_in_range()).count();
        if out_of_range > 0 {
            issues.push(format!("{} coordinates out of range", out_of_range));
        }

        let outside_country = points.iter().filter(|p| !country.contains(p)).count();
        if outside_country > 0 {
            issues.push(format!(
                "{} coordinates outside the country bounding box",
                outside_country
            ));
        }

        for issue in &issues {
            report
                .findings
                .push(ValidationFinding::error(Some(zone.name.as_str()), issue.clone()));
        }

        if points.len() >= 3 && !polygon_valid(&zone.boundary) {
            report.findings.push(ValidationFinding::warning(
                Some(zone.name.as_str()),
                "boundary self-intersects or has no area".to_string(),
            ));
        }

        report.accuracy.push(ZoneAccuracy {
            zone: zone.name.clone(),
            point_count: points.len(),
            accurate: issues.is_empty(),
            issues,
        });
    }
}

fn coverage(zones: &[ZoneDraft]) -> CoverageSummary {
    let areas: Vec<(f64, &str)> = zones
        .iter()
        .map(|z| (polygon_area(&z.boundary), z.name.as_str()))
        .collect();
    let total: f64 = areas.iter().map(|(a, _)| a).sum();

    CoverageSummary {
        total_area_m2: total,
        average_area_m2: total / areas.len() as f64,
        smallest_zone: areas
            .iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, n)| n.to_string()),
        largest_zone: areas
            .iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, n)| n.to_string()),
    }
}

/// Pairwise bounding-box intersection. Coarse: boxes may touch where polygons do not.
fn check_overlaps(zones: &[ZoneDraft], report: &mut ValidationReport) {
    let boxes: Vec<Option<BoundingBox>> = zones
        .iter()
        .map(|z| bounding_box(&z.boundary.points))
        .collect();

    for i in 0..zones.len() {
        for j in (i + 1)..zones.len() {
            let (Some(a), Some(b)) = (boxes[i], boxes[j]) else {
                continue;
            };
            if a.intersects(&b) {
                report.overlaps.push(ZoneOverlap {
                    first: zones[i].name.clone(),
                    second: zones[j].name.clone(),
                });
                report.findings.push(ValidationFinding::warning(
                    Some(zones[i].name.as_str()),
                    format!("bounding box overlaps {}", zones[j].name),
                ));
            }
        }
    }

    if !report.overlaps.is_empty() {
        report.recommendations.push(format!(
            "Review {} possible zone overlap(s)",
            report.overlaps.len()
        ));
    }
}
