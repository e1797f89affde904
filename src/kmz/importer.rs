use hashbrown::HashSet;
use serde::Serialize;
use std::io::{Read, Seek};
use tracing::{error, info, warn};

use super::extractor::extract_zones;
use super::validator::{validate_zones, ValidationReport};
use super::ParseError;
use crate::models::BoundingBox;
use crate::store::ZoneStore;

/// Outcome of one import run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deactivated: Vec<String>,
    /// Zones left out because their boundary failed the accuracy check
    pub rejected: Vec<String>,
    pub errors: Vec<String>,
    /// Non-fatal notes, such as a skipped deactivation
    pub warnings: Vec<String>,
    pub validation: ValidationReport,
    pub success: bool,
}

/// Extracts, validates and persists zone boundaries.
pub struct ZoneImporter<'a, S> {
    store: &'a S,
    country: BoundingBox,
}

impl<'a, S: ZoneStore> ZoneImporter<'a, S> {
    pub fn new(store: &'a S, country: BoundingBox) -> Self {
        Self { store, country }
    }

    /// Import a KMZ archive.
    ///
    /// Only a `ParseError` aborts. Store failures are collected and the zones
    /// written before them stay written. Active zones absent from the archive
    /// are deactivated only when it holds the whole catalog.
    pub async fn import<R: Read + Seek>(&self, reader: R) -> Result<ImportSummary, ParseError> {
        let extraction = extract_zones(reader)?;
        let validation = validate_zones(&extraction.zones, &self.country);
        let accurate: HashSet<String> = validation
            .accurate_zones()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut summary = ImportSummary {
            errors: extraction.errors.clone(),
            ..Default::default()
        };

        for draft in extraction.zones {
            if !accurate.contains(&draft.name) {
                warn!("Not importing {}: boundary failed validation", draft.name);
                summary.rejected.push(draft.name);
                continue;
            }

            let name = draft.name.clone();
            let existing = match self.store.find_zone_by_name(&name).await {
                Ok(existing) => existing,
                Err(e) => {
                    error!("Failed to look up zone {}: {}", name, e);
                    summary.errors.push(format!("{}: {}", name, e));
                    continue;
                }
            };

            let result = match existing {
                Some(mut zone) => {
                    zone.apply_draft(draft);
                    self.store
                        .update_zone(&zone)
                        .await
                        .map(|_| summary.updated.push(name.clone()))
                }
                None => self
                    .store
                    .create_zone(draft)
                    .await
                    .map(|_| summary.created.push(name.clone())),
            };

            if let Err(e) = result {
                error!("Failed to store zone {}: {}", name, e);
                summary.errors.push(format!("{}: {}", name, e));
            }
        }

        if summary.created.is_empty() && summary.updated.is_empty() {
            warn!("No catalog zone was imported, existing zones left active");
            summary
                .errors
                .push("no catalog zone imported; existing zones left active".to_string());
        } else if !validation.missing_zones.is_empty() {
            warn!(
                "Partial import ({} catalog zones missing), existing zones left active",
                validation.missing_zones.len()
            );
            summary.warnings.push(format!(
                "partial import, {} catalog zones missing; existing zones left active",
                validation.missing_zones.len()
            ));
        } else {
            self.deactivate_missing(&validation, &mut summary).await;
        }

        summary.success = summary.errors.is_empty();
        summary.validation = validation;

        info!(
            "Import finished: {} created, {} updated, {} deactivated, {} rejected, {} errors",
            summary.created.len(),
            summary.updated.len(),
            summary.deactivated.len(),
            summary.rejected.len(),
            summary.errors.len()
        );

        Ok(summary)
    }

    /// Soft-delete active zones that the import no longer contains.
    async fn deactivate_missing(&self, validation: &ValidationReport, summary: &mut ImportSummary) {
        let imported: HashSet<&str> = validation
            .accuracy
            .iter()
            .map(|a| a.zone.as_str())
            .collect();

        let active = match self.store.find_all_active().await {
            Ok(zones) => zones,
            Err(e) => {
                error!("Failed to list active zones: {}", e);
                summary.errors.push(format!("listing active zones: {}", e));
                return;
            }
        };

        for mut zone in active {
            if imported.contains(zone.name.as_str()) {
                continue;
            }
            zone.active = false;
            zone.updated_at = chrono::Utc::now();
            match self.store.update_zone(&zone).await {
                Ok(()) => summary.deactivated.push(zone.name),
                Err(e) => {
                    error!("Failed to deactivate zone {}: {}", zone.name, e);
                    summary.errors.push(format!("{}: {}", zone.name, e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmz::extractor::tests::{document, kmz, placemark};
    use crate::kmz::catalog::ZONE_CATALOG;
    use crate::kmz::validator::DEFAULT_COUNTRY_BBOX;
    use crate::models::{GeoPoint, Polygon, ZoneCategory, ZoneDraft};
    use crate::store::SledStore;

    const CENTRO: &str = "-74.2,4.5,0 -74.0,4.5,0 -74.0,4.7,0 -74.2,4.7,0 -74.2,4.5,0";
    const NORTE: &str = "-74.1,4.8,0 -73.9,4.8,0 -73.9,4.9,0 -74.1,4.9,0";
    const MADRID: &str = "-3.8,40.3,0 -3.6,40.3,0 -3.6,40.5,0";

    /// One small square per catalog zone, none overlapping
    fn full_catalog() -> Vec<String> {
        ZONE_CATALOG
            .iter()
            .enumerate()
            .map(|(i, z)| {
                let (lat, lon) = (4.0 + 0.2 * i as f64, -74.5);
                let ring = format!(
                    "{lon},{lat},0 {lon},{top},0 {right},{top},0 {right},{lat},0 {lon},{lat},0",
                    lon = lon,
                    lat = lat,
                    top = lat + 0.1,
                    right = lon + 0.1
                );
                placemark(z.name, "", &[ring.as_str()])
            })
            .collect()
    }

    #[tokio::test]
    async fn test_import_creates_then_updates() {
        let store = SledStore::temporary().unwrap();
        let importer = ZoneImporter::new(&store, DEFAULT_COUNTRY_BBOX);

        let first = document(&[
            placemark("Zona III - Metropolitana Centro", "", &[CENTRO]),
            placemark("Zona VI - Metropolitana Norte", "", &[NORTE]),
        ]);
        let summary = importer.import(kmz(&first)).await.unwrap();
        assert!(summary.success);
        assert_eq!(summary.created.len(), 2);
        assert!(!summary.validation.is_valid);
        assert_eq!(store.find_all_active().await.unwrap().len(), 2);

        // A partial archive updates what it carries and leaves the rest alone
        let second = document(&[placemark("Zona III - Metropolitana Centro", "", &[CENTRO])]);
        let summary = importer.import(kmz(&second)).await.unwrap();
        assert!(summary.success, "{:?}", summary.errors);
        assert_eq!(summary.updated, vec!["Zona III - Metropolitana Centro"]);
        assert!(summary.deactivated.is_empty());
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(store.find_all_active().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unrelated_placemarks_leave_zones_active() {
        let store = SledStore::temporary().unwrap();
        let importer = ZoneImporter::new(&store, DEFAULT_COUNTRY_BBOX);

        let first = document(&[placemark("Zona III - Metropolitana Centro", "", &[CENTRO])]);
        importer.import(kmz(&first)).await.unwrap();

        let unrelated = document(&[placemark("Parque Simon Bolivar", "", &[CENTRO])]);
        let summary = importer.import(kmz(&unrelated)).await.unwrap();
        assert!(!summary.success);
        assert!(summary.created.is_empty() && summary.updated.is_empty());
        assert!(summary.deactivated.is_empty());
        assert_eq!(summary.errors.len(), 1);

        let active = store.find_all_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Zona III - Metropolitana Centro");
    }

    #[tokio::test]
    async fn test_complete_import_deactivates_stale_zones() {
        let store = SledStore::temporary().unwrap();
        let pt = GeoPoint::new_unchecked;
        store
            .create_zone(ZoneDraft {
                name: "Zona Antigua".to_string(),
                category: ZoneCategory::Rural,
                boundary: Polygon::new(vec![
                    pt(2.0, -75.0),
                    pt(2.1, -75.0),
                    pt(2.1, -74.9),
                    pt(2.0, -74.9),
                ]),
                color: "#808080".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let importer = ZoneImporter::new(&store, DEFAULT_COUNTRY_BBOX);
        let summary = importer.import(kmz(&document(&full_catalog()))).await.unwrap();
        assert!(summary.success, "{:?}", summary.errors);
        assert!(summary.validation.missing_zones.is_empty());
        assert_eq!(summary.created.len(), 11);
        assert_eq!(summary.deactivated, vec!["Zona Antigua"]);
        assert!(summary.warnings.is_empty());

        // Deactivated zones are kept, not deleted
        let antigua = store
            .find_zone_by_name("Zona Antigua")
            .await
            .unwrap()
            .unwrap();
        assert!(!antigua.active);
        assert_eq!(store.find_all_active().await.unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_inaccurate_zone_rejected() {
        let store = SledStore::temporary().unwrap();
        let importer = ZoneImporter::new(&store, DEFAULT_COUNTRY_BBOX);

        let doc = document(&[
            placemark("Zona III - Metropolitana Centro", "", &[CENTRO]),
            placemark("Zona X - Rural Sumapaz", "", &[MADRID]),
        ]);
        let summary = importer.import(kmz(&doc)).await.unwrap();
        assert_eq!(summary.created, vec!["Zona III - Metropolitana Centro"]);
        assert_eq!(summary.rejected, vec!["Zona X - Rural Sumapaz"]);
        assert!(store
            .find_zone_by_name("Zona X - Rural Sumapaz")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_parse_error_aborts() {
        let store = SledStore::temporary().unwrap();
        let importer = ZoneImporter::new(&store, DEFAULT_COUNTRY_BBOX);
        let result = importer.import(kmz(&document(&[]))).await;
        assert!(matches!(result, Err(ParseError::NoFeatures)));
    }
}
