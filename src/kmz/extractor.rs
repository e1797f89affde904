//! Zone boundary extraction from KMZ archives.

use hashbrown::HashSet;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::archive::read_kml_document;
use super::catalog::{match_catalog, palette_color, FALLBACK_COLOR};
use super::kml::{parse_coordinates, parse_kml, KmlDocument, Placemark};
use super::ParseError;
use crate::models::{GeoPoint, Polygon, ZoneDraft};
use crate::pip::geometry::signed_ring_area_deg2;

/// ExtendedData keys that may carry a zone color, in priority order
const COLOR_KEYS: [&str; 3] = ["fill", "marker-color", "stroke"];

/// Extracted zones plus diagnostics and counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub zones: Vec<ZoneDraft>,
    /// Per-feature problems; they never abort the extraction
    pub errors: Vec<String>,
    pub features_seen: usize,
    pub zones_produced: usize,
    /// Features whose name matched no catalog zone
    pub skipped: usize,
    pub elapsed_ms: u128,
}

/// Extract zone boundaries from a KMZ file on disk
pub fn extract_zones_from_path<P: AsRef<Path>>(path: P) -> Result<ExtractionReport, ParseError> {
    let path = path.as_ref();
    info!("Extracting zone boundaries from: {}", path.display());
    let file = File::open(path)?;
    extract_zones(BufReader::new(file))
}

/// Extract zone boundaries from a KMZ archive.
///
/// Fails only when the archive or its document is unusable, or the document
/// has no placemarks. Problems with individual features land in `errors`.
pub fn extract_zones<R: Read + Seek>(reader: R) -> Result<ExtractionReport, ParseError> {
    let started = Instant::now();

    let xml = read_kml_document(reader)?;
    let doc = parse_kml(&xml)?;
    if doc.placemarks.is_empty() {
        return Err(ParseError::NoFeatures);
    }

    let mut report = ExtractionReport {
        features_seen: doc.placemarks.len(),
        ..Default::default()
    };
    let mut produced: HashSet<&'static str> = HashSet::new();

    for placemark in &doc.placemarks {
        let Some(raw_name) = placemark.name.as_deref() else {
            debug!("Skipping unnamed placemark");
            report.skipped += 1;
            continue;
        };

        let Some(catalog) = match_catalog(raw_name) else {
            debug!("No catalog zone matches '{}'", raw_name);
            report.skipped += 1;
            continue;
        };

        if produced.contains(catalog.name) {
            report.errors.push(format!(
                "'{}': duplicate feature for zone {}",
                raw_name, catalog.name
            ));
            continue;
        }

        let boundary = match largest_ring(placemark) {
            Ok(Some(ring)) => Polygon::from_ring(ring),
            Ok(None) => {
                report
                    .errors
                    .push(format!("'{}': no polygon geometry", raw_name));
                continue;
            }
            Err(e) => {
                report.errors.push(format!("'{}': {}", raw_name, e));
                continue;
            }
        };

        let color = feature_color(&doc, placemark)
            .or_else(|| palette_color(&catalog.normalized()).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_COLOR.to_string());

        debug!(
            "Matched '{}' -> {} ({} points)",
            raw_name,
            catalog.name,
            boundary.len()
        );
        produced.insert(catalog.name);
        report.zones.push(ZoneDraft {
            name: catalog.name.to_string(),
            category: catalog.category(),
            boundary,
            color,
            description: placemark.description.clone(),
        });
    }

    report.zones_produced = report.zones.len();
    report.elapsed_ms = started.elapsed().as_millis();

    if !report.errors.is_empty() {
        warn!("{} features had errors", report.errors.len());
    }
    info!(
        "Extracted {} zones from {} features ({} skipped)",
        report.zones_produced, report.features_seen, report.skipped
    );

    Ok(report)
}

/// The outer ring with the largest shoelace area, for multi-part geometry.
fn largest_ring(placemark: &Placemark) -> Result<Option<Vec<GeoPoint>>, String> {
    let mut best: Option<(f64, Vec<GeoPoint>)> = None;
    for raw in &placemark.outer_rings {
        let ring = parse_coordinates(raw)?;
        let area = signed_ring_area_deg2(&ring).abs();
        if best.as_ref().map_or(true, |(a, _)| area > *a) {
            best = Some((area, ring));
        }
    }
    Ok(best.map(|(_, ring)| ring))
}

/// Color from ExtendedData properties, then from the polygon style.
fn feature_color(doc: &KmlDocument, placemark: &Placemark) -> Option<String> {
    for key in COLOR_KEYS {
        let value = placemark
            .data
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| hex_color(v));
        if value.is_some() {
            return value;
        }
    }
    doc.poly_color_for(placemark).and_then(kml_color)
}

/// "#RRGGBB" or "RRGGBB" -> "#rrggbb"
fn hex_color(value: &str) -> Option<String> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{}", hex.to_ascii_lowercase()))
    } else {
        None
    }
}

/// KML "aabbggrr" -> "#rrggbb"
fn kml_color(value: &str) -> Option<String> {
    let hex = value.trim();
    if hex.len() != 8 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let hex = hex.to_ascii_lowercase();
    Some(format!("#{}{}{}", &hex[6..8], &hex[4..6], &hex[2..4]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ZoneCategory;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    pub(crate) fn kmz(kml: &str) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("doc.kml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(kml.as_bytes()).unwrap();
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    pub(crate) fn placemark(name: &str, extra: &str, rings: &[&str]) -> String {
        let polygons: String = rings
            .iter()
            .map(|r| {
                format!(
                    "<Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></outerBoundaryIs></Polygon>",
                    r
                )
            })
            .collect();
        format!(
            "<Placemark><name>{}</name>{}<MultiGeometry>{}</MultiGeometry></Placemark>",
            name, extra, polygons
        )
    }

    pub(crate) fn document(placemarks: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><kml xmlns="http://www.opengis.net/kml/2.2"><Document>{}</Document></kml>"#,
            placemarks.concat()
        )
    }

    const SMALL: &str = "-74.2,4.5,0 -74.1,4.5,0 -74.1,4.6,0 -74.2,4.5,0";
    const LARGE: &str = "-74.2,4.5,0 -74.0,4.5,0 -74.0,4.7,0 -74.2,4.7,0 -74.2,4.5,0";

    #[test]
    fn test_uppercase_name_normalizes_to_catalog() {
        let doc = document(&[placemark(
            "ZONA I - METROPOLITANA SURORIENTE",
            "",
            &[LARGE],
        )]);
        let report = extract_zones(kmz(&doc)).unwrap();
        assert_eq!(report.zones_produced, 1);
        let zone = &report.zones[0];
        assert_eq!(zone.name, "Zona I - Metropolitana Suroriente");
        assert_eq!(zone.category, ZoneCategory::Metropolitan);
        // Closing vertex dropped
        assert_eq!(zone.boundary.len(), 4);
        // Palette color for zone I
        assert_eq!(zone.color, "#e6194b");
    }

    #[test]
    fn test_largest_ring_selected() {
        let doc = document(&[placemark("Zona IX - Rural Oriente", "", &[SMALL, LARGE])]);
        let report = extract_zones(kmz(&doc)).unwrap();
        assert_eq!(report.zones[0].boundary.len(), 4);
        assert_eq!(report.zones[0].category, ZoneCategory::Rural);
    }

    #[test]
    fn test_color_sources() {
        let doc = document(&[
            placemark(
                "Zona II - Metropolitana Suroccidente",
                r#"<ExtendedData><Data name="fill"><value>#ABCDEF</value></Data></ExtendedData>"#,
                &[LARGE],
            ),
            placemark(
                "Zona III - Metropolitana Centro",
                "<Style><PolyStyle><color>7f0000ff</color></PolyStyle></Style>",
                &[LARGE],
            ),
        ]);
        let report = extract_zones(kmz(&doc)).unwrap();
        assert_eq!(report.zones[0].color, "#abcdef");
        assert_eq!(report.zones[1].color, "#ff0000");
    }

    #[test]
    fn test_unmatched_skipped_and_bad_features_reported() {
        let doc = document(&[
            placemark("Parque Nacional", "", &[LARGE]),
            placemark("Zona IV - Metropolitana Nororiente", "", &["-74.2;4.5"]),
            placemark("Zona V - Metropolitana Noroccidente", "", &[]),
            placemark("Zona VI - Metropolitana Norte", "", &[LARGE]),
            placemark("zona vi metropolitana norte", "", &[LARGE]),
        ]);
        let report = extract_zones(kmz(&doc)).unwrap();
        assert_eq!(report.features_seen, 5);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.zones_produced, 1);
        assert_eq!(report.errors.len(), 3);
    }

    #[test]
    fn test_no_features_is_parse_error() {
        let doc = document(&[]);
        assert!(matches!(
            extract_zones(kmz(&doc)),
            Err(ParseError::NoFeatures)
        ));
    }

    #[test]
    fn test_extract_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zonas.kmz");
        let doc = document(&[placemark("Zona X - Rural Sumapaz", "", &[LARGE])]);
        std::fs::write(&path, kmz(&doc).into_inner()).unwrap();

        let report = extract_zones_from_path(&path).unwrap();
        assert_eq!(report.zones[0].name, "Zona X - Rural Sumapaz");

        assert!(matches!(
            extract_zones_from_path(dir.path().join("missing.kmz")),
            Err(ParseError::Io(_))
        ));
    }
}
