//! Streaming KML reader for polygon placemarks.

use hashbrown::HashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::ParseError;
use crate::models::GeoPoint;

/// A raw placemark as found in the document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placemark {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Raw text of every outer ring's `<coordinates>`
    pub outer_rings: Vec<String>,
    /// `ExtendedData` entries: Data/value and SchemaData/SimpleData
    pub data: Vec<(String, String)>,
    /// Inline `Style/PolyStyle/color`, KML aabbggrr
    pub poly_color: Option<String>,
    /// `styleUrl` with the leading '#' removed
    pub style_url: Option<String>,
}

/// Placemarks plus shared document-level styles
#[derive(Debug, Clone, Default)]
pub struct KmlDocument {
    pub placemarks: Vec<Placemark>,
    /// Style id -> PolyStyle color (aabbggrr)
    pub styles: HashMap<String, String>,
}

impl KmlDocument {
    /// Poly color of a placemark, inline style first, then the referenced shared style.
    pub fn poly_color_for<'a>(&'a self, placemark: &'a Placemark) -> Option<&'a str> {
        placemark.poly_color.as_deref().or_else(|| {
            placemark
                .style_url
                .as_ref()
                .and_then(|id| self.styles.get(id))
                .map(String::as_str)
        })
    }
}

/// Parse a KML document into placemarks.
pub fn parse_kml(xml: &str) -> Result<KmlDocument, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = KmlDocument::default();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut current: Option<Placemark> = None;
    let mut data_name: Option<String> = None;
    let mut style_id: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = local_name(&e);
                match tag.as_str() {
                    "Placemark" => current = Some(Placemark::default()),
                    "Data" | "SimpleData" => data_name = attribute(&e, "name"),
                    "Style" if current.is_none() => style_id = attribute(&e, "id"),
                    _ => {}
                }
                path.push(tag);
                text.clear();
            }
            Ok(Event::Text(t)) => {
                let chunk = t
                    .unescape()
                    .map_err(|e| ParseError::Xml(e.to_string()))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) => {
                let value = text.trim().to_string();
                text.clear();
                close_element(
                    &path,
                    value,
                    &mut current,
                    &mut doc,
                    &mut data_name,
                    &mut style_id,
                );
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Xml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(doc)
}

fn close_element(
    path: &[String],
    value: String,
    current: &mut Option<Placemark>,
    doc: &mut KmlDocument,
    data_name: &mut Option<String>,
    style_id: &mut Option<String>,
) {
    let Some(tag) = path.last().map(String::as_str) else {
        return;
    };

    if tag == "Placemark" {
        if let Some(done) = current.take() {
            doc.placemarks.push(done);
        }
        return;
    }

    if tag == "Style" {
        *style_id = None;
        return;
    }

    let Some(placemark) = current.as_mut() else {
        // Shared style outside any placemark
        if tail(path, 3) == ["Style", "PolyStyle", "color"] {
            if let Some(id) = style_id.as_ref() {
                doc.styles.insert(id.clone(), value);
            }
        }
        return;
    };

    match tail(path, 2).as_slice() {
        ["Placemark", "name"] => placemark.name = non_empty(value),
        ["Placemark", "description"] => placemark.description = non_empty(value),
        ["Placemark", "styleUrl"] => {
            placemark.style_url = non_empty(value.trim_start_matches('#').to_string())
        }
        ["PolyStyle", "color"] => placemark.poly_color = non_empty(value),
        ["Data", "value"] => {
            if let Some(name) = data_name.take() {
                placemark.data.push((name, value));
            }
        }
        [_, "SimpleData"] => {
            if let Some(name) = data_name.take() {
                placemark.data.push((name, value));
            }
        }
        [_, "coordinates"] => {
            if path.iter().any(|p| p == "outerBoundaryIs") {
                placemark.outer_rings.push(value);
            }
        }
        _ => {}
    }
}

/// Last `n` element names of the path, outermost first
fn tail(path: &[String], n: usize) -> Vec<&str> {
    let start = path.len().saturating_sub(n);
    path[start..].iter().map(String::as_str).collect()
}

/// Parse whitespace-separated `lon,lat[,alt]` tuples.
pub fn parse_coordinates(text: &str) -> Result<Vec<GeoPoint>, String> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let lon = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
            let lat = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
            match (lon, lat) {
                (Some(lon), Some(lat)) => Ok(GeoPoint::new_unchecked(lat, lon)),
                _ => Err(format!("malformed coordinate tuple '{}'", tuple)),
            }
        })
        .collect()
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
