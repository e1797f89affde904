//! KMZ zone boundary import: archive reading, KML parsing, catalog matching,
//! validation and persistence.

mod archive;
pub mod catalog;
pub mod extractor;
pub mod importer;
mod kml;
pub mod validator;

use thiserror::Error;

pub use catalog::{match_catalog, normalize_name, CatalogZone, ZONE_CATALOG};
pub use extractor::{extract_zones, extract_zones_from_path, ExtractionReport};
pub use importer::{ImportSummary, ZoneImporter};
pub use validator::{
    validate_zones, Severity, ValidationFinding, ValidationReport, DEFAULT_COUNTRY_BBOX,
};

/// Errors that make a whole KMZ unusable
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid KMZ archive: {0}")]
    Archive(String),

    #[error("no KML document found in archive")]
    MissingDocument,

    #[error("invalid KML: {0}")]
    Xml(String),

    #[error("KML document contains no features")]
    NoFeatures,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
