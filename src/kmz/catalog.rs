//! Fixed catalog of service zones and name matching.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::ZoneCategory;

/// Color used when neither the document nor the palette provides one.
pub const FALLBACK_COLOR: &str = "#808080";

/// A catalog zone and its default palette color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogZone {
    pub name: &'static str,
    pub color: &'static str,
}

impl CatalogZone {
    /// Metropolitan when the catalog name says so, rural otherwise.
    pub fn category(&self) -> ZoneCategory {
        if normalize_name(self.name).contains("metropolitan") {
            ZoneCategory::Metropolitan
        } else {
            ZoneCategory::Rural
        }
    }

    pub fn normalized(&self) -> String {
        normalize_name(self.name)
    }
}

pub const ZONE_CATALOG: [CatalogZone; 11] = [
    CatalogZone {
        name: "Zona I - Metropolitana Suroriente",
        color: "#e6194b",
    },
    CatalogZone {
        name: "Zona II - Metropolitana Suroccidente",
        color: "#3cb44b",
    },
    CatalogZone {
        name: "Zona III - Metropolitana Centro",
        color: "#ffe119",
    },
    CatalogZone {
        name: "Zona IV - Metropolitana Nororiente",
        color: "#4363d8",
    },
    CatalogZone {
        name: "Zona V - Metropolitana Noroccidente",
        color: "#f58231",
    },
    CatalogZone {
        name: "Zona VI - Metropolitana Norte",
        color: "#911eb4",
    },
    CatalogZone {
        name: "Zona VII - Rural Sabana Occidente",
        color: "#46f0f0",
    },
    CatalogZone {
        name: "Zona VIII - Rural Sabana Norte",
        color: "#f032e6",
    },
    CatalogZone {
        name: "Zona IX - Rural Oriente",
        color: "#bcf60c",
    },
    CatalogZone {
        name: "Zona X - Rural Sumapaz",
        color: "#008080",
    },
    CatalogZone {
        name: "Zona XI - Rural Tequendama",
        color: "#9a6324",
    },
];

/// Lowercase, strip diacritics, turn punctuation into spaces, collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Match a feature name against the catalog.
///
/// Exact normalized equality wins. Otherwise the first catalog entry where
/// either normalized name contains the other.
pub fn match_catalog(name: &str) -> Option<&'static CatalogZone> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return None;
    }

    if let Some(exact) = ZONE_CATALOG.iter().find(|z| z.normalized() == normalized) {
        return Some(exact);
    }

    ZONE_CATALOG.iter().find(|z| {
        let candidate = z.normalized();
        candidate.contains(&normalized) || normalized.contains(&candidate)
    })
}

/// Default palette color keyed by normalized catalog name.
pub fn palette_color(normalized_name: &str) -> Option<&'static str> {
    ZONE_CATALOG
        .iter()
        .find(|z| z.normalized() == normalized_name)
        .map(|z| z.color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        let metropolitan = ZONE_CATALOG
            .iter()
            .filter(|z| z.category() == ZoneCategory::Metropolitan)
            .count();
        assert_eq!(metropolitan, 6);
        assert_eq!(ZONE_CATALOG.len() - metropolitan, 5);
    }

    #[test]
    fn test_normalize_strips_case_diacritics_punctuation() {
        assert_eq!(
            normalize_name("ZONA I - METROPOLITANA SURORIENTE"),
            "zona i metropolitana suroriente"
        );
        assert_eq!(normalize_name("  Zóna   Ñ,  Bogotá! "), "zona n bogota");
    }

    #[test]
    fn test_match_any_case_and_diacritics() {
        for raw in [
            "ZONA I - METROPOLITANA SURORIENTE",
            "zona i metropolitana suroriente",
            "Zóna I – Metropolitána Suroriente",
        ] {
            let hit = match_catalog(raw).unwrap();
            assert_eq!(hit.name, "Zona I - Metropolitana Suroriente");
            assert_eq!(hit.category(), ZoneCategory::Metropolitan);
        }
    }

    #[test]
    fn test_match_substring_both_directions() {
        // Feature name contains the catalog name
        let hit = match_catalog("Límite Zona X - Rural Sumapaz 2024").unwrap();
        assert_eq!(hit.name, "Zona X - Rural Sumapaz");
        assert_eq!(hit.category(), ZoneCategory::Rural);

        // Catalog name contains the feature name
        let hit = match_catalog("Rural Tequendama").unwrap();
        assert_eq!(hit.name, "Zona XI - Rural Tequendama");
    }

    #[test]
    fn test_exact_match_beats_earlier_substring() {
        // "zona i" would substring-match several entries; exact still wins
        let hit = match_catalog("Zona II - Metropolitana Suroccidente").unwrap();
        assert_eq!(hit.name, "Zona II - Metropolitana Suroccidente");
    }

    #[test]
    fn test_no_match() {
        assert!(match_catalog("Parque Simón Bolívar").is_none());
        assert!(match_catalog("---").is_none());
    }

    #[test]
    fn test_palette_lookup() {
        assert_eq!(
            palette_color("zona iii metropolitana centro"),
            Some("#ffe119")
        );
        assert_eq!(palette_color("unknown"), None);
    }
}
