use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::assignment::AssignmentOptions;
use crate::coordinates::BatchOptions;
use crate::kmz::DEFAULT_COUNTRY_BBOX;
use crate::models::BoundingBox;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub assignment: AssignmentOptions,
    pub validation: ValidationConfig,
    pub batch: BatchOptions,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// sled database directory
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./fieldzone-data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValidationConfig {
    pub country_bbox: BoundingBox,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            country_bbox: DEFAULT_COUNTRY_BBOX,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.store.path, PathBuf::from("./fieldzone-data"));
        assert_eq!(config.server.listen, "0.0.0.0:3000");
        assert_eq!(config.assignment.max_utilization_threshold, 100.0);
        assert!(!config.assignment.allow_cross_zone);
        assert_eq!(config.batch.duplicate_threshold_meters, 10.0);
        assert_eq!(config.validation.country_bbox, DEFAULT_COUNTRY_BBOX);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [store]
            path = "/var/lib/fieldzone"

            [assignment]
            max_utilization_threshold = 80
            allow_cross_zone = true

            [validation]
            country_bbox = { min_lat = 4.0, min_lon = -75.0, max_lat = 5.0, max_lon = -73.0 }

            [batch]
            enable_duplicate_detection = false
            "#,
        )
        .unwrap();

        assert_eq!(config.store.path, PathBuf::from("/var/lib/fieldzone"));
        assert_eq!(config.assignment.max_utilization_threshold, 80.0);
        assert!(config.assignment.allow_cross_zone);
        assert!(config.assignment.consider_workload);
        assert_eq!(config.validation.country_bbox.max_lat, 5.0);
        assert!(!config.batch.enable_duplicate_detection);
        assert!(config.batch.enable_zone_validation);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldzone.toml");
        std::fs::write(&path, "[server]\nlisten = \"127.0.0.1:8080\"\n").unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert!(Config::load_from_file(dir.path().join("missing.toml")).is_err());
    }
}
