//! Session configuration
//!
//! Read from an optional JSON file; every field has a default so a partial
//! file (or none at all) is fine.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geo::{BaseMap, GeoTransform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub refresh_interval_ms: u64,
    /// Drawn marker radius in image pixels; also the click hit radius
    pub marker_radius_px: f64,
    pub default_object: Option<String>,
    /// Empty means every object in the catalog
    pub tracked_objects: Vec<String>,
    pub max_element_age_days: f64,
    /// 0 disables the per-query deadline
    pub propagation_timeout_ms: u64,
    pub catalog_max_age_days: f64,
    /// Affine geotransform of the base map; plate carrée when absent
    pub geotransform: Option<GeoTransform>,
    pub map_width: u32,
    pub map_height: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
            marker_radius_px: 5.0,
            default_object: Some("ISS (ZARYA)".to_string()),
            tracked_objects: Vec::new(),
            max_element_age_days: crate::propagation::DEFAULT_MAX_ELEMENT_AGE_DAYS,
            propagation_timeout_ms: 500,
            catalog_max_age_days: 3.0,
            geotransform: None,
            map_width: 2048,
            map_height: 1024,
        }
    }
}

/// Longest refresh interval honored; larger values are clamped to one day
pub const MAX_REFRESH_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

impl SessionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.clamp(1, MAX_REFRESH_INTERVAL_MS))
    }

    pub fn propagation_timeout(&self) -> Option<Duration> {
        (self.propagation_timeout_ms > 0)
            .then(|| Duration::from_millis(self.propagation_timeout_ms))
    }

    /// Base map for an image of the given size
    pub fn base_map_for(&self, width: u32, height: u32) -> BaseMap {
        match self.geotransform {
            Some(transform) => BaseMap::new(width, height, transform),
            None => BaseMap::plate_carree(width, height),
        }
    }

    /// Base map when no image is loaded
    pub fn default_base_map(&self) -> BaseMap {
        self.base_map_for(self.map_width, self.map_height)
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<SessionConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: SessionConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
}
