/// Heatmap configuration
///
/// Every field has a default, so a partial JSON document (or none at all)
/// is a valid configuration. A few deployment knobs can be overridden from
/// the environment.

use crate::constants::{
    BBOX_PRECISION, DEFAULT_API_HOST, FETCH_TIMEOUT_MS, LOD_MAX_RESOLUTION,
    MASK_CEILING_RESOLUTION, MAX_ZOOM, MIN_ZOOM, US_LOWER48_EAST, US_LOWER48_NORTH,
    US_LOWER48_SOUTH, US_LOWER48_WEST, VIEWPORT_SETTLE_MS,
};
use crate::error::{HeatmapError, Result};
use crate::json_parser::JsonParser;
use crate::lod::{LodSelector, LodStep, default_lod_steps};
use crate::pipeline::Selection;
use crate::region::BoundingBox;
use crate::region_mask::MaskContainment;
use crate::source::HeatmapRequest;
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_API_HOST: &str = "HEATMAP_API_HOST";
pub const ENV_MASK_CEILING: &str = "HEATMAP_MASK_CEILING";
pub const ENV_FETCH_TIMEOUT_MS: &str = "HEATMAP_FETCH_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Backend base URL
    pub api_host: String,
    /// Finest resolution with a directly enumerated region mask
    pub mask_ceiling: u8,
    pub mask_containment: MaskContainment,
    /// Decimals kept from bbox edges in query keys
    pub bbox_precision: u32,
    /// Viewport settle period before a query is issued
    pub debounce_ms: u64,
    pub fetch_timeout_ms: u64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub lod_steps: Vec<LodStep>,
    pub lod_max_resolution: u8,
    /// Outer bounds every query bbox is clamped to
    pub envelope: BoundingBox,
    /// Attach the built-in dataset to failed loads
    pub fallback_enabled: bool,
    pub default_selection: Selection,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            mask_ceiling: MASK_CEILING_RESOLUTION,
            mask_containment: MaskContainment::default(),
            bbox_precision: BBOX_PRECISION,
            debounce_ms: VIEWPORT_SETTLE_MS,
            fetch_timeout_ms: FETCH_TIMEOUT_MS,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            lod_steps: default_lod_steps(),
            lod_max_resolution: LOD_MAX_RESOLUTION,
            envelope: BoundingBox::new(
                US_LOWER48_SOUTH,
                US_LOWER48_WEST,
                US_LOWER48_NORTH,
                US_LOWER48_EAST,
            ),
            fallback_enabled: true,
            default_selection: Selection::default(),
        }
    }
}

impl HeatmapConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value = JsonParser::load_json_str(json)?;
        let config: HeatmapConfig = serde_json::from_value(value)?;
        config.validate().map_err(HeatmapError::Config)?;
        Ok(config)
    }

    /// Load from a JSON file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let value = JsonParser::load_json(path.as_ref())?;
        let config: HeatmapConfig = serde_json::from_value(value)?;
        debug!(path = %path.as_ref().display(), "loaded heatmap config");
        config.with_env_overrides()
    }

    /// Apply `HEATMAP_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (an environment stand-in) and validate.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_API_HOST) {
            self.api_host = host;
        }
        if let Some(raw) = lookup(ENV_MASK_CEILING) {
            self.mask_ceiling = raw.trim().parse().map_err(|_| {
                HeatmapError::Config(format!("{ENV_MASK_CEILING}={raw} is not a resolution"))
            })?;
        }
        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_MS) {
            self.fetch_timeout_ms = raw.trim().parse().map_err(|_| {
                HeatmapError::Config(format!("{ENV_FETCH_TIMEOUT_MS}={raw} is not a number"))
            })?;
        }
        self.validate().map_err(HeatmapError::Config)?;
        Ok(self)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.api_host.trim().is_empty() {
            return Err("api_host must not be empty".to_string());
        }
        if Resolution::try_from(self.mask_ceiling).is_err() {
            return Err(format!("mask_ceiling {} is not a grid resolution", self.mask_ceiling));
        }
        if self.bbox_precision > 10 {
            return Err("bbox_precision must be <= 10".to_string());
        }
        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be > 0".to_string());
        }
        if !(self.min_zoom.is_finite() && self.max_zoom.is_finite()) {
            return Err("min_zoom and max_zoom must be finite".to_string());
        }
        if self.min_zoom > self.max_zoom {
            return Err("min_zoom must be <= max_zoom".to_string());
        }
        if !self.envelope.is_finite() || self.envelope.is_empty() {
            return Err("envelope must be a finite, non-empty box".to_string());
        }
        LodSelector::new(&self.lod_steps, self.lod_max_resolution).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Clamp a viewport zoom into `[min_zoom, max_zoom]`. NaN passes through.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn lod_selector(&self) -> Result<LodSelector> {
        LodSelector::new(&self.lod_steps, self.lod_max_resolution)
    }

    pub fn mask_ceiling_resolution(&self) -> Result<Resolution> {
        Resolution::try_from(self.mask_ceiling).map_err(|_| {
            HeatmapError::Config(format!(
                "mask_ceiling {} is not a grid resolution",
                self.mask_ceiling
            ))
        })
    }

    pub fn endpoint(&self) -> String {
        HeatmapRequest::endpoint(&self.api_host)
    }
}
