//! Configuration for the viewer engine
//!
//! Everything the coordinate math and tile layers would otherwise read from
//! ambient globals (base scale, tile size, endpoints, retry policy) lives here
//! and is passed down explicitly.

use crate::core::constants::{
    BASE_IMAGE_SCALE, BASE_ZOOM_LEVEL, DEFAULT_PREFETCH, DRAG_UPDATE_THROTTLE, KEYBOARD_PAN_STEP,
    MAX_TILE_LAYERS, MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL, SCALE_EPSILON, TILE_SIZE,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// The pair that anchors zoom levels to a physical scale:
/// `scale = base_scale * 2^(zoom_level - base_zoom_level)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Arcseconds per screen pixel at `base_zoom_level`
    pub base_scale: f64,
    pub base_zoom_level: i32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            base_scale: BASE_IMAGE_SCALE,
            base_zoom_level: BASE_ZOOM_LEVEL,
        }
    }
}

impl ScaleConfig {
    /// Arcseconds per screen pixel at `zoom_level`.
    pub fn image_scale(&self, zoom_level: i32) -> f64 {
        self.base_scale * 2_f64.powi(zoom_level - self.base_zoom_level)
    }

    /// Smallest zoom level whose scale is not finer than `scale`, i.e. the
    /// deepest level at which imagery of that native scale is not enlarged.
    pub fn zoom_level_for_scale(&self, scale: f64) -> i32 {
        let steps = (scale / self.base_scale).log2();
        self.base_zoom_level + (steps - SCALE_EPSILON).ceil() as i32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Base URL answering `action=getTile`
    pub tile_endpoint: String,
    /// Base URL answering `action=getClosestImage`
    pub api_endpoint: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            tile_endpoint: "https://api.helioviewer.org/index.php".to_string(),
            api_endpoint: "https://api.helioviewer.org/index.php".to_string(),
        }
    }
}

/// Retry policy for closest-image metadata queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLoadingConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
}

impl Default for TileLoadingConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            exponential_backoff: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub tile_size: u32,
    /// Extra pixels fetched on every side of the physical viewport
    pub prefetch: u32,
    pub scale: ScaleConfig,
    pub min_zoom_level: i32,
    pub max_zoom_level: i32,
    pub default_zoom_level: i32,
    pub endpoints: Endpoints,
    pub max_tile_layers: usize,
    pub tile_loading: TileLoadingConfig,
    pub drag_throttle: u32,
    pub keyboard_pan_step: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            prefetch: DEFAULT_PREFETCH,
            scale: ScaleConfig::default(),
            min_zoom_level: MIN_ZOOM_LEVEL,
            max_zoom_level: MAX_ZOOM_LEVEL,
            default_zoom_level: BASE_ZOOM_LEVEL,
            endpoints: Endpoints::default(),
            max_tile_layers: MAX_TILE_LAYERS,
            tile_loading: TileLoadingConfig::default(),
            drag_throttle: DRAG_UPDATE_THROTTLE,
            keyboard_pan_step: KEYBOARD_PAN_STEP,
        }
    }
}

impl ViewerConfig {
    /// Deterministic settings for tests: local endpoints, immediate retries,
    /// every drag event applied.
    pub fn for_testing() -> Self {
        Self {
            endpoints: Endpoints {
                tile_endpoint: "http://localhost/tiles".to_string(),
                api_endpoint: "http://localhost/api".to_string(),
            },
            tile_loading: TileLoadingConfig {
                max_retries: 2,
                retry_delay_ms: 0,
                exponential_backoff: false,
            },
            drag_throttle: 1,
            ..Self::default()
        }
    }

    /// Parses a (possibly partial) JSON configuration; missing fields take
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(Error::ParseError("tile_size must be positive".to_string()));
        }
        if self.scale.base_scale <= 0.0 {
            return Err(Error::ParseError("base_scale must be positive".to_string()));
        }
        for endpoint in [&self.endpoints.tile_endpoint, &self.endpoints.api_endpoint] {
            reqwest::Url::parse(endpoint).map_err(|e| {
                Error::ParseError(format!("invalid endpoint {:?}: {}", endpoint, e))
            })?;
        }
        if self.min_zoom_level > self.max_zoom_level {
            return Err(Error::ParseError(format!(
                "min_zoom_level {} exceeds max_zoom_level {}",
                self.min_zoom_level, self.max_zoom_level
            )));
        }
        self.check_zoom(self.default_zoom_level)
    }

    pub fn zoom_in_range(&self, zoom_level: i32) -> bool {
        (self.min_zoom_level..=self.max_zoom_level).contains(&zoom_level)
    }

    pub fn check_zoom(&self, zoom_level: i32) -> Result<()> {
        if self.zoom_in_range(zoom_level) {
            Ok(())
        } else {
            Err(Error::InvalidZoom {
                level: zoom_level,
                min: self.min_zoom_level,
                max: self.max_zoom_level,
            })
        }
    }
}
