//! Persisted view state.
//!
//! The hosting application owns the actual key-value store (cookies, local
//! storage, a file); the viewer only reads and writes two keys through
//! [`SettingsStore`].

use crate::layers::tile::{ImageSource, TileLayerOptions};
use crate::prelude::HashMap;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ZOOM_LEVEL_KEY: &str = "zoomLevel";
pub const TILE_LAYERS_KEY: &str = "tileLayers";

pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

/// In-memory store; what tests and headless hosts use.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<String, Value>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

fn default_visible() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

fn default_opacity_group() -> u32 {
    1
}

/// Enough to rebuild one tile layer after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    #[serde(flatten)]
    pub source: ImageSource,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Fraction in `[0, 1]`
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_opacity_group")]
    pub opacity_group: u32,
}

impl LayerDescriptor {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            visible: true,
            opacity: 1.0,
            opacity_group: default_opacity_group(),
        }
    }

    pub fn options(&self) -> TileLayerOptions {
        TileLayerOptions {
            opacity: self.opacity,
            visible: self.visible,
            opacity_group: self.opacity_group,
            ..TileLayerOptions::default()
        }
    }

    /// Parses `observatory,instrument,detector,measurement[,visible[,opacity]]`
    /// where `visible` is `1`/`0` and `opacity` a percentage.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() < 4 {
            return Err(Error::ParseError(format!("not a layer: {:?}", s)));
        }
        let source: ImageSource = parts[..4].join(",").parse()?;

        let visible = match parts.get(4) {
            None => true,
            Some(flag) => flag
                .parse::<i32>()
                .map(|flag| flag != 0)
                .map_err(|_| Error::ParseError(format!("bad visibility {:?} in {:?}", flag, s)))?,
        };
        let opacity = match parts.get(5) {
            None => 1.0,
            Some(percent) => {
                let percent = percent
                    .parse::<f32>()
                    .map_err(|_| Error::ParseError(format!("bad opacity {:?} in {:?}", percent, s)))?;
                (percent / 100.0).clamp(0.0, 1.0)
            }
        };

        Ok(Self {
            source,
            visible,
            opacity,
            opacity_group: default_opacity_group(),
        })
    }
}

impl std::fmt::Display for LayerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.source,
            if self.visible { 1 } else { 0 },
            (self.opacity * 100.0).round() as i32
        )
    }
}

/// Parses the compact list form `[SOHO,EIT,EIT,171,1,100],[...]`.
pub fn parse_layer_list(s: &str) -> Result<Vec<LayerDescriptor>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }
    let inner = s
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| Error::ParseError(format!("layer list must be bracketed: {:?}", s)))?;

    inner.split("],[").map(LayerDescriptor::parse).collect()
}

pub fn serialize_layer_list(layers: &[LayerDescriptor]) -> String {
    layers
        .iter()
        .map(|layer| format!("[{}]", layer))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn load_zoom_level(store: &dyn SettingsStore) -> Option<i32> {
    store
        .get(ZOOM_LEVEL_KEY)
        .and_then(|value| value.as_i64())
        .map(|level| level as i32)
}

pub fn save_zoom_level(store: &mut dyn SettingsStore, zoom_level: i32) -> Result<()> {
    store.set(ZOOM_LEVEL_KEY, Value::from(zoom_level))
}

/// Stored layers, accepting either a JSON array of descriptors or the
/// compact string form.
pub fn load_layers(store: &dyn SettingsStore) -> Result<Vec<LayerDescriptor>> {
    match store.get(TILE_LAYERS_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(compact)) => parse_layer_list(&compact),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| Error::Settings(format!("{}: {}", TILE_LAYERS_KEY, e))),
    }
}

pub fn save_layers(store: &mut dyn SettingsStore, layers: &[LayerDescriptor]) -> Result<()> {
    store.set(TILE_LAYERS_KEY, serde_json::to_value(layers)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_layer_list() {
        let layers = parse_layer_list("[SOHO,EIT,EIT,171,1,100],[SOHO,LASCO,C2,white-light,0,50]").unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].source, ImageSource::new("SOHO", "EIT", "EIT", "171"));
        assert!(layers[0].visible);
        assert_eq!(layers[0].opacity, 1.0);
        assert!(!layers[1].visible);
        assert_eq!(layers[1].opacity, 0.5);

        assert_eq!(
            serialize_layer_list(&layers),
            "[SOHO,EIT,EIT,171,1,100],[SOHO,LASCO,C2,white-light,0,50]"
        );
        assert!(parse_layer_list("").unwrap().is_empty());
    }

    #[test]
    fn test_short_layer_string_defaults() {
        let layer = LayerDescriptor::parse("SDO,AIA,AIA,304").unwrap();
        assert!(layer.visible);
        assert_eq!(layer.opacity, 1.0);

        assert!(LayerDescriptor::parse("SDO,AIA").is_err());
        assert!(LayerDescriptor::parse("SDO,AIA,AIA,304,yes").is_err());
        assert!(parse_layer_list("SDO,AIA,AIA,304").is_err());
    }

    #[test]
    fn test_store_round_trip() {
        let mut store = MemorySettings::new();
        assert_eq!(load_zoom_level(&store), None);
        assert!(load_layers(&store).unwrap().is_empty());

        save_zoom_level(&mut store, 12).unwrap();
        assert_eq!(load_zoom_level(&store), Some(12));

        let mut layer = LayerDescriptor::new(ImageSource::new("SOHO", "EIT", "EIT", "304"));
        layer.opacity = 0.25;
        save_layers(&mut store, &[layer.clone()]).unwrap();
        assert_eq!(load_layers(&store).unwrap(), vec![layer]);

        let stored = store.get(TILE_LAYERS_KEY).unwrap();
        assert_eq!(stored[0]["observatory"], "SOHO");
        assert_eq!(stored[0]["opacity"], 0.25);
    }

    #[test]
    fn test_compact_string_in_store() {
        let mut store = MemorySettings::new();
        store
            .set(TILE_LAYERS_KEY, Value::from("[SDO,AIA,AIA,171,1,100]"))
            .unwrap();
        let layers = load_layers(&store).unwrap();
        assert_eq!(layers[0].source.measurement, "171");

        store.set(TILE_LAYERS_KEY, Value::from(42)).unwrap();
        assert!(matches!(load_layers(&store), Err(Error::Settings(_))));
    }
}
