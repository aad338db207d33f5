//! Core data types for tile layer functionality

use crate::core::geo::{Point, Size, TileCoord};
use crate::prelude::Arc;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Handle of one display element inside the moving container
pub type ElementId = u64;

/// Identifier of one reset batch, unique per layer
pub type BatchId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerOptions {
    /// Opacity in `[0, 1]`
    pub opacity: f32,
    pub visible: bool,
    /// Layers sharing a group are stacked over one another; also sets z-order
    pub opacity_group: u32,
    /// Distribute opacity across the group when the first image arrives
    pub auto_opacity: bool,
}

impl Default for TileLayerOptions {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            visible: true,
            opacity_group: 1,
            auto_opacity: true,
        }
    }
}

/// Stand-in for a tile whose image failed to load: transparent, exactly one
/// tile in size, so the grid never collapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub width: u32,
    pub height: u32,
}

impl Placeholder {
    pub fn for_tile_size(tile_size: u32) -> Self {
        Self {
            width: tile_size,
            height: tile_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileState {
    Pending,
    Loaded(Arc<Vec<u8>>),
    Errored(Placeholder),
}

impl TileState {
    /// Whether the tile has settled, either way.
    pub fn is_complete(&self) -> bool {
        !matches!(self, TileState::Pending)
    }
}

/// One image cell of a tile layer and the display element showing it.
#[derive(Debug, Clone)]
pub struct Tile {
    pub element: ElementId,
    pub coord: TileCoord,
    /// Zoom level the tile was created at
    pub zoom_level: i32,
    pub image_id: String,
    pub url: String,
    /// Top-left corner inside the layer, in current-zoom pixels
    pub position: Point,
    pub state: TileState,
    /// Reset batch the tile was created by, if any
    pub batch: Option<BatchId>,
}

impl Tile {
    pub fn mark_loaded(&mut self, data: Arc<Vec<u8>>) {
        self.state = TileState::Loaded(data);
    }

    pub fn mark_errored(&mut self, tile_size: u32) {
        self.state = TileState::Errored(Placeholder::for_tile_size(tile_size));
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, TileState::Loaded(_))
    }
}

/// What a completion did to its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchProgress {
    /// More tiles outstanding
    Pending,
    /// A newer reset began; the completion has no effect on attached tiles
    Superseded,
    /// The load barrier is met: these old elements must go, all at once
    Complete(Vec<ElementId>),
}

/// Bookkeeping for one reset: its own counters and its own list of the
/// elements it replaces.
#[derive(Debug, Clone)]
pub struct TileBatch {
    pub id: BatchId,
    expected: usize,
    loaded: usize,
    old: Vec<ElementId>,
    superseded: bool,
    completed: bool,
}

impl TileBatch {
    pub fn new(id: BatchId, old: Vec<ElementId>) -> Self {
        Self {
            id,
            expected: 0,
            loaded: 0,
            old,
            superseded: false,
            completed: false,
        }
    }

    /// Counts one more tile towards the barrier.
    pub fn track(&mut self) {
        self.expected += 1;
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn old(&self) -> &[ElementId] {
        &self.old
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Called when a newer reset starts; the newer batch's old list already
    /// covers everything this one would have removed.
    pub fn supersede(&mut self) {
        self.superseded = true;
        self.old.clear();
    }

    /// Resolves a batch that never tracked a tile.
    pub fn complete_empty(&mut self) -> Option<Vec<ElementId>> {
        if self.expected > 0 || self.completed || self.superseded {
            return None;
        }
        self.completed = true;
        Some(std::mem::take(&mut self.old))
    }

    /// Whether every tracked tile has reported back.
    pub fn is_settled(&self) -> bool {
        self.completed || self.loaded >= self.expected
    }

    /// Records one tile completion (load or failure).
    pub fn record_completion(&mut self) -> BatchProgress {
        if self.completed {
            return BatchProgress::Pending;
        }
        self.loaded += 1;
        if self.superseded {
            return BatchProgress::Superseded;
        }
        if self.loaded >= self.expected {
            self.completed = true;
            BatchProgress::Complete(std::mem::take(&mut self.old))
        } else {
            BatchProgress::Pending
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// Answer of a closest-image lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub image_id: String,
    #[serde(alias = "jp2Width")]
    pub width: f64,
    #[serde(alias = "jp2Height")]
    pub height: f64,
    /// Arcseconds per image pixel
    #[serde(alias = "jp2Scale", alias = "scale")]
    pub natural_image_scale: f64,
    /// Unix seconds of the image actually returned
    pub timestamp: i64,
    #[serde(default)]
    pub name: String,
    /// Sun centre in image pixels, origin bottom-left
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sun_center_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sun_center_y: Option<f64>,
}

impl ImageMetadata {
    pub fn from_json(json: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(json)?;
        if metadata.width <= 0.0 || metadata.height <= 0.0 || metadata.natural_image_scale <= 0.0 {
            return Err(Error::Metadata(format!(
                "image {} has no usable geometry",
                metadata.image_id
            )));
        }
        Ok(metadata)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn observed_at(&self) -> SystemTime {
        if self.timestamp >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.timestamp as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.timestamp.unsigned_abs())
        }
    }

    /// Sun centre relative to the image centre, in image pixels with y
    /// growing downwards. Zero when the answer carries no sun centre.
    pub fn sun_center_offset(&self) -> Point {
        let x = self
            .sun_center_x
            .map(|x| x - 0.5 * self.width)
            .unwrap_or(0.0);
        let y = self
            .sun_center_y
            .map(|y| -(y - 0.5 * self.height))
            .unwrap_or(0.0);
        Point::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_barrier_releases_old_elements_once() {
        let mut batch = TileBatch::new(1, vec![10, 11, 12]);
        batch.track();
        batch.track();

        assert_eq!(batch.record_completion(), BatchProgress::Pending);
        assert_eq!(batch.record_completion(), BatchProgress::Complete(vec![10, 11, 12]));
        assert!(batch.is_complete());
        // late duplicate completions are no-ops
        assert_eq!(batch.record_completion(), BatchProgress::Pending);
        assert!(batch.old().is_empty());
    }

    #[test]
    fn test_superseded_batch_is_inert() {
        let mut batch = TileBatch::new(1, vec![1, 2]);
        batch.track();
        batch.supersede();
        assert!(batch.old().is_empty());
        assert!(!batch.is_settled());
        assert_eq!(batch.record_completion(), BatchProgress::Superseded);
        assert!(batch.is_settled());
        assert_eq!(batch.complete_empty(), None);
    }

    #[test]
    fn test_empty_batch_completes_immediately() {
        let mut batch = TileBatch::new(3, vec![4]);
        assert_eq!(batch.complete_empty(), Some(vec![4]));
        assert_eq!(batch.complete_empty(), None);
    }

    #[test]
    fn test_metadata_json() {
        let json = r#"{
            "imageId": 1234,
            "width": 1024,
            "height": 1024,
            "naturalImageScale": 2.63,
            "timestamp": 1262304000,
            "name": "EIT 171"
        }"#;
        let image = ImageMetadata::from_json(json).unwrap();
        assert_eq!(image.image_id, "1234");
        assert_eq!(image.size(), Size::new(1024.0, 1024.0));
        assert_eq!(image.sun_center_offset(), Point::new(0.0, 0.0));
        assert_eq!(
            image.observed_at(),
            UNIX_EPOCH + Duration::from_secs(1_262_304_000)
        );
    }

    #[test]
    fn test_metadata_sun_center_and_aliases() {
        let json = r#"{
            "id": "abc",
            "jp2Width": 1000,
            "jp2Height": 800,
            "jp2Scale": 0.6,
            "timestamp": 0,
            "sunCenterX": 510,
            "sunCenterY": 390
        }"#;
        let image = ImageMetadata::from_json(json).unwrap();
        assert_eq!(image.image_id, "abc");
        assert_eq!(image.name, "");
        assert_eq!(image.sun_center_offset(), Point::new(10.0, 10.0));
    }

    #[test]
    fn test_metadata_without_geometry_is_rejected() {
        let json = r#"{"imageId":"x","width":0,"height":10,"naturalImageScale":1,"timestamp":0}"#;
        assert!(matches!(ImageMetadata::from_json(json), Err(Error::Metadata(_))));
        assert!(ImageMetadata::from_json("not json").is_err());
    }

    #[test]
    fn test_errored_tile_gets_placeholder() {
        let mut tile = Tile {
            element: 1,
            coord: TileCoord::new(-1, 0),
            zoom_level: 10,
            image_id: "1".to_string(),
            url: String::new(),
            position: Point::new(-512.0, 0.0),
            state: TileState::Pending,
            batch: None,
        };
        assert!(!tile.state.is_complete());
        tile.mark_errored(512);
        assert_eq!(tile.state, TileState::Errored(Placeholder::for_tile_size(512)));
        assert!(tile.state.is_complete());
        assert!(!tile.is_loaded());
    }
}
