use crate::core::config::ViewerConfig;
use crate::core::geo::{Point, Size, VisibleSet};
use crate::net::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Tile,
    Custom,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerType::Tile => write!(f, "tile"),
            LayerType::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerProperties {
    pub id: String,
    pub name: String,
    pub layer_type: LayerType,
    pub z_index: i32,
    pub opacity: f32,
    pub visible: bool,
    /// Zoom levels the layer natively supports
    pub min_zoom: Option<i32>,
    pub max_zoom: Option<i32>,
}

impl LayerProperties {
    pub fn new(id: String, name: String, layer_type: LayerType) -> Self {
        Self {
            id,
            name,
            layer_type,
            z_index: 0,
            opacity: 1.0,
            visible: true,
            min_zoom: None,
            max_zoom: None,
        }
    }
}

impl Default for LayerProperties {
    fn default() -> Self {
        Self::new(
            "default".to_string(),
            "Default Layer".to_string(),
            LayerType::Custom,
        )
    }
}

/// Distances from the sun's centre to each edge of a layer's content, in
/// current-zoom pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayerExtent {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl LayerExtent {
    /// Extent of content `size` pixels large whose centre lies `sun_offset`
    /// pixels away from the sun (sun minus content centre, y down).
    pub fn around_sun(size: Size, sun_offset: Point) -> Self {
        Self {
            left: 0.5 * size.width + sun_offset.x,
            top: 0.5 * size.height + sun_offset.y,
            right: 0.5 * size.width - sun_offset.x,
            bottom: 0.5 * size.height - sun_offset.y,
        }
    }

    /// Per-side maximum of two extents; the sides need not come from the
    /// same layer.
    pub fn union(&self, other: &LayerExtent) -> LayerExtent {
        LayerExtent {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Span of a sun-centred box reaching every edge: twice the farther
    /// side on each axis.
    pub fn size(&self) -> Size {
        Size::new(
            2.0 * self.left.max(self.right),
            2.0 * self.top.max(self.bottom),
        )
    }
}

/// Layers are keyed by a string id
pub type LayerId = String;

/// Everything a layer may read while reacting to viewport changes.
pub struct LayerContext<'a> {
    pub config: &'a ViewerConfig,
    pub visible: &'a VisibleSet,
    pub zoom_level: i32,
    /// Arcseconds per pixel at `zoom_level`
    pub image_scale: f64,
    /// Requested observation time, Unix seconds
    pub observation_time: i64,
    pub transport: &'a dyn Transport,
}

impl<'a> LayerContext<'a> {
    pub fn tile_size(&self) -> u32 {
        self.config.tile_size
    }
}

/// Base lifecycle for anything placed inside the moving container.
pub trait LayerTrait {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn layer_type(&self) -> LayerType;

    fn z_index(&self) -> i32;

    fn set_z_index(&mut self, z_index: i32);

    fn opacity(&self) -> f32;

    fn set_opacity(&mut self, opacity: f32);

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    /// `(min, max)` zoom levels this layer natively supports.
    fn zoom_bounds(&self) -> (Option<i32>, Option<i32>) {
        (None, None)
    }

    /// On-screen extent at the current zoom level, once known.
    fn extent(&self) -> Option<LayerExtent> {
        None
    }

    /// Recomputes scale-dependent geometry for a new reference scale.
    fn rescale(&mut self, _image_scale: f64) {}

    /// Full refresh against the published visible set.
    fn reset(&mut self, ctx: &LayerContext<'_>);

    /// Incremental refresh after the moving container moved.
    fn viewport_move(&mut self, _ctx: &LayerContext<'_>) {}

    /// Re-resolves whatever the layer displays (e.g. for a new observation time).
    fn reload(&mut self, _ctx: &LayerContext<'_>) {}

    /// Drops every display element; called when the layer is removed.
    fn detach(&mut self) {}

    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// A layer with no content of its own; a stand-in for overlays owned by
/// external collaborators (event markers and the like).
pub struct BaseLayer {
    pub properties: LayerProperties,
    resets: usize,
}

impl BaseLayer {
    pub fn new(properties: LayerProperties) -> Self {
        Self {
            properties,
            resets: 0,
        }
    }

    /// How many times the layer has been reset.
    pub fn reset_count(&self) -> usize {
        self.resets
    }
}

impl LayerTrait for BaseLayer {
    fn id(&self) -> &str {
        &self.properties.id
    }

    fn name(&self) -> &str {
        &self.properties.name
    }

    fn layer_type(&self) -> LayerType {
        self.properties.layer_type
    }

    fn z_index(&self) -> i32 {
        self.properties.z_index
    }

    fn set_z_index(&mut self, z_index: i32) {
        self.properties.z_index = z_index;
    }

    fn opacity(&self) -> f32 {
        self.properties.opacity
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.properties.opacity = opacity.clamp(0.0, 1.0);
    }

    fn is_visible(&self) -> bool {
        self.properties.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.properties.visible = visible;
    }

    fn zoom_bounds(&self) -> (Option<i32>, Option<i32>) {
        (self.properties.min_zoom, self.properties.max_zoom)
    }

    fn reset(&mut self, _ctx: &LayerContext<'_>) {
        self.resets += 1;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
