use crate::core::constants::MAX_TILE_LAYERS;
use crate::core::config::ViewerConfig;
use crate::core::geo::Size;
use crate::layers::base::{LayerContext, LayerExtent, LayerTrait, LayerType};
use crate::layers::tile::{ImageMetadata, MetadataUpdate, TileLayer};
use crate::net::{ClosestImageRequest, TileOutcome, TileRequest};
use crate::prelude::HashMap;
use crate::settings::LayerDescriptor;
use crate::{Error, Result};

/// Owns every layer, keeping z-order for resets and insertion order for
/// persistence and opacity groups.
pub struct LayerManager {
    /// All layers indexed by ID
    layers: HashMap<String, Box<dyn LayerTrait>>,
    /// Layer IDs sorted by z-index; ties keep insertion order
    render_order: Vec<String>,
    insertion_order: Vec<String>,
    max_tile_layers: usize,
}

impl LayerManager {
    pub fn new(max_tile_layers: usize) -> Self {
        Self {
            layers: HashMap::default(),
            render_order: Vec::new(),
            insertion_order: Vec::new(),
            max_tile_layers,
        }
    }

    pub fn max_tile_layers(&self) -> usize {
        self.max_tile_layers
    }

    /// Adds a layer to the manager
    pub fn add_layer(&mut self, layer: Box<dyn LayerTrait>) -> Result<()> {
        let layer_id = layer.id().to_string();
        if self.layers.contains_key(&layer_id) {
            return Err(Error::Layer(format!("duplicate layer id {}", layer_id)));
        }
        if layer.layer_type() == LayerType::Tile && self.tile_layer_count() >= self.max_tile_layers {
            return Err(Error::LayerLimit(self.max_tile_layers));
        }
        let z_index = layer.z_index();

        self.layers.insert(layer_id.clone(), layer);

        // Insert in sorted order by z-index
        let insert_pos = self
            .render_order
            .iter()
            .position(|id| {
                self.layers
                    .get(id)
                    .map(|l| l.z_index() > z_index)
                    .unwrap_or(false)
            })
            .unwrap_or(self.render_order.len());

        self.render_order.insert(insert_pos, layer_id.clone());
        self.insertion_order.push(layer_id);
        Ok(())
    }

    /// Removes a layer, detaching its display elements
    pub fn remove_layer(&mut self, layer_id: &str) -> Option<Box<dyn LayerTrait>> {
        self.render_order.retain(|id| id != layer_id);
        self.insertion_order.retain(|id| id != layer_id);
        let mut layer = self.layers.remove(layer_id)?;
        layer.detach();
        Some(layer)
    }

    /// Gets a reference to a layer by ID
    pub fn get_layer(&self, layer_id: &str) -> Option<&dyn LayerTrait> {
        self.layers.get(layer_id).map(|l| l.as_ref())
    }

    /// Applies a function to a specific layer mutably
    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        self.layers.get_mut(layer_id).map(|layer| f(layer.as_mut()))
    }

    pub fn tile_layer(&self, layer_id: &str) -> Option<&TileLayer> {
        self.layers
            .get(layer_id)
            .and_then(|layer| layer.as_any().downcast_ref::<TileLayer>())
    }

    pub fn tile_layer_mut(&mut self, layer_id: &str) -> Option<&mut TileLayer> {
        self.layers
            .get_mut(layer_id)
            .and_then(|layer| layer.as_any_mut().downcast_mut::<TileLayer>())
    }

    /// Tile layers in insertion order.
    pub fn tile_layers(&self) -> impl Iterator<Item = &TileLayer> + '_ {
        self.insertion_order
            .iter()
            .filter_map(move |id| self.tile_layer(id))
    }

    pub fn tile_layer_count(&self) -> usize {
        self.layers
            .values()
            .filter(|layer| layer.layer_type() == LayerType::Tile)
            .count()
    }

    /// Lists all layer IDs in insertion order
    pub fn list_layers(&self) -> Vec<String> {
        self.insertion_order.clone()
    }

    /// Gets all layers in render order
    pub fn layers(&self) -> Vec<&dyn LayerTrait> {
        self.render_order
            .iter()
            .filter_map(|id| self.layers.get(id).map(|l| l.as_ref()))
            .collect()
    }

    /// Applies a function to each layer mutably in render order
    pub fn for_each_layer_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn LayerTrait),
    {
        for id in &self.render_order {
            if let Some(layer) = self.layers.get_mut(id) {
                f(layer.as_mut());
            }
        }
    }

    /// Applies a function to each layer immutably in render order.
    pub fn for_each_layer<F>(&self, mut f: F)
    where
        F: FnMut(&dyn LayerTrait),
    {
        for id in &self.render_order {
            if let Some(layer) = self.layers.get(id) {
                f(layer.as_ref());
            }
        }
    }

    /// Updates the render order based on current z-indices
    pub fn update_render_order(&mut self) {
        let layers = &self.layers;
        self.render_order.sort_by_key(|id| layers.get(id).map(|l| l.z_index()).unwrap_or(0));
    }

    /// Largest on-screen extent over every layer that knows its size. Each
    /// side is maximised on its own, so width and height may come from
    /// different layers.
    pub fn max_extent(&self) -> Size {
        self.layers
            .values()
            .filter_map(|layer| layer.extent())
            .fold(LayerExtent::default(), |acc, extent| acc.union(&extent))
            .size()
    }

    /// Deepest zoom level at which some layer still shows its imagery
    /// without enlargement.
    pub fn native_min_zoom(&self) -> Option<i32> {
        self.layers
            .values()
            .filter(|layer| layer.is_visible())
            .filter_map(|layer| layer.zoom_bounds().0)
            .min()
    }

    pub fn rescale_all(&mut self, image_scale: f64) {
        self.for_each_layer_mut(|layer| layer.rescale(image_scale));
    }

    pub fn reset_all(&mut self, ctx: &LayerContext<'_>) {
        log::debug!(
            "resetting {} layers for {} visible cells",
            self.layers.len(),
            ctx.visible.len()
        );
        self.for_each_layer_mut(|layer| layer.reset(ctx));
    }

    pub fn viewport_move_all(&mut self, ctx: &LayerContext<'_>) {
        self.for_each_layer_mut(|layer| layer.viewport_move(ctx));
    }

    pub fn reload_all(&mut self, ctx: &LayerContext<'_>) {
        self.for_each_layer_mut(|layer| layer.reload(ctx));
    }

    /// Gives a newly resolved layer its share of its opacity group: every
    /// tile layer in the group added up to and including this one counts.
    pub fn apply_initial_opacity(&mut self, layer_id: &str) {
        let Some(group) = self.tile_layer(layer_id).map(|layer| layer.opacity_group()) else {
            return;
        };

        let mut group_size = 0;
        for id in &self.insertion_order {
            if let Some(layer) = self.tile_layer(id) {
                if layer.opacity_group() == group {
                    group_size += 1;
                }
            }
            if id == layer_id {
                break;
            }
        }

        if let Some(layer) = self.tile_layer_mut(layer_id) {
            layer.set_initial_opacity(group_size);
        }
    }

    pub fn handle_tile_response(&mut self, request: &TileRequest, outcome: TileOutcome) {
        match self.tile_layer_mut(&request.layer_id) {
            Some(layer) => layer.handle_tile(request, outcome),
            None => log::trace!("dropping tile for removed layer {}", request.layer_id),
        }
    }

    pub fn handle_metadata_response(
        &mut self,
        request: &ClosestImageRequest,
        result: Result<ImageMetadata>,
        config: &ViewerConfig,
    ) -> MetadataUpdate {
        match self.tile_layer_mut(&request.layer_id) {
            Some(layer) => layer.handle_metadata(request, result, config),
            None => MetadataUpdate::Ignored,
        }
    }

    /// Re-issues failed metadata lookups whose backoff elapsed. Returns how
    /// many were sent.
    pub fn poll_metadata_retries(&mut self, ctx: &LayerContext<'_>) -> usize {
        let mut retried = 0;
        for id in &self.insertion_order {
            let retry = self
                .layers
                .get_mut(id)
                .and_then(|layer| layer.as_any_mut().downcast_mut::<TileLayer>())
                .map(|layer| layer.poll_retry(ctx))
                .unwrap_or(false);
            if retry {
                retried += 1;
            }
        }
        retried
    }

    /// Persistable description of every tile layer, in insertion order.
    pub fn descriptors(&self) -> Vec<LayerDescriptor> {
        self.tile_layers().map(TileLayer::descriptor).collect()
    }

    /// Gets the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Checks if the manager is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new(MAX_TILE_LAYERS)
    }
}
