use super::source::{closest_image_url, ImageSource, TileSource};
use super::types::{
    BatchId, BatchProgress, ElementId, ImageMetadata, Tile, TileBatch, TileLayerOptions, TileState,
};
use crate::core::config::ViewerConfig;
use crate::core::geo::{relative_scale, valid_tile_range, Point, Size, TileCoord, VisibleRange};
use crate::events::EventChannel;
use crate::layers::base::{LayerContext, LayerExtent, LayerProperties, LayerTrait, LayerType};
use crate::net::{ClosestImageRequest, Request, TileOutcome, TileRequest};
use crate::prelude::{Arc, HashMap, Instant};
use crate::settings::LayerDescriptor;
use crate::traits::RetryLogic;
use crate::Result;

/// Notifications published by a tile layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    /// Opacity, visibility or source selection changed
    Changed { layer_id: String },
    /// A different closest-in-time image was adopted
    MetadataLoaded {
        layer_id: String,
        image: ImageMetadata,
    },
    /// The lookup failed; the layer keeps showing its last image
    MetadataFailed {
        layer_id: String,
        error: String,
        will_retry: bool,
    },
    /// Zoomed past the deepest level the imagery natively supports
    ZoomBoundary {
        layer_id: String,
        native_min_zoom: i32,
        zoom_level: i32,
    },
    /// A reset's load barrier was met and the tiles it replaced were removed
    BatchComplete {
        layer_id: String,
        batch: BatchId,
        removed: usize,
    },
}

/// What a closest-image answer did to the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataUpdate {
    /// Answer to a lookup that has since been superseded
    Ignored,
    /// Same image as the one already shown
    Unchanged,
    /// A new image was adopted; `first` on the layer's first image
    Adopted { first: bool },
    Failed { will_retry: bool },
}

#[derive(Debug, Default)]
struct MetadataState {
    generation: u64,
    in_flight: bool,
    failures: u32,
    last_failure: Option<Instant>,
}

impl RetryLogic for MetadataState {
    fn retry_count(&self) -> u32 {
        self.failures.saturating_sub(1)
    }

    fn last_retry_time(&self) -> Option<Instant> {
        self.last_failure
    }
}

/// Tiles of one imaging source, resolved to the image closest to the
/// observation time and rescaled to the viewport's reference scale.
pub struct TileLayer {
    properties: LayerProperties,
    options: TileLayerOptions,
    source: ImageSource,
    tile_source: Arc<dyn TileSource>,
    tile_size: u32,
    image: Option<ImageMetadata>,
    /// Reference scale the relative geometry was computed for
    image_scale: f64,
    rel_size: Size,
    /// Sun centre relative to the image centre, in current-zoom pixels
    sun_offset: Point,
    /// Latest element per cell
    tiles: HashMap<TileCoord, ElementId>,
    /// Every attached display element
    elements: HashMap<ElementId, Tile>,
    /// Batches whose tiles are still outstanding
    batches: Vec<TileBatch>,
    next_element: ElementId,
    next_batch: BatchId,
    metadata: MetadataState,
    boundary_notice_shown: bool,
    events: EventChannel<LayerEvent>,
}

impl TileLayer {
    pub fn new(
        id: String,
        source: ImageSource,
        options: TileLayerOptions,
        config: &ViewerConfig,
        tile_source: Arc<dyn TileSource>,
    ) -> Self {
        let mut properties = LayerProperties::new(id, source.label(), LayerType::Tile);
        // stacked groups sit below overlays
        properties.z_index = options.opacity_group as i32 - 10;
        properties.opacity = options.opacity.clamp(0.0, 1.0);
        properties.visible = options.visible;

        Self {
            properties,
            options,
            source,
            tile_source,
            tile_size: config.tile_size,
            image: None,
            image_scale: config.scale.image_scale(config.default_zoom_level),
            rel_size: Size::default(),
            sun_offset: Point::default(),
            tiles: HashMap::default(),
            elements: HashMap::default(),
            batches: Vec::new(),
            next_element: 0,
            next_batch: 0,
            metadata: MetadataState::default(),
            boundary_notice_shown: false,
            events: EventChannel::new(),
        }
    }

    pub fn events(&self) -> &EventChannel<LayerEvent> {
        &self.events
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn image(&self) -> Option<&ImageMetadata> {
        self.image.as_ref()
    }

    /// Image dimensions at the current reference scale.
    pub fn rel_size(&self) -> Size {
        self.rel_size
    }

    pub fn opacity_group(&self) -> u32 {
        self.options.opacity_group
    }

    pub fn auto_opacity(&self) -> bool {
        self.options.auto_opacity
    }

    /// Applies the opacity owed to a newly joined member of a group of
    /// `group_size` layers. Only done once, and never over a user setting.
    pub fn set_initial_opacity(&mut self, group_size: usize) {
        if self.options.auto_opacity && self.properties.opacity == 1.0 && group_size > 1 {
            self.properties.opacity = 1.0 / group_size as f32;
            log::debug!(
                "layer {} joins opacity group {} of {}: opacity {}",
                self.properties.id,
                self.options.opacity_group,
                group_size,
                self.properties.opacity
            );
            self.notify_changed();
        }
        self.options.auto_opacity = false;
    }

    pub fn is_loading_metadata(&self) -> bool {
        self.metadata.in_flight
    }

    /// Consecutive failed lookups since the last success.
    pub fn metadata_failures(&self) -> u32 {
        self.metadata.failures
    }

    /// Number of attached display elements, old and new.
    pub fn attached_count(&self) -> usize {
        self.elements.len()
    }

    /// Batches still waiting on tiles, superseded ones included.
    pub fn pending_batches(&self) -> usize {
        self.batches.len()
    }

    /// The active batch, if its barrier has not been met yet.
    pub fn active_batch(&self) -> Option<&TileBatch> {
        self.batches.iter().find(|batch| !batch.is_superseded())
    }

    /// The tile currently shown for `coord`.
    pub fn tile_at(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles
            .get(&coord)
            .and_then(|element| self.elements.get(element))
    }

    /// Every attached tile, in no particular order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.elements.values()
    }

    /// Cells that can hold image data, empty until an image is known.
    pub fn valid_range(&self) -> VisibleRange {
        if self.image.is_none() {
            return VisibleRange::empty();
        }
        valid_tile_range(self.rel_size, self.tile_size)
    }

    pub fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            source: self.source.clone(),
            visible: self.properties.visible,
            opacity: self.properties.opacity,
            opacity_group: self.options.opacity_group,
        }
    }

    /// Switches to another imaging source and looks up its closest image.
    /// The previous image stays on screen until the answer arrives.
    pub fn set_source(&mut self, source: ImageSource, ctx: &LayerContext<'_>) {
        if source == self.source {
            return;
        }
        log::info!("layer {} now shows {}", self.properties.id, source);
        self.properties.name = source.label();
        self.source = source;
        self.boundary_notice_shown = false;
        self.notify_changed();
        self.reload(ctx);
    }

    /// Builds the tile for `coord` without attaching it. Its request URL
    /// points at the current image.
    pub fn get_tile(&mut self, coord: TileCoord, zoom_level: i32) -> Tile {
        let image_id = self
            .image
            .as_ref()
            .map(|image| image.image_id.clone())
            .unwrap_or_default();
        let url = self.tile_source.tile_url(coord, zoom_level, &image_id);
        let element = self.next_element;
        self.next_element += 1;

        Tile {
            element,
            coord,
            zoom_level,
            image_id,
            url,
            position: coord.pixel_origin(self.tile_size).subtract(&self.sun_offset),
            state: TileState::Pending,
            batch: None,
        }
    }

    fn attach_tile(
        &mut self,
        coord: TileCoord,
        batch: Option<BatchId>,
        ctx: &LayerContext<'_>,
    ) -> ElementId {
        let mut tile = self.get_tile(coord, ctx.zoom_level);
        tile.batch = batch;

        ctx.transport.submit(Request::Tile(TileRequest {
            layer_id: self.properties.id.clone(),
            element: tile.element,
            batch,
            coord,
            zoom_level: ctx.zoom_level,
            url: tile.url.clone(),
        }));

        let element = tile.element;
        self.tiles.insert(coord, element);
        self.elements.insert(element, tile);
        element
    }

    fn remove_elements(&mut self, old: &[ElementId]) -> usize {
        let mut removed = 0;
        for element in old {
            if let Some(tile) = self.elements.remove(element) {
                if self.tiles.get(&tile.coord) == Some(element) {
                    self.tiles.remove(&tile.coord);
                }
                removed += 1;
            }
        }
        removed
    }

    fn check_zoom_boundary(&mut self, zoom_level: i32) {
        let Some(native_min_zoom) = self.properties.min_zoom else {
            return;
        };
        if zoom_level < native_min_zoom && !self.boundary_notice_shown {
            self.boundary_notice_shown = true;
            log::info!(
                "layer {} is enlarged beyond its native resolution at zoom level {}",
                self.properties.id,
                zoom_level
            );
            self.events.emit(&LayerEvent::ZoomBoundary {
                layer_id: self.properties.id.clone(),
                native_min_zoom,
                zoom_level,
            });
        }
    }

    fn notify_changed(&self) {
        self.events.emit(&LayerEvent::Changed {
            layer_id: self.properties.id.clone(),
        });
    }

    fn request_closest_image(&mut self, ctx: &LayerContext<'_>) {
        self.metadata.generation += 1;
        let url = match closest_image_url(
            &ctx.config.endpoints.api_endpoint,
            &self.source,
            ctx.observation_time,
        ) {
            Ok(url) => url,
            Err(e) => {
                log::error!("layer {}: {}", self.properties.id, e);
                self.metadata.in_flight = false;
                return;
            }
        };
        self.metadata.in_flight = true;
        log::debug!(
            "layer {} looking up closest image (generation {})",
            self.properties.id,
            self.metadata.generation
        );
        ctx.transport.submit(Request::ClosestImage(ClosestImageRequest {
            layer_id: self.properties.id.clone(),
            generation: self.metadata.generation,
            url,
        }));
    }

    /// Applies a closest-image answer. On adoption the caller is expected to
    /// refresh the sandbox and reset this layer.
    pub fn handle_metadata(
        &mut self,
        request: &ClosestImageRequest,
        result: Result<ImageMetadata>,
        config: &ViewerConfig,
    ) -> MetadataUpdate {
        if request.generation != self.metadata.generation {
            log::trace!(
                "layer {} ignoring stale lookup {} (current {})",
                self.properties.id,
                request.generation,
                self.metadata.generation
            );
            return MetadataUpdate::Ignored;
        }
        self.metadata.in_flight = false;

        match result {
            Ok(image) => {
                self.metadata.failures = 0;
                self.metadata.last_failure = None;

                if self.image.as_ref().map(|current| &current.image_id) == Some(&image.image_id) {
                    return MetadataUpdate::Unchanged;
                }

                let first = self.image.is_none();
                self.properties.min_zoom =
                    Some(config.scale.zoom_level_for_scale(image.natural_image_scale));
                self.image = Some(image.clone());
                self.rescale(self.image_scale);

                log::info!(
                    "layer {} adopted image {} ({})",
                    self.properties.id,
                    image.image_id,
                    image.name
                );
                self.events.emit(&LayerEvent::MetadataLoaded {
                    layer_id: self.properties.id.clone(),
                    image,
                });
                MetadataUpdate::Adopted { first }
            }
            Err(e) => {
                self.metadata.failures += 1;
                self.metadata.last_failure = Some(Instant::now());
                let will_retry = self.metadata.failures <= config.tile_loading.max_retries;

                log::warn!(
                    "layer {} closest image lookup failed ({} in a row): {}",
                    self.properties.id,
                    self.metadata.failures,
                    e
                );
                self.events.emit(&LayerEvent::MetadataFailed {
                    layer_id: self.properties.id.clone(),
                    error: e.to_string(),
                    will_retry,
                });
                MetadataUpdate::Failed { will_retry }
            }
        }
    }

    /// Re-issues a failed lookup once its backoff has elapsed. Returns
    /// whether a request was submitted.
    pub fn poll_retry(&mut self, ctx: &LayerContext<'_>) -> bool {
        if self.metadata.in_flight
            || self.metadata.failures == 0
            || !self.metadata.should_retry(&ctx.config.tile_loading)
        {
            return false;
        }

        self.request_closest_image(ctx);
        true
    }

    /// Applies a tile completion: the tile shows its image or a placeholder,
    /// and its batch moves towards the load barrier.
    pub fn handle_tile(&mut self, request: &TileRequest, outcome: TileOutcome) {
        match self.elements.get_mut(&request.element) {
            Some(tile) => match outcome {
                TileOutcome::Loaded(data) => {
                    log::trace!("tile {:?} loaded for {}", request.coord, request.layer_id);
                    tile.mark_loaded(data);
                }
                TileOutcome::Failed(reason) => {
                    log::warn!("tile {} failed, using placeholder: {}", request.url, reason);
                    tile.mark_errored(self.tile_size);
                }
            },
            None => log::trace!("tile {:?} completed after removal", request.coord),
        }

        let Some(batch_id) = request.batch else {
            return;
        };
        let Some(batch) = self.batches.iter_mut().find(|batch| batch.id == batch_id) else {
            return;
        };

        let progress = batch.record_completion();
        self.batches.retain(|batch| !batch.is_settled());

        if let BatchProgress::Complete(old) = progress {
            let removed = self.remove_elements(&old);
            log::debug!(
                "layer {} batch {} complete, removed {} old tiles",
                self.properties.id,
                batch_id,
                removed
            );
            self.events.emit(&LayerEvent::BatchComplete {
                layer_id: self.properties.id.clone(),
                batch: batch_id,
                removed,
            });
        }
    }
}

impl LayerTrait for TileLayer {
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
        self.options.auto_opacity = false;
        self.notify_changed();
    }

    fn is_visible(&self) -> bool {
        self.properties.visible
    }

    fn set_visible(&mut self, visible: bool) {
        if self.properties.visible != visible {
            self.properties.visible = visible;
            self.notify_changed();
        }
    }

    fn zoom_bounds(&self) -> (Option<i32>, Option<i32>) {
        (self.properties.min_zoom, self.properties.max_zoom)
    }

    fn extent(&self) -> Option<LayerExtent> {
        self.image
            .as_ref()
            .map(|_| LayerExtent::around_sun(self.rel_size, self.sun_offset))
    }

    fn rescale(&mut self, image_scale: f64) {
        self.image_scale = image_scale;
        if let Some(image) = &self.image {
            let factor = relative_scale(image.natural_image_scale, image_scale);
            self.rel_size = Size::new(image.width * factor, image.height * factor);
            self.sun_offset = image.sun_center_offset().multiply(factor);
        }
    }

    /// Replaces every tile with a fresh batch covering the visible set. The
    /// tiles being replaced stay attached until the whole batch has settled.
    fn reset(&mut self, ctx: &LayerContext<'_>) {
        self.rescale(ctx.image_scale);
        if self.image.is_none() {
            log::trace!("layer {} has no image yet, nothing to reset", self.properties.id);
            return;
        }
        self.check_zoom_boundary(ctx.zoom_level);

        let mut old: Vec<ElementId> = self.elements.keys().copied().collect();
        old.sort_unstable();

        for batch in &mut self.batches {
            batch.supersede();
        }
        self.batches.retain(|batch| !batch.is_settled());

        let batch_id = self.next_batch;
        self.next_batch += 1;
        let mut batch = TileBatch::new(batch_id, old);
        self.tiles.clear();

        let valid = self.valid_range();
        let cells: Vec<TileCoord> = ctx
            .visible
            .iter()
            .filter(|coord| valid.contains(coord))
            .collect();
        for coord in cells {
            self.attach_tile(coord, Some(batch_id), ctx);
            batch.track();
        }

        log::debug!(
            "layer {} reset: batch {} expects {} tiles, replaces {}",
            self.properties.id,
            batch_id,
            batch.expected(),
            batch.old().len()
        );

        match batch.complete_empty() {
            Some(old) => {
                self.remove_elements(&old);
            }
            None => self.batches.push(batch),
        }
    }

    /// Attaches tiles for newly exposed cells; nothing is removed.
    fn viewport_move(&mut self, ctx: &LayerContext<'_>) {
        if self.image.is_none() {
            return;
        }
        let valid = self.valid_range();
        let exposed: Vec<TileCoord> = ctx
            .visible
            .iter()
            .filter(|coord| valid.contains(coord) && !self.tiles.contains_key(coord))
            .collect();
        for coord in exposed {
            self.attach_tile(coord, None, ctx);
        }
    }

    /// Looks up the image closest to the observation time afresh.
    fn reload(&mut self, ctx: &LayerContext<'_>) {
        self.metadata.failures = 0;
        self.metadata.last_failure = None;
        self.request_closest_image(ctx);
    }

    fn detach(&mut self) {
        self.tiles.clear();
        self.elements.clear();
        self.batches.clear();
        // answers to outstanding lookups are now stale
        self.metadata.generation += 1;
        self.metadata.in_flight = false;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl std::fmt::Debug for TileLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLayer")
            .field("id", &self.properties.id)
            .field("source", &self.source.to_string())
            .field("image", &self.image.as_ref().map(|image| &image.image_id))
            .field("attached", &self.elements.len())
            .field("pending_batches", &self.batches.len())
            .finish()
    }
}
