//! The viewer: wires the viewport to the layer manager, the transport and the
//! settings store, and is the single place where viewer state changes.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::config::ViewerConfig;
use crate::core::geo::{to_arcseconds, to_polar, Point, PolarCoord, Size};
use crate::core::viewport::{Viewport, ViewportEvent};
use crate::layers::base::{LayerContext, LayerTrait};
use crate::layers::manager::LayerManager;
use crate::layers::tile::{
    HelioviewerTileSource, ImageSource, MetadataUpdate, TileLayer, TileLayerOptions, TileSource,
};
use crate::net::{Response, Transport};
use crate::prelude::Arc;
use crate::settings::{self, SettingsStore};
use crate::{Error, Result};

/// A double-click zoom request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoomGesture {
    pub zoom_out: bool,
    /// Allow zooming in past the deepest level the layers natively support
    pub cross_layer_bounds: bool,
}

fn layer_context<'a>(
    config: &'a ViewerConfig,
    viewport: &'a Viewport,
    transport: &'a dyn Transport,
    observation_time: i64,
) -> LayerContext<'a> {
    LayerContext {
        config,
        visible: viewport.visible(),
        zoom_level: viewport.zoom_level(),
        image_scale: viewport.image_scale(),
        observation_time,
        transport,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

pub struct Viewer {
    config: ViewerConfig,
    viewport: Viewport,
    layers: LayerManager,
    transport: Arc<dyn Transport>,
    settings: Box<dyn SettingsStore>,
    tile_source: Arc<dyn TileSource>,
    /// Requested observation time, Unix seconds
    observation_time: i64,
    next_layer_id: u64,
}

impl Viewer {
    /// Creates a viewer at the persisted zoom level (or the configured
    /// default). Persisted layers are not restored until
    /// [`Viewer::restore_layers`] is called.
    pub fn new(
        config: ViewerConfig,
        size: Size,
        transport: Arc<dyn Transport>,
        settings: Box<dyn SettingsStore>,
    ) -> Result<Self> {
        config.validate()?;

        let zoom_level = settings::load_zoom_level(settings.as_ref())
            .filter(|level| config.zoom_in_range(*level))
            .unwrap_or(config.default_zoom_level);
        let viewport = Viewport::new(&config, size, zoom_level);
        let tile_source: Arc<dyn TileSource> = Arc::new(HelioviewerTileSource::new(
            config.endpoints.tile_endpoint.clone(),
            config.tile_size,
        ));

        log::info!(
            "viewer {}x{} at zoom level {} ({}\"/px)",
            size.width,
            size.height,
            zoom_level,
            viewport.image_scale()
        );

        Ok(Self {
            layers: LayerManager::new(config.max_tile_layers),
            config,
            viewport,
            transport,
            settings,
            tile_source,
            observation_time: unix_now(),
            next_layer_id: 0,
        })
    }

    /// Starts at `observation_time` instead of now.
    pub fn with_observation_time(mut self, observation_time: i64) -> Self {
        self.observation_time = observation_time;
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn tile_layer(&self, layer_id: &str) -> Option<&TileLayer> {
        self.layers.tile_layer(layer_id)
    }

    pub fn zoom_level(&self) -> i32 {
        self.viewport.zoom_level()
    }

    pub fn observation_time(&self) -> i64 {
        self.observation_time
    }

    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    /// Rebuilds the layers stored in the settings. Returns how many were added.
    /// The stored list is only rewritten once every layer is back, so a
    /// failed restore leaves it intact.
    pub fn restore_layers(&mut self) -> Result<usize> {
        let descriptors = settings::load_layers(self.settings.as_ref())?;
        for descriptor in &descriptors {
            self.insert_tile_layer(descriptor.source.clone(), descriptor.options())?;
        }
        self.persist_layers();
        Ok(descriptors.len())
    }

    /// Adds a tile layer and starts resolving its closest image. Tiles follow
    /// once the image is known.
    pub fn add_tile_layer(&mut self, source: ImageSource, options: TileLayerOptions) -> Result<String> {
        let layer_id = self.insert_tile_layer(source, options)?;
        self.persist_layers();
        Ok(layer_id)
    }

    fn insert_tile_layer(&mut self, source: ImageSource, options: TileLayerOptions) -> Result<String> {
        if self.layers.tile_layer_count() >= self.layers.max_tile_layers() {
            return Err(Error::LayerLimit(self.layers.max_tile_layers()));
        }

        let layer_id = format!("tile-layer-{}", self.next_layer_id);
        self.next_layer_id += 1;

        let layer = TileLayer::new(
            layer_id.clone(),
            source,
            options,
            &self.config,
            Arc::clone(&self.tile_source),
        );
        log::info!("adding layer {} ({})", layer_id, layer.source());
        self.layers.add_layer(Box::new(layer))?;

        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        if let Some(layer) = self.layers.tile_layer_mut(&layer_id) {
            layer.reload(&ctx);
        }
        Ok(layer_id)
    }

    /// Removes a layer and shrinks the sandbox to the remaining layers.
    pub fn remove_layer(&mut self, layer_id: &str) -> bool {
        if self.layers.remove_layer(layer_id).is_none() {
            return false;
        }
        log::info!("removed layer {}", layer_id);

        self.viewport.update_sandbox(self.layers.max_extent());
        self.viewport.check_tiles();
        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        self.layers.viewport_move_all(&ctx);

        self.persist_layers();
        true
    }

    pub fn set_layer_opacity(&mut self, layer_id: &str, opacity: f32) -> bool {
        let changed = self
            .layers
            .with_layer_mut(layer_id, |layer| layer.set_opacity(opacity))
            .is_some();
        if changed {
            self.persist_layers();
        }
        changed
    }

    pub fn set_layer_visible(&mut self, layer_id: &str, visible: bool) -> bool {
        let changed = self
            .layers
            .with_layer_mut(layer_id, |layer| layer.set_visible(visible))
            .is_some();
        if changed {
            self.persist_layers();
        }
        changed
    }

    /// Points a tile layer at another imaging source.
    pub fn set_layer_source(&mut self, layer_id: &str, source: ImageSource) -> Result<()> {
        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        let layer = self
            .layers
            .tile_layer_mut(layer_id)
            .ok_or_else(|| Error::Layer(format!("no tile layer {}", layer_id)))?;
        layer.set_source(source, &ctx);
        self.persist_layers();
        Ok(())
    }

    /// Moves every layer to the image closest to `observation_time`.
    pub fn set_observation_time(&mut self, observation_time: i64) {
        self.observation_time = observation_time;
        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        self.layers.reload_all(&ctx);
    }

    /// Changes the zoom level. Levels outside the configured bounds are
    /// refused; levels past a layer's native resolution are not.
    pub fn zoom_to(&mut self, zoom_level: i32) -> Result<()> {
        self.config.check_zoom(zoom_level)?;
        if zoom_level == self.viewport.zoom_level() {
            return Ok(());
        }
        self.apply_zoom(zoom_level, None);
        Ok(())
    }

    fn apply_zoom(&mut self, zoom_level: i32, focus: Option<Point>) {
        self.viewport.set_zoom_level(zoom_level);
        let image_scale = self.viewport.image_scale();
        log::info!("zoom level {} ({}\"/px)", zoom_level, image_scale);

        self.layers.rescale_all(image_scale);
        self.viewport.update_sandbox(self.layers.max_extent());
        if let Some(focus) = focus {
            self.viewport.center_on(focus);
        }
        self.viewport.check_tiles();

        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        self.layers.reset_all(&ctx);

        if let Err(e) = settings::save_zoom_level(self.settings.as_mut(), zoom_level) {
            log::warn!("could not persist zoom level: {}", e);
        }
        self.viewport.emit(&ViewportEvent::Zoomed {
            zoom_level,
            image_scale,
        });
    }

    /// Double-click: zoom one level in (or out) and bring the clicked point
    /// to the centre. Returns whether the gesture was applied.
    pub fn double_click(&mut self, position: Point, gesture: ZoomGesture) -> bool {
        let current = self.viewport.zoom_level();
        let target = if gesture.zoom_out { current + 1 } else { current - 1 };
        if !self.config.zoom_in_range(target) {
            return false;
        }
        if !gesture.zoom_out && !gesture.cross_layer_bounds {
            if let Some(native_min) = self.layers.native_min_zoom() {
                if target < native_min {
                    log::debug!("double-click past native zoom level {} refused", native_min);
                    return false;
                }
            }
        }

        let clicked = self.viewport.screen_to_heliocentric(position);
        let factor = if gesture.zoom_out { 0.5 } else { 2.0 };
        self.apply_zoom(target, Some(clicked.multiply(factor)));
        true
    }

    /// Shifts the view focus by `delta` screen pixels.
    pub fn move_by(&mut self, delta: Point) {
        self.viewport.move_by(delta);
        self.after_move();
    }

    pub fn move_to(&mut self, offset: Point) {
        self.viewport.move_to(offset);
        self.after_move();
    }

    /// Brings the sun back under the viewport's centre.
    pub fn center(&mut self) {
        self.viewport.center_on_sun();
        self.after_move();
    }

    pub fn start_drag(&mut self) {
        self.viewport.start_moving();
    }

    /// `pointer_delta` is measured from where the drag started.
    pub fn drag(&mut self, pointer_delta: Point) {
        self.viewport.drag(pointer_delta);
        self.after_move();
    }

    pub fn end_drag(&mut self) {
        self.viewport.end_moving();
        self.after_move();
    }

    fn after_move(&mut self) {
        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        self.layers.viewport_move_all(&ctx);
    }

    /// Adopts a new physical viewport size.
    pub fn resize(&mut self, size: Size) {
        if !self.viewport.set_size(size) {
            return;
        }
        self.viewport.update_sandbox(self.layers.max_extent());
        self.viewport.check_tiles();
        if self.layers.is_empty() {
            return;
        }
        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        self.layers.reset_all(&ctx);
    }

    /// Heliocentric arcseconds and polar coordinates under a screen position.
    pub fn mouse_coordinates(&self, position: Point) -> (Point, PolarCoord) {
        let heliocentric = self.viewport.screen_to_heliocentric(position);
        let arcseconds = to_arcseconds(heliocentric, self.viewport.image_scale());
        (arcseconds, to_polar(arcseconds))
    }

    /// Delivers every completed request to its layer and re-issues metadata
    /// lookups whose retry delay elapsed. Returns how many responses were
    /// handled.
    pub fn process_responses(&mut self) -> usize {
        let responses = self.transport.drain();
        let handled = responses.len();

        for response in responses {
            match response {
                Response::Tile { request, outcome } => {
                    self.layers.handle_tile_response(&request, outcome);
                }
                Response::ClosestImage { request, result } => {
                    let update =
                        self.layers
                            .handle_metadata_response(&request, result, &self.config);
                    if let MetadataUpdate::Adopted { first } = update {
                        self.on_image_adopted(&request.layer_id, first);
                    }
                }
            }
        }

        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        let retried = self.layers.poll_metadata_retries(&ctx);
        if retried > 0 {
            log::debug!("retried {} metadata lookups", retried);
        }
        handled
    }

    fn on_image_adopted(&mut self, layer_id: &str, first: bool) {
        if first {
            self.layers.apply_initial_opacity(layer_id);
        }
        self.viewport.update_sandbox(self.layers.max_extent());
        self.viewport.check_tiles();

        let ctx = layer_context(
            &self.config,
            &self.viewport,
            self.transport.as_ref(),
            self.observation_time,
        );
        if let Some(layer) = self.layers.tile_layer_mut(layer_id) {
            layer.reset(&ctx);
        }
        self.layers.viewport_move_all(&ctx);

        if first {
            self.persist_layers();
        }
    }

    fn persist_layers(&mut self) {
        let descriptors = self.layers.descriptors();
        if let Err(e) = settings::save_layers(self.settings.as_mut(), &descriptors) {
            log::warn!("could not persist tile layers: {}", e);
        }
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("zoom_level", &self.viewport.zoom_level())
            .field("layers", &self.layers.list_layers())
            .field("observation_time", &self.observation_time)
            .finish()
    }
}
