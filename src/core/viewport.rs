use crate::core::config::{ScaleConfig, ViewerConfig};
use crate::core::geo::{
    display_range, heliocentric_viewport_bounds, PixelBounds, Point, Size, VisibleRange,
    VisibleSet,
};
use crate::events::EventChannel;

/// Notifications published by the viewport.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    /// The moving container was repositioned inside the sandbox
    Moved { offset: Point },
    /// The zoom level changed and every layer has been reset
    Zoomed { zoom_level: i32, image_scale: f64 },
    /// The physical viewport size changed
    Resized { size: Size },
}

/// The rectangle bounding how far the moving container may be dragged. It is
/// kept centred under the viewport's centre.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sandbox {
    size: Size,
    /// Top-left corner relative to the viewport's top-left corner
    position: Point,
}

impl Sandbox {
    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Restricts a moving-container offset to `[0, width] x [0, height]`.
    pub fn clamp(&self, offset: Point) -> Point {
        Point::new(
            offset.x.clamp(0.0, self.size.width),
            offset.y.clamp(0.0, self.size.height),
        )
    }

    /// Resizes to `max(0, extent - viewport)` per axis, recentred on
    /// `viewport_center`. Returns the size change.
    fn resize(&mut self, max_extent: Size, viewport: Size, viewport_center: Point) -> Size {
        let old = self.size;
        self.size = Size::new(
            (max_extent.width - viewport.width).max(0.0),
            (max_extent.height - viewport.height).max(0.0),
        );
        self.position = Point::new(
            viewport_center.x - 0.5 * self.size.width,
            viewport_center.y - 0.5 * self.size.height,
        );
        Size::new(self.size.width - old.width, self.size.height - old.height)
    }
}

/// Owns the sandbox, the moving container's offset and the zoom level, and
/// publishes the set of tile cells that must be visible.
#[derive(Debug)]
pub struct Viewport {
    /// Physical size in pixels
    size: Size,
    prefetch: u32,
    tile_size: u32,
    zoom_level: i32,
    scale: ScaleConfig,
    sandbox: Sandbox,
    /// Moving-container offset relative to the sandbox's top-left corner
    offset: Point,
    drag_origin: Option<Point>,
    visible: VisibleSet,
    events: EventChannel<ViewportEvent>,
}

impl Viewport {
    pub fn new(config: &ViewerConfig, size: Size, zoom_level: i32) -> Self {
        let mut viewport = Self {
            size,
            prefetch: config.prefetch,
            tile_size: config.tile_size,
            zoom_level,
            scale: config.scale,
            sandbox: Sandbox::default(),
            offset: Point::default(),
            drag_origin: None,
            visible: VisibleSet::default(),
            events: EventChannel::new(),
        };
        viewport.sandbox.position = viewport.center();
        viewport.check_tiles();
        viewport
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Physical size plus the prefetch margin on every side.
    pub fn dimensions(&self) -> Size {
        let margin = 2.0 * self.prefetch as f64;
        Size::new(self.size.width + margin, self.size.height + margin)
    }

    /// Screen-space centre of the viewport, rounded to whole pixels.
    pub fn center(&self) -> Point {
        Point::new(
            (self.size.width / 2.0).round(),
            (self.size.height / 2.0).round(),
        )
    }

    pub fn zoom_level(&self) -> i32 {
        self.zoom_level
    }

    /// Arcseconds per pixel at the current zoom level.
    pub fn image_scale(&self) -> f64 {
        self.scale.image_scale(self.zoom_level)
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn is_moving(&self) -> bool {
        self.drag_origin.is_some()
    }

    pub fn visible(&self) -> &VisibleSet {
        &self.visible
    }

    pub fn visible_range(&self) -> VisibleRange {
        self.visible.range()
    }

    pub fn events(&self) -> &EventChannel<ViewportEvent> {
        &self.events
    }

    /// Records a new physical size. Returns whether anything changed.
    pub fn set_size(&mut self, size: Size) -> bool {
        if size == self.size {
            return false;
        }
        self.size = size;
        self.events.emit(&ViewportEvent::Resized { size });
        true
    }

    pub(crate) fn set_zoom_level(&mut self, zoom_level: i32) {
        self.zoom_level = zoom_level;
    }

    pub(crate) fn emit(&self, event: &ViewportEvent) {
        self.events.emit(event);
    }

    /// Heliocentric edges of the physical viewport.
    pub fn heliocentric_bounds(&self) -> PixelBounds {
        heliocentric_viewport_bounds(self.sandbox.position, self.offset, self.size)
    }

    /// Heliocentric pixel under the viewport's centre.
    pub fn heliocentric_center(&self) -> Point {
        self.center()
            .subtract(&self.sandbox.position)
            .subtract(&self.offset)
    }

    /// Heliocentric pixel under a screen position.
    pub fn screen_to_heliocentric(&self, screen: Point) -> Point {
        screen.subtract(&self.sandbox.position).subtract(&self.offset)
    }

    /// Resizes the sandbox for a new aggregate layer extent, measured against
    /// [`Viewport::dimensions`] (prefetch margin included), scaling the
    /// container offset with the size change so the heliocentric centre stays
    /// where it was.
    pub fn update_sandbox(&mut self, max_extent: Size) {
        let center = self.center();
        let change = self.sandbox.resize(max_extent, self.dimensions(), center);
        let shifted = Point::new(
            self.offset.x + 0.5 * change.width,
            self.offset.y + 0.5 * change.height,
        );
        self.offset = self.sandbox.clamp(shifted);
        if let Some(origin) = self.drag_origin {
            self.drag_origin = Some(self.sandbox.clamp(Point::new(
                origin.x + 0.5 * change.width,
                origin.y + 0.5 * change.height,
            )));
        }
    }

    /// Recomputes the visible tile range (including the prefetch margin) and
    /// publishes a fresh visible set.
    pub fn check_tiles(&mut self) -> &VisibleSet {
        let bounds = self.heliocentric_bounds().expand(self.prefetch as f64);
        let range = display_range(&bounds, self.tile_size);
        self.visible = VisibleSet::from_range(range);
        &self.visible
    }

    /// Places the moving container at `position` (clamped to the sandbox).
    pub fn move_to(&mut self, position: Point) {
        self.offset = self.sandbox.clamp(position);
        self.check_tiles();
        self.events.emit(&ViewportEvent::Moved {
            offset: self.offset,
        });
    }

    /// Shifts the view focus by `delta` pixels; the content moves the other way.
    pub fn move_by(&mut self, delta: Point) {
        let target = self.offset.subtract(&delta);
        self.move_to(target);
    }

    /// Puts the sun's centre under the viewport's centre (as far as the
    /// sandbox allows).
    pub fn center_on_sun(&mut self) {
        let position = Point::new(0.5 * self.sandbox.width(), 0.5 * self.sandbox.height());
        self.move_to(position);
    }

    /// Moves so that the heliocentric pixel `target` sits under the centre.
    pub fn center_on(&mut self, target: Point) {
        let position = self
            .center()
            .subtract(&self.sandbox.position)
            .subtract(&target);
        self.move_to(position);
    }

    pub fn start_moving(&mut self) {
        self.drag_origin = Some(self.offset);
    }

    /// Drag update: `pointer_delta` is the pointer's displacement since
    /// [`Viewport::start_moving`]; the content follows the pointer.
    pub fn drag(&mut self, pointer_delta: Point) {
        let origin = self.drag_origin.unwrap_or(self.offset);
        self.move_to(origin.add(&pointer_delta));
    }

    pub fn end_moving(&mut self) {
        self.drag_origin = None;
        self.events.emit(&ViewportEvent::Moved {
            offset: self.offset,
        });
    }
}
