use crate::{
    core::{
        config::ViewerConfig,
        geo::Point,
        viewer::{Viewer, ZoomGesture},
    },
    input::events::{EventHandled, InputEvent, KeyCode, KeyModifiers},
    Result,
};

/// Translates raw input into viewer operations.
///
/// Drag updates are thinned out: only every `drag_throttle`-th pointer move
/// reaches the viewer. The drag is always measured from where it started, so
/// skipped moves lose no distance.
#[derive(Debug, Clone)]
pub struct InputHandler {
    pub enabled: bool,
    pub zoom_on_wheel: bool,
    pub zoom_on_double_click: bool,
    pub pan_on_drag: bool,
    drag_throttle: u32,
    pan_step: f64,
    move_counter: u32,
    drag_start: Option<Point>,
}

impl InputHandler {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            enabled: true,
            zoom_on_wheel: true,
            zoom_on_double_click: true,
            pan_on_drag: true,
            drag_throttle: config.drag_throttle.max(1),
            pan_step: config.keyboard_pan_step,
            move_counter: 0,
            drag_start: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_start.is_some()
    }

    pub fn handle(&mut self, event: InputEvent, viewer: &mut Viewer) -> Result<EventHandled> {
        if !self.enabled {
            return Ok(EventHandled::NotHandled);
        }

        let handled = match event {
            InputEvent::DragStart { position } => self.drag_start(position, viewer),
            InputEvent::Drag { position } => self.drag(position, viewer),
            InputEvent::DragEnd => self.drag_end(viewer),
            InputEvent::DoubleClick {
                position,
                modifiers,
            } => {
                if !self.zoom_on_double_click {
                    return Ok(EventHandled::NotHandled);
                }
                let gesture = ZoomGesture {
                    zoom_out: modifiers.shift,
                    cross_layer_bounds: modifiers.alt,
                };
                if viewer.double_click(position, gesture) {
                    EventHandled::Handled
                } else {
                    EventHandled::NotHandled
                }
            }
            InputEvent::Scroll { delta } => self.scroll(delta, viewer)?,
            InputEvent::KeyPress { key, modifiers } => self.key_press(key, modifiers, viewer)?,
            InputEvent::Resize { size } => {
                viewer.resize(size);
                EventHandled::Handled
            }
        };
        Ok(handled)
    }

    fn drag_start(&mut self, position: Point, viewer: &mut Viewer) -> EventHandled {
        if !self.pan_on_drag {
            return EventHandled::NotHandled;
        }
        // Nothing to pan when the whole image already fits.
        if viewer.viewport().sandbox().size().is_empty() {
            return EventHandled::NotHandled;
        }
        self.drag_start = Some(position);
        self.move_counter = 0;
        viewer.start_drag();
        EventHandled::Handled
    }

    fn drag(&mut self, position: Point, viewer: &mut Viewer) -> EventHandled {
        let Some(start) = self.drag_start else {
            return EventHandled::NotHandled;
        };

        self.move_counter = self.move_counter.wrapping_add(1);
        if self.move_counter % self.drag_throttle != 0 {
            return EventHandled::Handled;
        }

        viewer.drag(position.subtract(&start));
        EventHandled::Handled
    }

    fn drag_end(&mut self, viewer: &mut Viewer) -> EventHandled {
        if self.drag_start.take().is_none() {
            return EventHandled::NotHandled;
        }
        viewer.end_drag();
        EventHandled::Handled
    }

    fn scroll(&mut self, delta: f64, viewer: &mut Viewer) -> Result<EventHandled> {
        if !self.zoom_on_wheel || delta == 0.0 {
            return Ok(EventHandled::NotHandled);
        }
        let step = if delta > 0.0 { -1 } else { 1 };
        self.zoom_step(step, viewer)
    }

    /// Moves one zoom level; lower levels are finer. Steps past the
    /// configured bounds are ignored.
    fn zoom_step(&mut self, step: i32, viewer: &mut Viewer) -> Result<EventHandled> {
        let target = viewer.zoom_level() + step;
        if !viewer.config().zoom_in_range(target) {
            return Ok(EventHandled::NotHandled);
        }
        viewer.zoom_to(target)?;
        Ok(EventHandled::Handled)
    }

    fn key_press(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
        viewer: &mut Viewer,
    ) -> Result<EventHandled> {
        // Leave shortcuts to whoever owns them.
        if modifiers.ctrl || modifiers.meta {
            return Ok(EventHandled::NotHandled);
        }

        let step = self.pan_step;
        let pan = match key {
            KeyCode::ArrowUp => Some(Point::new(0.0, -step)),
            KeyCode::ArrowDown => Some(Point::new(0.0, step)),
            KeyCode::ArrowLeft => Some(Point::new(-step, 0.0)),
            KeyCode::ArrowRight => Some(Point::new(step, 0.0)),
            _ => None,
        };
        if let Some(delta) = pan {
            viewer.move_by(delta);
            return Ok(EventHandled::Handled);
        }

        match key {
            KeyCode::Plus => self.zoom_step(-1, viewer),
            KeyCode::Minus => self.zoom_step(1, viewer),
            KeyCode::Char('c') | KeyCode::Char('C') => {
                viewer.center();
                Ok(EventHandled::Handled)
            }
            _ => Ok(EventHandled::NotHandled),
        }
    }
}
