use std::cell::Cell;
use std::rc::Rc;

use crate::{
    core::{
        config::ViewerConfig,
        viewer::Viewer,
        viewport::{Viewport, ViewportEvent},
    },
    events::Subscription,
    Result,
};

/// A discrete zoom slider with `+`/`-` buttons.
///
/// Positions run from `0` (most zoomed out, the largest level) to
/// `max - min` (most zoomed in); moving the handle up zooms in. Each position
/// maps to exactly one zoom level.
#[derive(Debug)]
pub struct ZoomControl {
    min_zoom_level: i32,
    max_zoom_level: i32,
    position: Rc<Cell<i32>>,
    subscription: Option<Subscription>,
}

impl ZoomControl {
    /// Creates a control whose handle sits at `zoom_level`.
    pub fn new(min_zoom_level: i32, max_zoom_level: i32, zoom_level: i32) -> Self {
        let level = zoom_level.clamp(min_zoom_level, max_zoom_level);
        Self {
            min_zoom_level,
            max_zoom_level,
            position: Rc::new(Cell::new(max_zoom_level - level)),
            subscription: None,
        }
    }

    pub fn from_config(config: &ViewerConfig, zoom_level: i32) -> Self {
        Self::new(config.min_zoom_level, config.max_zoom_level, zoom_level)
    }

    /// Keeps the handle in step with zoom changes made elsewhere
    /// (double-click, wheel, keyboard).
    pub fn attach(&mut self, viewport: &Viewport) {
        let position = Rc::clone(&self.position);
        let max = self.max_zoom_level;
        self.position.set(max - viewport.zoom_level());
        self.subscription = Some(viewport.events().subscribe(move |event| {
            if let ViewportEvent::Zoomed { zoom_level, .. } = event {
                position.set(max - *zoom_level);
            }
        }));
    }

    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn position(&self) -> i32 {
        self.position.get()
    }

    /// Highest valid handle position.
    pub fn max_position(&self) -> i32 {
        self.max_zoom_level - self.min_zoom_level
    }

    pub fn zoom_level(&self) -> i32 {
        self.level_for(self.position.get())
    }

    pub fn level_for(&self, position: i32) -> i32 {
        self.max_zoom_level - position
    }

    pub fn position_for(&self, zoom_level: i32) -> i32 {
        self.max_zoom_level - zoom_level
    }

    /// Moves the handle and zooms the viewer to match.
    pub fn set_position(&mut self, position: i32, viewer: &mut Viewer) -> Result<()> {
        let level = self.level_for(position);
        viewer.zoom_to(level)?;
        self.position.set(position);
        Ok(())
    }

    /// One level in. Returns `false` at the most zoomed-in level.
    pub fn zoom_in(&mut self, viewer: &mut Viewer) -> Result<bool> {
        self.step(1, viewer)
    }

    /// One level out. Returns `false` at the most zoomed-out level.
    pub fn zoom_out(&mut self, viewer: &mut Viewer) -> Result<bool> {
        self.step(-1, viewer)
    }

    fn step(&mut self, delta: i32, viewer: &mut Viewer) -> Result<bool> {
        let target = self.position.get() + delta;
        if !(0..=self.max_position()).contains(&target) {
            return Ok(false);
        }
        self.set_position(target, viewer)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Size;
    use crate::net::{Request, Response, Transport};
    use crate::settings::MemorySettings;
    use std::sync::Arc;

    struct NullTransport;

    impl Transport for NullTransport {
        fn submit(&self, _request: Request) {}

        fn drain(&self) -> Vec<Response> {
            Vec::new()
        }
    }

    fn viewer() -> Viewer {
        Viewer::new(
            ViewerConfig::for_testing(),
            Size::new(800.0, 600.0),
            Arc::new(NullTransport),
            Box::new(MemorySettings::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_position_maps_one_to_one() {
        let control = ZoomControl::new(8, 15, 10);
        assert_eq!(control.position(), 5);
        assert_eq!(control.zoom_level(), 10);
        assert_eq!(control.max_position(), 7);
        assert_eq!(control.level_for(0), 15);
        assert_eq!(control.level_for(7), 8);
        assert_eq!(control.position_for(12), 3);
    }

    #[test]
    fn test_set_position_zooms_viewer() {
        let mut viewer = viewer();
        let mut control = ZoomControl::from_config(viewer.config(), viewer.zoom_level());

        control.set_position(2, &mut viewer).unwrap();
        assert_eq!(viewer.zoom_level(), 13);
        assert_eq!(control.zoom_level(), 13);

        assert!(control.set_position(99, &mut viewer).is_err());
        assert_eq!(control.position(), 2);
        assert_eq!(viewer.zoom_level(), 13);
    }

    #[test]
    fn test_buttons_refuse_to_leave_bounds() {
        let mut viewer = viewer();
        viewer.zoom_to(8).unwrap();
        let mut control = ZoomControl::from_config(viewer.config(), viewer.zoom_level());
        assert!(!control.zoom_in(&mut viewer).unwrap());
        assert_eq!(viewer.zoom_level(), 8);

        assert!(control.zoom_out(&mut viewer).unwrap());
        assert_eq!(viewer.zoom_level(), 9);

        viewer.zoom_to(15).unwrap();
        control = ZoomControl::from_config(viewer.config(), 15);
        assert!(!control.zoom_out(&mut viewer).unwrap());
        assert!(control.zoom_in(&mut viewer).unwrap());
        assert_eq!(viewer.zoom_level(), 14);
    }

    #[test]
    fn test_attached_control_follows_viewer() {
        let mut viewer = viewer();
        let mut control = ZoomControl::from_config(viewer.config(), viewer.zoom_level());
        control.attach(viewer.viewport());
        assert!(control.is_attached());

        viewer.zoom_to(12).unwrap();
        assert_eq!(control.zoom_level(), 12);

        control.detach();
        viewer.zoom_to(9).unwrap();
        assert_eq!(control.zoom_level(), 12);
    }
}
