//! Core constants derived from the solar viewer's defaults.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 512;

/// Image scale (arcseconds per pixel) at [`BASE_ZOOM_LEVEL`]; the native
/// resolution of an EIT image.
pub const BASE_IMAGE_SCALE: f64 = 2.63;

/// Zoom level at which imagery is displayed at [`BASE_IMAGE_SCALE`].
pub const BASE_ZOOM_LEVEL: i32 = 10;

/// Most zoomed-in level the zoom control will offer.
pub const MIN_ZOOM_LEVEL: i32 = 8;

/// Most zoomed-out level the zoom control will offer.
pub const MAX_ZOOM_LEVEL: i32 = 15;

/// Prefetch margin (pixels) around the physical viewport.
pub const DEFAULT_PREFETCH: u32 = 0;

/// Upper bound on simultaneously loaded tile layers.
pub const MAX_TILE_LAYERS: usize = 5;

/// Apparent solar radius in arcseconds, used for polar mouse coordinates.
pub const RSUN_ARCSECONDS: f64 = 959.705;

/// Only every n-th drag event moves the viewport.
pub const DRAG_UPDATE_THROTTLE: u32 = 3;

/// Pixels the viewport moves per arrow-key press.
pub const KEYBOARD_PAN_STEP: f64 = 20.0;

/// Numeric tolerance when comparing image scales.
pub const SCALE_EPSILON: f64 = 1e-9;
