//! Coordinate math: screen pixels, sandbox-relative offsets, heliocentric
//! pixels and tile indices.
//!
//! Heliocentric pixels are measured from the sun's centre at the current zoom
//! level, x growing rightwards and y growing downwards. Tile `(0, 0)` has its
//! top-left corner on the sun's centre, so tile indices are signed.

use crate::core::constants::RSUN_ARCSECONDS;
use crate::prelude::{Arc, HashSet};
use serde::{Deserialize, Serialize};

/// Represents a point in screen, sandbox or heliocentric pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 && self.height <= 0.0
    }
}

/// Edges of a rectangle in heliocentric pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelBounds {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl PixelBounds {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            0.5 * (self.left + self.right),
            0.5 * (self.top + self.bottom),
        )
    }

    /// Grows the rectangle by `margin` pixels on every side.
    pub fn expand(&self, margin: f64) -> PixelBounds {
        PixelBounds {
            top: self.top - margin,
            left: self.left - margin,
            bottom: self.bottom + margin,
            right: self.right + margin,
        }
    }
}

/// Signed tile index; the composite key for every sparse tile map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Top-left corner of the tile, relative to the layer's sun-centred origin.
    pub fn pixel_origin(&self, tile_size: u32) -> Point {
        Point::new(
            self.x as f64 * tile_size as f64,
            self.y as f64 * tile_size as f64,
        )
    }
}

/// Inclusive range of tile indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub x_start: i32,
    pub x_end: i32,
    pub y_start: i32,
    pub y_end: i32,
}

impl VisibleRange {
    pub fn new(x_start: i32, x_end: i32, y_start: i32, y_end: i32) -> Self {
        Self {
            x_start,
            x_end,
            y_start,
            y_end,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, -1, 0, -1)
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        (self.x_start..=self.x_end).contains(&coord.x) && (self.y_start..=self.y_end).contains(&coord.y)
    }

    pub fn len(&self) -> usize {
        let columns = (self.x_end - self.x_start + 1).max(0) as usize;
        let rows = (self.y_end - self.y_start + 1).max(0) as usize;
        columns * rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column-major iteration, matching the order tiles are requested in.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.x_start..=self.x_end)
            .flat_map(move |x| (self.y_start..=self.y_end).map(move |y| TileCoord::new(x, y)))
    }
}

impl Default for VisibleRange {
    fn default() -> Self {
        Self::empty()
    }
}

/// The published set of tile cells every layer consults. Cloning is cheap and
/// the contents never change after publication.
#[derive(Debug, Clone, Default)]
pub struct VisibleSet {
    range: VisibleRange,
    cells: Arc<HashSet<TileCoord>>,
}

impl VisibleSet {
    pub fn from_range(range: VisibleRange) -> Self {
        let cells: HashSet<TileCoord> = range.iter().collect();
        Self {
            range,
            cells: Arc::new(cells),
        }
    }

    pub fn range(&self) -> VisibleRange {
        self.range
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.cells.contains(coord)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Visible cells in deterministic column-major order.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.range.iter().filter(move |coord| self.cells.contains(coord))
    }
}

/// Heliocentric edges of the viewport: the top-left corner sits at
/// `-(sandbox_offset + container_offset)`.
pub fn heliocentric_viewport_bounds(
    sandbox_offset: Point,
    container_offset: Point,
    viewport: Size,
) -> PixelBounds {
    let left = -(sandbox_offset.x + container_offset.x);
    let top = -(sandbox_offset.y + container_offset.y);
    PixelBounds {
        top,
        left,
        bottom: top + viewport.height,
        right: left + viewport.width,
    }
}

/// Tile indices needed to cover `bounds`. Every edge is pushed outward to the
/// next tile multiple (an already-aligned edge still gains a full tile), then
/// converted to indices; the end indices are inclusive.
pub fn display_range(bounds: &PixelBounds, tile_size: u32) -> VisibleRange {
    let ts = tile_size as f64;
    let top = bounds.top - ts - bounds.top % ts;
    let left = bounds.left - ts - bounds.left % ts;
    let bottom = bounds.bottom + ts - bounds.bottom % ts;
    let right = bounds.right + ts - bounds.right % ts;

    VisibleRange {
        x_start: (left / ts).round() as i32,
        x_end: (right / ts).round() as i32 - 1,
        y_start: (top / ts).round() as i32,
        y_end: (bottom / ts).round() as i32 - 1,
    }
}

/// Factor that re-expresses a grid of `native_scale` arcsec/px in pixels of
/// `reference_scale` arcsec/px.
pub fn relative_scale(native_scale: f64, reference_scale: f64) -> f64 {
    native_scale / reference_scale
}

/// Tiles that can hold image data for an image of `relative_size` pixels
/// centred on the origin. At least two tiles and always an even count per axis.
pub fn valid_tile_range(relative_size: Size, tile_size: u32) -> VisibleRange {
    let ts = tile_size as f64;
    let tiles_along = |extent: f64| {
        let mut count = ((extent / ts).ceil() as i32).max(2);
        if count % 2 != 0 {
            count += 1;
        }
        count
    };
    let nx = tiles_along(relative_size.width);
    let ny = tiles_along(relative_size.height);
    VisibleRange::new(-nx / 2, nx / 2 - 1, -ny / 2, ny / 2 - 1)
}

/// Heliocentric pixel position converted to arcseconds; y is flipped so solar
/// north is positive.
pub fn to_arcseconds(heliocentric: Point, image_scale: f64) -> Point {
    Point::new(
        (heliocentric.x * image_scale).round(),
        -(heliocentric.y * image_scale).round(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarCoord {
    /// Distance from disk centre in solar radii
    pub r: f64,
    /// Position angle in degrees, counter-clockwise from solar west, in [0, 360)
    pub theta: f64,
}

pub fn to_polar(arcseconds: Point) -> PolarCoord {
    let r = (arcseconds.x * arcseconds.x + arcseconds.y * arcseconds.y).sqrt();
    let theta = arcseconds.y.atan2(arcseconds.x).to_degrees().rem_euclid(360.0);
    PolarCoord {
        r: r / RSUN_ARCSECONDS,
        theta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(left: f64, top: f64, right: f64, bottom: f64) -> PixelBounds {
        PixelBounds {
            top,
            left,
            bottom,
            right,
        }
    }

    #[test]
    fn test_centered_600px_viewport_needs_four_tiles() {
        let b = heliocentric_viewport_bounds(
            Point::new(300.0, 300.0),
            Point::new(0.0, 0.0),
            Size::new(600.0, 600.0),
        );
        assert_eq!(b, bounds(-300.0, -300.0, 300.0, 300.0));

        let range = display_range(&b, 512);
        assert_eq!(range, VisibleRange::new(-1, 0, -1, 0));
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_display_range_covers_bounds() {
        let ts = 512.0;
        let samples = [
            bounds(-600.0, -1300.0, 600.0, -200.0),
            bounds(100.0, 100.0, 700.0, 900.0),
            bounds(-512.0, 0.0, 512.0, 1024.0),
            bounds(-1700.5, -33.25, -900.5, 566.75),
        ];

        for b in samples {
            let r = display_range(&b, 512);
            // union of cells covers the bounds
            assert!(r.x_start as f64 * ts <= b.left, "{:?} -> {:?}", b, r);
            assert!((r.x_end + 1) as f64 * ts >= b.right, "{:?} -> {:?}", b, r);
            assert!(r.y_start as f64 * ts <= b.top, "{:?} -> {:?}", b, r);
            assert!((r.y_end + 1) as f64 * ts >= b.bottom, "{:?} -> {:?}", b, r);
            // expansion is at most one tile beyond the tight cover
            assert!(r.x_start >= (b.left / ts).floor() as i32 - 1);
            assert!(r.x_end <= (b.right / ts).ceil() as i32);
            assert!(r.y_start >= (b.top / ts).floor() as i32 - 1);
            assert!(r.y_end <= (b.bottom / ts).ceil() as i32);
        }
    }

    #[test]
    fn test_visible_set_iteration_is_column_major() {
        let set = VisibleSet::from_range(VisibleRange::new(-1, 0, 2, 3));
        let cells: Vec<_> = set.iter().collect();
        assert_eq!(
            cells,
            vec![
                TileCoord::new(-1, 2),
                TileCoord::new(-1, 3),
                TileCoord::new(0, 2),
                TileCoord::new(0, 3),
            ]
        );
        assert!(set.contains(&TileCoord::new(0, 3)));
        assert!(!set.contains(&TileCoord::new(1, 3)));
    }

    #[test]
    fn test_valid_tile_range_is_even_and_centered() {
        assert_eq!(
            valid_tile_range(Size::new(1024.0, 1024.0), 512),
            VisibleRange::new(-1, 0, -1, 0)
        );
        // 3 tiles rounds up to 4
        assert_eq!(
            valid_tile_range(Size::new(1500.0, 100.0), 512),
            VisibleRange::new(-2, 1, -1, 0)
        );
    }

    #[test]
    fn test_relative_scale() {
        assert_eq!(relative_scale(2.63, 2.63), 1.0);
        assert_eq!(relative_scale(2.63, 5.26), 0.5);
        assert_eq!(relative_scale(0.6, 0.3), 2.0);
    }

    #[test]
    fn test_mouse_coordinates() {
        let arcsec = to_arcseconds(Point::new(100.0, -50.0), 2.63);
        assert_eq!(arcsec, Point::new(263.0, 132.0));

        let polar = to_polar(Point::new(0.0, RSUN_ARCSECONDS));
        assert!((polar.r - 1.0).abs() < 1e-12);
        assert!((polar.theta - 90.0).abs() < 1e-9);

        let west = to_polar(Point::new(0.0, -RSUN_ARCSECONDS * 2.0));
        assert!((west.r - 2.0).abs() < 1e-12);
        assert!((west.theta - 270.0).abs() < 1e-9);
    }
}
