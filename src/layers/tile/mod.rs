//! Tile layers: one imaging source, resolved to the image closest to the
//! observation time and shown as a sparse grid of tiles that is replaced
//! batch by batch.

pub mod layer;
pub mod source;
pub mod types;

pub use layer::{LayerEvent, MetadataUpdate, TileLayer};
pub use source::{closest_image_url, HelioviewerTileSource, ImageSource, TileSource};
pub use types::{
    BatchId, BatchProgress, ElementId, ImageMetadata, Placeholder, Tile, TileBatch,
    TileLayerOptions, TileState,
};
