//! Everything placed inside the moving container.

pub mod base;
pub mod manager;
pub mod tile;

pub use base::{BaseLayer, LayerContext, LayerExtent, LayerId, LayerProperties, LayerTrait, LayerType};
pub use manager::LayerManager;
pub use tile::TileLayer;
