//! # heliotiles
//!
//! A tile-viewport engine for a pannable, zoomable mosaic of solar imagery.
//!
//! The engine keeps three coordinate spaces consistent (screen pixels, the
//! pan-constrained sandbox, and sun-centred heliocentric pixels), computes the
//! exact set of tile indices required for any pan/zoom state, and drives
//! per-layer tile acquisition with atomic batch replacement so the mosaic never
//! shows holes or doubled tiles while new imagery streams in.
//!
//! All I/O goes through the [`net::Transport`] seam; the core itself is
//! single-threaded and event-driven.

pub mod core;
pub mod events;
pub mod input;
pub mod layers;
pub mod net;
pub mod prelude;
pub mod settings;
pub mod traits;
pub mod ui;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{ScaleConfig, TileLoadingConfig, ViewerConfig},
    geo::{PixelBounds, Point, Size, TileCoord, VisibleRange, VisibleSet},
    viewer::Viewer,
    viewport::{Sandbox, Viewport},
};

pub use layers::{
    base::{BaseLayer, LayerTrait},
    manager::LayerManager,
    tile::{ImageMetadata, ImageSource, TileLayer},
};

pub use events::{EventChannel, Subscription};

pub use input::{events::InputEvent, handler::InputHandler};

pub use net::{Request, Response, Transport};

pub use settings::{LayerDescriptor, MemorySettings, SettingsStore};

pub use ui::controls::ZoomControl;

/// Installs an `env_logger` logger reading `RUST_LOG`, defaulting to `info`.
/// Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Maximum number of tile layers ({0}) reached")]
    LayerLimit(usize),

    #[error("Zoom level {level} outside [{min}, {max}]")]
    InvalidZoom { level: i32, min: i32, max: i32 },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Error type alias for convenience
pub type Error = ViewerError;
