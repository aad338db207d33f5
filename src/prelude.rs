//! Prelude module for common heliotiles types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use heliotiles::prelude::*;`

pub use crate::core::{
    config::{Endpoints, ScaleConfig, TileLoadingConfig, ViewerConfig},
    geo::{PixelBounds, Point, PolarCoord, Size, TileCoord, VisibleRange, VisibleSet},
    viewer::{Viewer, ZoomGesture},
    viewport::{Sandbox, Viewport, ViewportEvent},
};

pub use crate::layers::{
    base::{LayerContext, LayerExtent, LayerProperties, LayerTrait, LayerType},
    manager::LayerManager,
    tile::{
        ImageMetadata, ImageSource, LayerEvent, Tile, TileBatch, TileLayer, TileLayerOptions,
        TileSource, TileState,
    },
};

pub use crate::events::{EventChannel, Subscription};

pub use crate::input::{
    events::{EventHandled, InputEvent, KeyCode, KeyModifiers},
    handler::InputHandler,
};

pub use crate::net::{Request, Response, TileOutcome, Transport};

#[cfg(feature = "tokio-runtime")]
pub use crate::net::http::HttpTransport;

pub use crate::settings::{LayerDescriptor, MemorySettings, SettingsStore};

pub use crate::ui::controls::ZoomControl;

pub use crate::{Error as ViewerError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
