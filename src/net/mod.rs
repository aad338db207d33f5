//! The I/O seam of the engine.
//!
//! Layers never fetch anything themselves: they [`Transport::submit`] requests
//! and the host periodically hands completed [`Response`]s back through
//! [`crate::Viewer::process_responses`], which delivers them on the single
//! logical thread that owns all viewer state. In-flight requests are never
//! cancelled; stale completions are discarded by whoever receives them.

#[cfg(feature = "tokio-runtime")]
pub mod http;

use crate::core::geo::TileCoord;
use crate::layers::tile::types::{BatchId, ElementId, ImageMetadata};
use crate::prelude::Arc;
use crate::Result;

/// One tile image for one display element.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub layer_id: String,
    pub element: ElementId,
    /// Reset batch the tile counts towards; `None` for tiles added while panning
    pub batch: Option<BatchId>,
    pub coord: TileCoord,
    pub zoom_level: i32,
    pub url: String,
}

/// Closest-in-time image lookup for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestImageRequest {
    pub layer_id: String,
    /// Increases with every lookup the layer issues; older answers are stale
    pub generation: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Tile(TileRequest),
    ClosestImage(ClosestImageRequest),
}

impl Request {
    pub fn url(&self) -> &str {
        match self {
            Request::Tile(request) => &request.url,
            Request::ClosestImage(request) => &request.url,
        }
    }

    pub fn layer_id(&self) -> &str {
        match self {
            Request::Tile(request) => &request.layer_id,
            Request::ClosestImage(request) => &request.layer_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    Loaded(Arc<Vec<u8>>),
    /// Non-2xx status, transport error or undecodable body
    Failed(String),
}

#[derive(Debug)]
pub enum Response {
    Tile {
        request: TileRequest,
        outcome: TileOutcome,
    },
    ClosestImage {
        request: ClosestImageRequest,
        result: Result<ImageMetadata>,
    },
}

/// Executes requests somewhere else and hands back their completions.
pub trait Transport: Send + Sync {
    /// Starts `request`; must not block.
    fn submit(&self, request: Request);

    /// Every completion that arrived since the last call, in arrival order.
    fn drain(&self) -> Vec<Response>;
}
