use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::Lazy;

use super::{ClosestImageRequest, Request, Response, TileOutcome, TileRequest, Transport};
use crate::layers::tile::types::ImageMetadata;
use crate::prelude::{Arc, Duration};
use crate::{Error, Result};

/// Shared async HTTP client for tiles and metadata lookups
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("heliotiles/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// [`Transport`] backed by reqwest on a tokio runtime. Completions are queued
/// on a channel until the owner drains them.
pub struct HttpTransport {
    runtime: tokio::runtime::Handle,
    result_tx: Sender<Response>,
    result_rx: Receiver<Response>,
}

impl HttpTransport {
    /// Spawns requests on `runtime`.
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            runtime,
            result_tx,
            result_rx,
        }
    }

    /// Uses the runtime the caller is running on.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }

    async fn fetch_tile(request: &TileRequest) -> TileOutcome {
        let response = match HTTP_CLIENT.get(&request.url).send().await {
            Ok(response) => response,
            Err(e) => return TileOutcome::Failed(e.to_string()),
        };

        if !response.status().is_success() {
            return TileOutcome::Failed(format!(
                "HTTP {} for tile {:?}",
                response.status(),
                request.coord
            ));
        }

        match response.bytes().await {
            Ok(bytes) => TileOutcome::Loaded(Arc::new(bytes.to_vec())),
            Err(e) => TileOutcome::Failed(e.to_string()),
        }
    }

    async fn fetch_closest_image(request: &ClosestImageRequest) -> Result<ImageMetadata> {
        let response = HTTP_CLIENT.get(&request.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }
        let body = response.text().await?;
        ImageMetadata::from_json(&body)
    }
}

impl Transport for HttpTransport {
    fn submit(&self, request: Request) {
        let result_tx = self.result_tx.clone();

        log::debug!("fetching {}", request.url());

        self.runtime.spawn(async move {
            let response = match request {
                Request::Tile(request) => {
                    let outcome = Self::fetch_tile(&request).await;
                    Response::Tile { request, outcome }
                }
                Request::ClosestImage(request) => {
                    let result = Self::fetch_closest_image(&request).await;
                    Response::ClosestImage { request, result }
                }
            };
            // receiver gone means the transport was dropped
            let _ = result_tx.send(response);
        });
    }

    fn drain(&self) -> Vec<Response> {
        self.result_rx.try_iter().collect()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("queued", &self.result_rx.len())
            .finish()
    }
}
