use heliotiles::prelude::*;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Loads a viewer, resolves its layers and waits until every layer's tiles
/// are in. Usage: `heliotiles-app [config.json]`.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    heliotiles::init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => ViewerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ViewerConfig::default(),
    };

    let transport = Arc::new(HttpTransport::current());
    let mut viewer = Viewer::new(
        config,
        Size::new(1024.0, 768.0),
        transport,
        Box::new(MemorySettings::new()),
    )?;

    if viewer.restore_layers()? == 0 {
        viewer.add_tile_layer(
            ImageSource::new("SOHO", "EIT", "EIT", "171"),
            TileLayerOptions::default(),
        )?;
        viewer.add_tile_layer(
            ImageSource::new("SOHO", "LASCO", "C2", "white-light"),
            TileLayerOptions {
                opacity_group: 2,
                ..TileLayerOptions::default()
            },
        )?;
    }

    let started = Instant::now();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted");
                break;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        viewer.process_responses();
        if settled(&viewer) {
            log::info!("all layers settled after {:?}", started.elapsed());
            break;
        }
        if started.elapsed() > SETTLE_TIMEOUT {
            log::warn!("giving up after {:?}", SETTLE_TIMEOUT);
            break;
        }
    }

    report(&viewer);
    Ok(())
}

fn settled(viewer: &Viewer) -> bool {
    viewer.layers().tile_layers().all(|layer| {
        !layer.is_loading_metadata()
            && layer.pending_batches() == 0
            && layer.tiles().all(|tile| tile.state.is_complete())
    })
}

fn report(viewer: &Viewer) {
    let viewport = viewer.viewport();
    log::info!(
        "zoom level {} ({:.3}\"/px), sandbox {}x{}, visible {:?}",
        viewer.zoom_level(),
        viewport.image_scale(),
        viewport.sandbox().width(),
        viewport.sandbox().height(),
        viewport.visible_range()
    );

    for layer in viewer.layers().tile_layers() {
        let loaded = layer.tiles().filter(|tile| tile.is_loaded()).count();
        match layer.image() {
            Some(image) => log::info!(
                "{} [{}]: image {} ({}), {}/{} tiles loaded, opacity {:.2}",
                layer.id(),
                layer.name(),
                image.image_id,
                image.name,
                loaded,
                layer.attached_count(),
                layer.opacity()
            ),
            None => log::info!(
                "{} [{}]: no image ({} failed lookups)",
                layer.id(),
                layer.name(),
                layer.metadata_failures()
            ),
        }
    }
}
