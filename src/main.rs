//! earth-heightmap - Build 16-bit heightmaps from web elevation tiles.
//!
//! This binary wires the tile fetcher, assembler, encoder and on-disk cache
//! together for one clip and drives its owning context until the download
//! settles.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use earth_heightmap::{
    clip::{DownloadOrchestrator, DownloadStatus, EarthClip, OwningContext},
    config::{Cli, Command, DownloadConfig, OutputFormat, ReloadConfig},
    io::{HttpTileFetcher, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_URL_TEMPLATE},
    tile::{DiskHeightmapStore, HeightImage, TileSetAssembler},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.verbose());

    match cli.command {
        Command::Download(config) => run_download(config).await,
        Command::Reload(config) => run_reload(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "earth_heightmap=debug"
    } else {
        "earth_heightmap=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Download Command
// =============================================================================

async fn run_download(config: DownloadConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let fetcher = match HttpTileFetcher::new(
        config.url_template.clone(),
        config.access_token.clone(),
        config.request_timeout(),
    ) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create tile fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Tile: {}", config.tile);
    info!("  Resolution: {}", config.resolution);
    info!("  Cache: {}", config.cache_dir.display());
    info!("  Concurrent fetches: {}", config.max_concurrent_fetches);

    let store = DiskHeightmapStore::new(&config.cache_dir);
    let cache_path = store.path_for(&config.name);

    let mut ctx = OwningContext::new(EarthClip::new(config.name.clone()));
    let orchestrator = DownloadOrchestrator::new(
        TileSetAssembler::with_concurrency(Arc::new(fetcher), config.max_concurrent_fetches),
        store,
        ctx.handle(),
        tokio::runtime::Handle::current(),
    )
    .with_parse_mode(config.parse_mode());

    let (tx, mut rx) = oneshot::channel();
    orchestrator.download_tile(ctx.state_mut(), &config.tile, config.resolution, move |status| {
        // The receiver only goes away if main is already exiting
        let _ = tx.send(status);
    });

    let mut last_progress = String::new();
    let status = loop {
        tokio::select! {
            result = &mut rx => {
                break result.unwrap_or_else(|_| {
                    DownloadStatus::error("Download ended without reporting a status")
                });
            }
            _ = ctx.run_next() => {}
        }

        let progress = ctx.state().tile_download_progress();
        if progress != last_progress {
            info!("{}", progress);
            last_progress = progress.to_string();
        }
    };

    let clip = ctx.state();
    let mut written = None;
    if let (false, Some(image), Some(path)) = (status.is_error, clip.height_map(), &config.output) {
        match write_output(image, path).await {
            Ok(()) => written = Some(path.display().to_string()),
            Err(e) => {
                error!("Failed to write {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    match config.format {
        OutputFormat::Text => {
            if status.is_error {
                println!("✗ {}", status.error_message);
            } else {
                println!("✓ Heightmap '{}' ({}x{})", clip.name(), config.resolution, config.resolution);
                println!("  Cached at: {}", cache_path.display());
                if let Some(ref path) = written {
                    println!("  Written to: {}", path);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "name": clip.name(),
                "tile": config.tile,
                "resolution": config.resolution.width(),
                "status": status,
                "progress": clip.tile_download_progress(),
                "cache_path": cache_path.display().to_string(),
                "output": written,
            });
            println!("{:#}", json);
        }
    }

    if status.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// =============================================================================
// Reload Command
// =============================================================================

async fn run_reload(config: ReloadConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    // Reload never fetches tiles; the fetcher only satisfies the orchestrator
    let fetcher = match HttpTileFetcher::new(
        DEFAULT_URL_TEMPLATE,
        None,
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
    ) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create tile fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = DiskHeightmapStore::new(&config.cache_dir);
    let cache_path = store.path_for(&config.name);

    let mut ctx = OwningContext::new(EarthClip::new(config.name.clone()));
    let orchestrator = DownloadOrchestrator::new(
        TileSetAssembler::new(fetcher),
        store,
        ctx.handle(),
        tokio::runtime::Handle::current(),
    );

    if let Some(load) = orchestrator.reload_if_needed(ctx.state_mut()) {
        if let Err(e) = load.await {
            error!("Reload task failed: {}", e);
            return ExitCode::FAILURE;
        }
    }
    ctx.run_pending();

    let clip = ctx.state();
    let Some(image) = clip.height_map() else {
        warn!("No usable heightmap at {}", cache_path.display());
        println!("✗ No cached heightmap named '{}'", clip.name());
        return ExitCode::FAILURE;
    };

    println!("✓ Heightmap '{}' ({}x{})", clip.name(), image.width(), image.width());
    println!("  Cached at: {}", cache_path.display());

    if let Some(ref path) = config.output {
        if let Err(e) = write_output(image, path).await {
            error!("Failed to write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        println!("  Written to: {}", path.display());
    }

    ExitCode::SUCCESS
}

async fn write_output(image: &HeightImage, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, image.png()).await
}
