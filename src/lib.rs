//! # earth-heightmap
//!
//! Builds 16-bit heightmaps from web elevation tiles.
//!
//! Given one map tile `"X, Y, Zoom"` and a target resolution, the library
//! fetches the `2^k × 2^k` grid of sub-tiles one zoom level down per
//! refinement step, stitches them into a square height grid, encodes it as a
//! single-channel 16-bit image and installs it on the clip that asked for it.
//!
//! ## Features
//!
//! - **Concurrent fetching**: One independent request per sub-tile, bounded by a semaphore
//! - **Order-independent assembly**: Tiles land at their `(col, row)` offset whatever order they arrive in
//! - **Elevation decoding**: Terrain-RGB and 16-bit grayscale PNG tiles
//! - **Owner-context delivery**: Progress, results and status callbacks are applied on one owning context
//! - **Named cache**: Finished heightmaps are cached in memory or on disk and can be reloaded
//!
//! ## Architecture
//!
//! - [`io`] - Tile fetcher trait and HTTP implementation
//! - [`mod@format`] - Elevation tile decoding
//! - [`tile`] - Addressing, assembly, encoding and heightmap stores
//! - [`clip`] - Clip state, owning context and download orchestration
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use earth_heightmap::{
//!     DiskHeightmapStore, DownloadOrchestrator, EarthClip, HttpTileFetcher, OwningContext,
//!     TileResolution, TileSetAssembler, DEFAULT_URL_TEMPLATE,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = HttpTileFetcher::new(
//!         DEFAULT_URL_TEMPLATE,
//!         std::env::var("MAPBOX_TOKEN").ok(),
//!         Duration::from_secs(30),
//!     )?;
//!
//!     let mut ctx = OwningContext::new(EarthClip::new("everest"));
//!     let orchestrator = DownloadOrchestrator::new(
//!         TileSetAssembler::new(fetcher),
//!         DiskHeightmapStore::new(".heightmaps"),
//!         ctx.handle(),
//!         tokio::runtime::Handle::current(),
//!     );
//!
//!     orchestrator.download_tile(ctx.state_mut(), "3036, 1718, 12", TileResolution::Px1024, |status| {
//!         if status.is_error {
//!             eprintln!("{}", status.error_message);
//!         }
//!     });
//!     ctx.run_until(|clip| clip.phase().is_terminal()).await;
//!
//!     println!("{}", ctx.state().tile_download_progress());
//!     Ok(())
//! }
//! ```

pub mod clip;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod tile;

// Re-export commonly used types
pub use clip::{
    DownloadOrchestrator, DownloadPhase, DownloadStatus, EarthClip, OwnerHandle, OwningContext,
    SupersedePolicy,
};
pub use config::{Cli, Command, DownloadConfig, OutputFormat, ReloadConfig};
pub use error::{DownloadError, EncodeError, FetchError, ParseError, StoreError};
pub use format::{decode_elevation_tile, ElevationEncoding};
pub use io::{HttpTileFetcher, SubTileResult, TileFetcher, DEFAULT_URL_TEMPLATE};
pub use tile::{
    DiskHeightmapStore, DownloadProgress, HeightEncoder, HeightImage, HeightmapStore,
    MemoryHeightmapStore, ParseMode, SubTileAddress, TileCoordinate, TileResolution,
    TileSetAssembler, TileSetResponse,
};
