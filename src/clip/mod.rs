//! Clip layer: caller-visible state and download orchestration.
//!
//! - [`EarthClip`]: The object heightmaps are installed into, with progress
//!   text and phase
//! - [`OwningContext`] / [`OwnerHandle`]: The single context allowed to
//!   mutate clips, and the handle background work uses to reach it
//! - [`DownloadOrchestrator`]: Starts downloads and cache reloads and reports
//!   a [`DownloadStatus`] per request
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use earth_heightmap::clip::{DownloadOrchestrator, EarthClip, OwningContext};
//! use earth_heightmap::io::{HttpTileFetcher, DEFAULT_URL_TEMPLATE};
//! use earth_heightmap::tile::{MemoryHeightmapStore, TileResolution, TileSetAssembler};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ctx = OwningContext::new(EarthClip::new("alps"));
//! let fetcher = HttpTileFetcher::new(
//!     DEFAULT_URL_TEMPLATE,
//!     Some("token".to_string()),
//!     Duration::from_secs(30),
//! )?;
//! let orchestrator = DownloadOrchestrator::new(
//!     TileSetAssembler::new(fetcher),
//!     MemoryHeightmapStore::new(),
//!     ctx.handle(),
//!     tokio::runtime::Handle::current(),
//! );
//!
//! orchestrator.download_tile(ctx.state_mut(), "1066, 720, 11", TileResolution::Px2048, |status| {
//!     println!("done: {:?}", status);
//! });
//! ctx.run_until(|clip| clip.phase().is_terminal()).await;
//! # Ok(())
//! # }
//! ```

mod orchestrator;
mod owner;
mod state;

pub use orchestrator::{DownloadOrchestrator, DownloadStatus};
pub use owner::{OwnerHandle, OwningContext};
pub use state::{DownloadPhase, EarthClip, SupersedePolicy, START_PROGRESS_TEXT};
