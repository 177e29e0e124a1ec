//! Tile pipeline layer.
//!
//! This module covers everything between a tile address and a finished
//! heightmap: addressing, fetching and stitching sub-tiles, encoding the
//! stitched grid, and caching the result by name.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        TileCoordinate ("X, Y, Zoom")    │
//! └────────────────────┬────────────────────┘
//!                      │ sub_tiles()
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            TileSetAssembler             │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ TileFetcher  │  │ elevation       │  │
//! │  │ (one request │  │ decode + place  │  │
//! │  │  per tile)   │  │ at (col, row)   │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ Vec<u16>, pixels_per_row²
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   HeightEncoder → HeightImage (PNG16)   │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   HeightmapStore (memory LRU / disk)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCoordinate`]: Tile address and zoom-in refinement depth
//! - [`TileSetAssembler`]: Concurrent fetch and row-major stitching with progress
//! - [`HeightEncoder`]: Builds a 16-bit single-channel [`HeightImage`]
//! - [`HeightmapStore`]: Load/store heightmaps by name
//!
//! # Example
//!
//! ```
//! use earth_heightmap::tile::{TileCoordinate, TileResolution};
//!
//! let coord = TileCoordinate::parse(" 3, 5, 4 ")
//!     .unwrap()
//!     .with_resolution(TileResolution::Px2048);
//!
//! assert_eq!(coord.total_tiles(), 16);
//! assert_eq!(coord.pixels_per_row(), 2048);
//! ```

mod assembler;
mod cache;
mod coordinate;
mod disk_store;
mod encoder;

pub use assembler::{
    place_tile, DownloadProgress, TileSetAssembler, TileSetResponse,
    DEFAULT_MAX_CONCURRENT_FETCHES,
};
pub use cache::{HeightmapStore, MemoryHeightmapStore, DEFAULT_HEIGHTMAP_CACHE_CAPACITY};
pub use coordinate::{
    ParseMode, SubTileAddress, TileCoordinate, TileResolution, MAX_ZOOM_IN_LEVELS, TILE_PIXELS,
};
pub use disk_store::{DiskHeightmapStore, DEFAULT_CACHE_DIR};
pub use encoder::{HeightBuffer, HeightEncoder, HeightImage, MAX_IMAGE_WIDTH};
