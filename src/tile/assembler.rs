//! Tile set assembly.
//!
//! [`TileSetAssembler`] fans out one fetch per sub-tile of a refined
//! [`TileCoordinate`] and stitches the decoded samples into a single
//! row-major buffer.
//!
//! # Completion Handling
//!
//! Fetches run as independent tasks in a [`JoinSet`]. Completions are
//! consumed one at a time by the assembling task, which is the only writer of
//! the progress counters and the output buffer. Each tile is copied to the
//! offset given by its `(col, row)`, so arrival order does not matter.
//!
//! ```text
//!   fetch (0,0) ──┐
//!   fetch (1,0) ──┤   join_next()   ┌──────────────────────┐
//!   fetch (0,1) ──┼───────────────► │ progress += 1        │
//!   fetch (1,1) ──┘  (any order)    │ copy rows at offset  │
//!                                   └──────────────────────┘
//! ```
//!
//! The first failure poisons the set: no further tiles are copied, remaining
//! fetches are still allowed to settle (progress keeps counting), and the
//! response carries the first error seen instead of the buffer.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{DownloadError, FetchError};
use crate::format::decode_elevation_tile;
use crate::io::TileFetcher;

use super::coordinate::{SubTileAddress, TileCoordinate, TILE_PIXELS};

/// Default cap on concurrently running fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

// =============================================================================
// Progress
// =============================================================================

/// Number of sub-tiles settled so far out of the total.
///
/// `tiles_downloaded` counts successes and failures alike and never
/// decreases; `total_tiles` is fixed when the set is fanned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub tiles_downloaded: usize,
    pub total_tiles: usize,
}

impl DownloadProgress {
    pub fn new(total_tiles: usize) -> Self {
        Self {
            tiles_downloaded: 0,
            total_tiles,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.tiles_downloaded >= self.total_tiles
    }
}

impl fmt::Display for DownloadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Completed: {}/{}",
            self.tiles_downloaded, self.total_tiles
        )
    }
}

// =============================================================================
// Response
// =============================================================================

/// Terminal outcome of assembling one tile set.
#[derive(Debug)]
pub enum TileSetResponse {
    /// Every sub-tile arrived; `height_data.len() == pixels_per_row²`.
    Success {
        pixels_per_row: u32,
        height_data: Vec<u16>,
    },
    /// At least one sub-tile failed. `error` is the first one observed.
    Failure {
        error: DownloadError,
        failed_tiles: usize,
    },
}

impl TileSetResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, TileSetResponse::Success { .. })
    }

    /// Human-readable failure message, empty on success.
    pub fn error_message(&self) -> String {
        match self {
            TileSetResponse::Success { .. } => String::new(),
            TileSetResponse::Failure { error, .. } => error.to_string(),
        }
    }

    /// Convert into `(pixels_per_row, samples)` or the first error.
    pub fn into_result(self) -> Result<(u32, Vec<u16>), DownloadError> {
        match self {
            TileSetResponse::Success {
                pixels_per_row,
                height_data,
            } => Ok((pixels_per_row, height_data)),
            TileSetResponse::Failure { error, .. } => Err(error),
        }
    }
}

// =============================================================================
// Assembler
// =============================================================================

/// Fetches and stitches the sub-tiles of a coordinate.
pub struct TileSetAssembler<F> {
    fetcher: Arc<F>,
    limiter: Arc<Semaphore>,
}

impl<F> Clone for TileSetAssembler<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<F: TileFetcher + 'static> TileSetAssembler<F> {
    /// Create an assembler with the default fetch concurrency.
    pub fn new(fetcher: F) -> Self {
        Self::with_concurrency(Arc::new(fetcher), DEFAULT_MAX_CONCURRENT_FETCHES)
    }

    /// Create an assembler that runs at most `max_concurrent` fetches at once.
    pub fn with_concurrency(fetcher: Arc<F>, max_concurrent: usize) -> Self {
        Self {
            fetcher,
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Fetch every sub-tile of `coordinate` and stitch the result.
    ///
    /// `on_progress` is called once per settled sub-tile, in settle order,
    /// with a monotonically increasing count. The last call always reports
    /// `tiles_downloaded == total_tiles`.
    pub async fn assemble<P>(&self, coordinate: TileCoordinate, mut on_progress: P) -> TileSetResponse
    where
        P: FnMut(DownloadProgress) + Send,
    {
        let pixels_per_row = coordinate.pixels_per_row();
        let mut progress = DownloadProgress::new(coordinate.total_tiles());

        debug!(
            coordinate = %coordinate,
            total_tiles = progress.total_tiles,
            source = self.fetcher.identifier(),
            "Fanning out tile fetches"
        );

        let mut tasks = JoinSet::new();
        for tile in coordinate.sub_tiles() {
            let fetcher = Arc::clone(&self.fetcher);
            let limiter = Arc::clone(&self.limiter);
            tasks.spawn(async move {
                let result = fetch_and_decode(fetcher.as_ref(), &limiter, tile).await;
                (tile, result)
            });
        }

        let mut buffer = vec![0u16; pixels_per_row as usize * pixels_per_row as usize];
        let mut first_error: Option<DownloadError> = None;
        let mut failed_tiles = 0;

        while let Some(joined) = tasks.join_next().await {
            progress.tiles_downloaded += 1;

            let outcome = match joined {
                Ok((tile, Ok(samples))) => Ok((tile, samples)),
                Ok((tile, Err(source))) => Err(DownloadError::Fetch {
                    col: tile.col,
                    row: tile.row,
                    source,
                }),
                Err(join_err) => Err(DownloadError::TaskFailed(join_err.to_string())),
            };

            match outcome {
                Ok((tile, samples)) => {
                    if first_error.is_none() {
                        place_tile(&mut buffer, pixels_per_row, tile, &samples);
                    }
                }
                Err(error) => {
                    failed_tiles += 1;
                    warn!(
                        error = %error,
                        tiles_downloaded = progress.tiles_downloaded,
                        total_tiles = progress.total_tiles,
                        "Sub-tile failed"
                    );
                    first_error.get_or_insert(error);
                }
            }

            on_progress(progress);
        }

        match first_error {
            Some(error) => TileSetResponse::Failure {
                error,
                failed_tiles,
            },
            None => TileSetResponse::Success {
                pixels_per_row,
                height_data: buffer,
            },
        }
    }
}

async fn fetch_and_decode<F: TileFetcher + ?Sized>(
    fetcher: &F,
    limiter: &Semaphore,
    tile: SubTileAddress,
) -> Result<Vec<u16>, FetchError> {
    let permit = limiter
        .acquire()
        .await
        .map_err(|e| FetchError::TaskFailed(e.to_string()))?;

    let payload = fetcher.fetch(tile).await?;
    drop(permit);

    // Decoding is CPU-bound; keep it off the async workers
    tokio::task::spawn_blocking(move || decode_elevation_tile(&payload, TILE_PIXELS))
        .await
        .map_err(|e| FetchError::TaskFailed(e.to_string()))?
}

/// Copy one tile's rows into the stitched buffer at its `(col, row)` offset.
pub fn place_tile(buffer: &mut [u16], pixels_per_row: u32, tile: SubTileAddress, samples: &[u16]) {
    let stride = pixels_per_row as usize;
    let size = TILE_PIXELS as usize;
    let x0 = tile.col as usize * size;
    let y0 = tile.row as usize * size;

    for (r, src) in samples.chunks_exact(size).take(size).enumerate() {
        let start = (y0 + r) * stride + x0;
        buffer[start..start + size].copy_from_slice(src);
    }
}

// =============================================================================
// Tests
// =============================================================================
