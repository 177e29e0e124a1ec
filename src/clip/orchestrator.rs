//! Download orchestration for an [`EarthClip`].
//!
//! [`DownloadOrchestrator`] is the entry point callers use. It validates the
//! tile string on the calling context, then runs the pipeline in the
//! background:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     DownloadOrchestrator                       │
//! │                                                                │
//! │  download_tile()   (owning context)                            │
//! │    1. parse "X, Y, Zoom"      ── error ──► callback(error)     │
//! │    2. generation += 1, progress = "Start downloading tiles"    │
//! │    3. spawn pipeline ─────────────┐                            │
//! │                                   ▼   (background)             │
//! │              TileSetAssembler ── progress ──► run_on_owner     │
//! │                     │                                          │
//! │                     ├── failure ──────────► run_on_owner       │
//! │                     ▼                         callback(error)  │
//! │               HeightEncoder                                    │
//! │                     ▼                                          │
//! │               run_on_owner: install                            │
//! │                     ▼   (only if installed)                    │
//! │           HeightmapStore::store_by_name (failure only logged)  │
//! │                     ▼                                          │
//! │               run_on_owner: callback(success)                  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status callback fires exactly once per accepted request, always on the
//! owning context. The one exception is an owning context that has been
//! dropped: the result and the callback are then logged and dropped unrun,
//! and nothing is cached.

use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::io::TileFetcher;
use crate::tile::{
    HeightEncoder, HeightImage, HeightmapStore, ParseMode, TileCoordinate, TileResolution,
    TileSetAssembler,
};

use super::owner::OwnerHandle;
use super::state::{DownloadPhase, EarthClip};

// =============================================================================
// Download Status
// =============================================================================

/// Outcome reported to the caller's completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DownloadStatus {
    pub is_error: bool,
    pub error_message: String,
}

impl DownloadStatus {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            error_message: message.into(),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs tile downloads and cache reloads for clips on one owning context.
///
/// # Type Parameters
///
/// * `F` - The tile fetcher (e.g. [`HttpTileFetcher`](crate::io::HttpTileFetcher))
/// * `C` - The heightmap store
pub struct DownloadOrchestrator<F, C> {
    assembler: TileSetAssembler<F>,
    encoder: HeightEncoder,
    store: Arc<C>,
    owner: OwnerHandle<EarthClip>,
    runtime: Handle,
    parse_mode: ParseMode,
}

impl<F, C> DownloadOrchestrator<F, C>
where
    F: TileFetcher + 'static,
    C: HeightmapStore + 'static,
{
    /// Create an orchestrator that spawns background work on `runtime` and
    /// delivers results through `owner`.
    pub fn new(
        assembler: TileSetAssembler<F>,
        store: C,
        owner: OwnerHandle<EarthClip>,
        runtime: Handle,
    ) -> Self {
        Self {
            assembler,
            encoder: HeightEncoder::new(),
            store: Arc::new(store),
            owner,
            runtime,
            parse_mode: ParseMode::default(),
        }
    }

    pub fn with_encoder(mut self, encoder: HeightEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn store(&self) -> &Arc<C> {
        &self.store
    }

    pub fn assembler(&self) -> &TileSetAssembler<F> {
        &self.assembler
    }

    /// Start downloading the heightmap for `raw_coordinate` into `clip`.
    ///
    /// Must be called on the owning context, with the clip it owns. Returns
    /// the generation assigned to the request, or `None` if the coordinate
    /// did not parse; in that case `callback` has already been called with
    /// the parse error and nothing was spawned.
    ///
    /// Otherwise `callback` runs exactly once, on the owning context, after
    /// the heightmap is installed and cached or the download failed. If the
    /// owning context is dropped first, `callback` is dropped without running
    /// since no owner remains to observe the status.
    pub fn download_tile<CB>(
        &self,
        clip: &mut EarthClip,
        raw_coordinate: &str,
        resolution: TileResolution,
        callback: CB,
    ) -> Option<u64>
    where
        CB: FnOnce(DownloadStatus) + Send + 'static,
    {
        let coordinate = match TileCoordinate::parse_with_mode(raw_coordinate, self.parse_mode) {
            Ok(coordinate) => coordinate.with_resolution(resolution),
            Err(e) => {
                let error = DownloadError::from(e);
                warn!(clip = clip.name(), input = raw_coordinate, error = %error, "Rejected download");
                clip.reject_request();
                callback(DownloadStatus::error(error.to_string()));
                return None;
            }
        };

        let generation = clip.begin_download();
        info!(
            clip = clip.name(),
            generation,
            coordinate = %coordinate,
            resolution = coordinate.pixels_per_row(),
            tiles = coordinate.total_tiles(),
            "Starting tile download"
        );

        let pipeline = Pipeline {
            assembler: self.assembler.clone(),
            encoder: self.encoder,
            store: Arc::clone(&self.store),
            owner: self.owner.clone(),
            name: Arc::from(clip.name()),
            generation,
        };
        self.runtime.spawn(pipeline.run(coordinate, callback));

        Some(generation)
    }

    /// Reinstall the clip's cached heightmap, once per activation cycle.
    ///
    /// Returns the load task, or `None` if this cycle already reloaded. A
    /// loaded heightmap is installed on the owning context unless a download
    /// has installed one first; a missing entry leaves the clip untouched.
    pub fn reload_if_needed(&self, clip: &mut EarthClip) -> Option<JoinHandle<()>> {
        if !clip.mark_reloaded() {
            return None;
        }

        let store = Arc::clone(&self.store);
        let owner = self.owner.clone();
        let name = clip.name().to_string();

        debug!(clip = %name, "Reloading cached heightmap");
        Some(self.runtime.spawn(async move {
            match store.load_by_name(&name).await {
                Ok(Some(image)) => {
                    let delivered = owner.run_on_owner(move |clip: &mut EarthClip| {
                        if clip.install_cached(image) {
                            info!(clip = clip.name(), "Installed cached heightmap");
                        }
                    });
                    if !delivered {
                        warn!(clip = %name, "Owning context gone, dropping cached heightmap");
                    }
                }
                Ok(None) => debug!(clip = %name, "No cached heightmap"),
                Err(e) => warn!(clip = %name, error = %e, "Failed to load cached heightmap"),
            }
        }))
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Background half of one download request.
struct Pipeline<F, C> {
    assembler: TileSetAssembler<F>,
    encoder: HeightEncoder,
    store: Arc<C>,
    owner: OwnerHandle<EarthClip>,
    name: Arc<str>,
    generation: u64,
}

impl<F, C> Pipeline<F, C>
where
    F: TileFetcher + 'static,
    C: HeightmapStore + 'static,
{
    async fn run<CB>(self, coordinate: TileCoordinate, callback: CB)
    where
        CB: FnOnce(DownloadStatus) + Send + 'static,
    {
        let generation = self.generation;

        let image = match self.build(coordinate).await {
            Ok(image) => image,
            Err(error) => {
                warn!(clip = %self.name, generation, error = %error, "Tile download failed");
                let message = error.to_string();
                let delivered = self.owner.run_on_owner(move |clip: &mut EarthClip| {
                    clip.set_phase(generation, DownloadPhase::Failed);
                    callback(DownloadStatus::error(message));
                });
                if !delivered {
                    self.owner_gone();
                }
                return;
            }
        };

        // The cache only receives heightmaps the clip accepted
        let (installed_tx, installed_rx) = oneshot::channel();
        let cached = image.clone();
        let posted = self.owner.run_on_owner(move |clip: &mut EarthClip| {
            let installed = clip.install(generation, image);
            info!(clip = clip.name(), generation, installed, "Heightmap delivered");
            let _ = installed_tx.send(installed);
        });
        let installed = match (posted, installed_rx.await) {
            (true, Ok(installed)) => installed,
            _ => return self.owner_gone(),
        };

        if installed {
            if let Err(e) = self.store.store_by_name(&self.name, cached).await {
                warn!(clip = %self.name, error = %e, "Failed to cache heightmap");
            }
        }

        if !self
            .owner
            .run_on_owner(move |_: &mut EarthClip| callback(DownloadStatus::success()))
        {
            self.owner_gone();
        }
    }

    fn owner_gone(&self) {
        warn!(
            clip = %self.name,
            generation = self.generation,
            "Owning context gone, dropping download result"
        );
    }

    async fn build(&self, coordinate: TileCoordinate) -> Result<HeightImage, DownloadError> {
        let generation = self.generation;
        let progress_owner = self.owner.clone();

        let response = self
            .assembler
            .assemble(coordinate, move |progress| {
                progress_owner.run_on_owner(move |clip: &mut EarthClip| {
                    clip.record_progress(generation, progress)
                });
            })
            .await;
        let (width, samples) = response.into_result()?;

        self.owner.run_on_owner(move |clip: &mut EarthClip| {
            clip.set_phase(generation, DownloadPhase::Encoding)
        });
        let image = self
            .encoder
            .encode(width, samples, Arc::clone(&self.name))
            .await?;

        Ok(image)
    }
}

// =============================================================================
// Tests
// =============================================================================
