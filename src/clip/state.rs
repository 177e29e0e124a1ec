//! Caller-visible clip state.
//!
//! An [`EarthClip`] is the object a download is started for. Everything on it
//! is mutated only on the owning context; background work reaches it through
//! [`OwnerHandle::run_on_owner`](super::OwnerHandle::run_on_owner).

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::tile::{DownloadProgress, HeightImage};

/// Progress text shown between request and the first settled tile.
pub const START_PROGRESS_TEXT: &str = "Start downloading tiles";

/// Where the most recent download request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    #[default]
    Idle,
    FetchingTiles,
    Assembling,
    Encoding,
    Delivered,
    Failed,
}

impl DownloadPhase {
    /// Whether no further transitions are expected for this request.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::Delivered | Self::Failed)
    }
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::FetchingTiles => "fetching tiles",
            Self::Assembling => "assembling",
            Self::Encoding => "encoding",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What happens when downloads on the same clip overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupersedePolicy {
    /// Whichever download completes last installs its heightmap.
    #[default]
    LastDelivered,
    /// A completion older than the installed heightmap is discarded. Its
    /// status callback still fires.
    NewestRequest,
}

/// A terrain clip that receives heightmaps.
#[derive(Debug)]
pub struct EarthClip {
    name: String,
    height_map: Option<HeightImage>,
    tile_download_progress: String,
    phase: DownloadPhase,
    latest_generation: u64,
    installed_generation: u64,
    supersede_policy: SupersedePolicy,
    has_reloaded: bool,
}

impl EarthClip {
    /// Create a clip whose heightmaps are cached under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            height_map: None,
            tile_download_progress: String::new(),
            phase: DownloadPhase::Idle,
            latest_generation: 0,
            installed_generation: 0,
            supersede_policy: SupersedePolicy::default(),
            has_reloaded: false,
        }
    }

    pub fn with_supersede_policy(mut self, policy: SupersedePolicy) -> Self {
        self.supersede_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The installed heightmap, if any.
    pub fn height_map(&self) -> Option<&HeightImage> {
        self.height_map.as_ref()
    }

    /// Human-readable progress, e.g. `"Completed: 3/16"`.
    pub fn tile_download_progress(&self) -> &str {
        &self.tile_download_progress
    }

    pub fn phase(&self) -> DownloadPhase {
        self.phase
    }

    pub fn supersede_policy(&self) -> SupersedePolicy {
        self.supersede_policy
    }

    /// Generation of the most recent download request (0 before any).
    pub fn latest_generation(&self) -> u64 {
        self.latest_generation
    }

    /// Generation of the installed heightmap (0 if none came from a download).
    pub fn installed_generation(&self) -> u64 {
        self.installed_generation
    }

    pub fn has_reloaded(&self) -> bool {
        self.has_reloaded
    }

    /// Start a new activation cycle; the next reload request will load again.
    pub fn begin_activation(&mut self) {
        self.has_reloaded = false;
    }

    pub(crate) fn begin_download(&mut self) -> u64 {
        self.latest_generation += 1;
        self.tile_download_progress = START_PROGRESS_TEXT.to_string();
        self.phase = DownloadPhase::FetchingTiles;
        self.latest_generation
    }

    /// A request rejected before it got a generation.
    pub(crate) fn reject_request(&mut self) {
        self.phase = DownloadPhase::Failed;
    }

    /// Progress from an older request is ignored.
    pub(crate) fn record_progress(&mut self, generation: u64, progress: DownloadProgress) {
        if generation != self.latest_generation {
            return;
        }
        self.tile_download_progress = progress.to_string();
        if self.phase == DownloadPhase::FetchingTiles && progress.tiles_downloaded > 0 {
            self.phase = DownloadPhase::Assembling;
        }
    }

    pub(crate) fn set_phase(&mut self, generation: u64, phase: DownloadPhase) {
        if generation == self.latest_generation {
            self.phase = phase;
        }
    }

    /// Install a freshly built heightmap. Returns whether it was installed.
    pub(crate) fn install(&mut self, generation: u64, image: HeightImage) -> bool {
        if generation < self.installed_generation {
            match self.supersede_policy {
                SupersedePolicy::NewestRequest => {
                    debug!(
                        clip = %self.name,
                        generation,
                        installed = self.installed_generation,
                        "Discarding superseded heightmap"
                    );
                    return false;
                }
                SupersedePolicy::LastDelivered => {
                    warn!(
                        clip = %self.name,
                        generation,
                        installed = self.installed_generation,
                        "Older download completed last and replaces the heightmap"
                    );
                }
            }
        }

        self.height_map = Some(image);
        self.installed_generation = generation;
        self.set_phase(generation, DownloadPhase::Delivered);
        true
    }

    /// Install a heightmap loaded from the cache, unless a download has
    /// already installed one.
    pub(crate) fn install_cached(&mut self, image: HeightImage) -> bool {
        if self.installed_generation > 0 {
            debug!(clip = %self.name, "Keeping downloaded heightmap over cached copy");
            return false;
        }
        self.height_map = Some(image);
        true
    }

    /// Set the reload flag. Returns `false` if it was already set.
    pub(crate) fn mark_reloaded(&mut self) -> bool {
        !std::mem::replace(&mut self.has_reloaded, true)
    }
}
