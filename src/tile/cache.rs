//! Named heightmap cache.
//!
//! Finished heightmaps are stored under a stable name derived from the
//! owning clip, so a clip can pick its heightmap up again without
//! re-downloading it.
//!
//! [`HeightmapStore`] is the collaborator contract; [`MemoryHeightmapStore`]
//! keeps artifacts in an LRU bounded by total PNG size, and
//! [`DiskHeightmapStore`](super::DiskHeightmapStore) persists them as files.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::error::StoreError;

use super::encoder::HeightImage;

/// Default cache capacity: 256MB of encoded PNG data
pub const DEFAULT_HEIGHTMAP_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 1_000;

// =============================================================================
// Store Trait
// =============================================================================

/// Load and store heightmaps by name.
#[async_trait]
pub trait HeightmapStore: Send + Sync {
    /// Load the heightmap stored under `name`, if any.
    async fn load_by_name(&self, name: &str) -> Result<Option<HeightImage>, StoreError>;

    /// Store `image` under `name`, replacing any previous entry.
    async fn store_by_name(&self, name: &str, image: HeightImage) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: HeightmapStore + ?Sized> HeightmapStore for Arc<T> {
    async fn load_by_name(&self, name: &str) -> Result<Option<HeightImage>, StoreError> {
        (**self).load_by_name(name).await
    }

    async fn store_by_name(&self, name: &str, image: HeightImage) -> Result<(), StoreError> {
        (**self).store_by_name(name, image).await
    }
}

// =============================================================================
// Memory Store
// =============================================================================

struct MemoryState {
    entries: LruCache<Arc<str>, HeightImage>,
    current_size: usize,
}

/// In-memory LRU of heightmaps with size-based capacity.
///
/// Size is measured in encoded PNG bytes. Least-recently-used entries are
/// evicted once the total exceeds capacity.
pub struct MemoryHeightmapStore {
    state: Mutex<MemoryState>,
    max_size: usize,
}

impl MemoryHeightmapStore {
    /// Create a store with default capacity (256MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HEIGHTMAP_CACHE_CAPACITY)
    }

    /// Create a store holding at most `max_size` bytes of PNG data.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a store with specified capacity and maximum entries.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(MemoryState {
                entries: LruCache::new(max_entries),
                current_size: 0,
            }),
            max_size,
        }
    }

    /// Number of stored heightmaps.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Total PNG bytes currently stored.
    pub async fn size(&self) -> usize {
        self.state.lock().await.current_size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Check for an entry without updating LRU order.
    pub async fn contains(&self, name: &str) -> bool {
        self.state.lock().await.entries.contains(name)
    }

    /// Remove an entry, returning it if present.
    pub async fn remove(&self, name: &str) -> Option<HeightImage> {
        let mut state = self.state.lock().await;
        let removed = state.entries.pop(name)?;
        state.current_size = state.current_size.saturating_sub(removed.png().len());
        Some(removed)
    }
}

impl Default for MemoryHeightmapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HeightmapStore for MemoryHeightmapStore {
    async fn load_by_name(&self, name: &str) -> Result<Option<HeightImage>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.entries.get(name).cloned())
    }

    async fn store_by_name(&self, name: &str, image: HeightImage) -> Result<(), StoreError> {
        let size = image.png().len();
        let mut state = self.state.lock().await;

        // push() hands back either the replaced entry or the one the entry cap evicted
        if let Some((_, displaced)) = state.entries.push(Arc::from(name), image) {
            state.current_size = state.current_size.saturating_sub(displaced.png().len());
        }
        state.current_size += size;

        while state.current_size > self.max_size {
            match state.entries.pop_lru() {
                Some((_, evicted)) => {
                    state.current_size = state.current_size.saturating_sub(evicted.png().len());
                }
                None => break,
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
