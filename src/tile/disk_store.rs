//! On-disk heightmap store.
//!
//! Each heightmap is written as `<dir>/<name>.png` (the 16-bit PNG produced
//! by the encoder). Writes go to a temporary file first and are renamed into
//! place, so a reader never observes a half-written artifact.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;

use super::cache::HeightmapStore;
use super::encoder::HeightImage;

/// Distinguishes temporary files of concurrent writes in this process.
static WRITE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".heightmaps";

/// Heightmap store backed by PNG files in a directory.
#[derive(Debug, Clone)]
pub struct DiskHeightmapStore {
    dir: PathBuf,
}

impl DiskHeightmapStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path used for `name`.
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced with `_` so any
    /// clip name maps to a single file inside the directory.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let mut file: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if file.is_empty() || file.starts_with('.') {
            file.insert(0, '_');
        }
        file.push_str(".png");
        self.dir.join(file)
    }
}

#[async_trait]
impl HeightmapStore for DiskHeightmapStore {
    async fn load_by_name(&self, name: &str) -> Result<Option<HeightImage>, StoreError> {
        let path = self.path_for(name);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        debug!(name, path = %path.display(), bytes = data.len(), "Loading cached heightmap");

        let name = name.to_string();
        let image = tokio::task::spawn_blocking(move || HeightImage::from_png(name, Bytes::from(data)))
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(Some(image))
    }

    async fn store_by_name(&self, name: &str, image: HeightImage) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(name);
        let sequence = WRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("png.{}-{}.tmp", std::process::id(), sequence));

        let written = match tokio::fs::write(&tmp, image.png()).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(name, path = %path.display(), bytes = image.png().len(), "Stored heightmap");
        Ok(())
    }
}
