use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;
use crate::tile::SubTileAddress;

/// Outcome of fetching one leaf tile: its raw payload or a typed failure.
pub type SubTileResult = Result<Bytes, FetchError>;

/// Trait for fetching the raw bytes of a single leaf tile.
///
/// Implementations perform exactly one request per call and must not retry.
/// Each call is independent, so many may be in flight at once; they must be
/// thread-safe.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Fetch the payload for one sub-tile.
    async fn fetch(&self, tile: SubTileAddress) -> SubTileResult;

    /// A short description of the tile source (for logging).
    fn identifier(&self) -> &str;
}

#[async_trait]
impl<T: TileFetcher + ?Sized> TileFetcher for Arc<T> {
    async fn fetch(&self, tile: SubTileAddress) -> SubTileResult {
        (**self).fetch(tile).await
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}
