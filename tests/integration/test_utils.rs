//! Test utilities for integration tests.
//!
//! This module provides mock tile sources and heightmap stores with call
//! tracking, plus helpers for building elevation tiles with a recognizable
//! per-tile pattern.

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use image::{ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use earth_heightmap::clip::{DownloadStatus, EarthClip, OwningContext};
use earth_heightmap::error::{FetchError, StoreError};
use earth_heightmap::io::{SubTileResult, TileFetcher};
use earth_heightmap::tile::{
    HeightEncoder, HeightImage, HeightmapStore, MemoryHeightmapStore, SubTileAddress, TILE_PIXELS,
};

// =============================================================================
// Tile Payloads
// =============================================================================

/// Sample the patterned tile at `(col, row)` holds at pixel `(x, y)`.
///
/// The top six bits identify the tile and the rest vary with position, so a
/// misplaced or transposed tile never matches.
pub fn pattern_sample(col: u32, row: u32, x: u32, y: u32) -> u16 {
    let tile_id = (row * 8 + col) & 0x3F;
    let local = (x * 7 + y * 3) % 1024;
    ((tile_id << 10) | local) as u16
}

/// 16-bit grayscale PNG carrying [`pattern_sample`] for one tile.
pub fn pattern_tile(col: u32, row: u32) -> Bytes {
    let pixels: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(TILE_PIXELS, TILE_PIXELS, |x, y| {
            Luma([pattern_sample(col, row, x, y)])
        });
    encode_png(&pixels)
}

/// Terrain-RGB PNG where every pixel decodes to `meters`.
pub fn terrain_rgb_tile(meters: f64) -> Bytes {
    let raw = ((meters + 10000.0) * 10.0).round() as u32;
    let pixel = Rgb([(raw >> 16) as u8, (raw >> 8) as u8, raw as u8]);
    let pixels = RgbImage::from_pixel(TILE_PIXELS, TILE_PIXELS, pixel);
    encode_png(&pixels)
}

fn encode_png<P, C>(pixels: &ImageBuffer<P, C>) -> Bytes
where
    P: image::PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
    C: std::ops::Deref<Target = [P::Subpixel]>,
{
    let mut out = Cursor::new(Vec::new());
    pixels.write_to(&mut out, ImageFormat::Png).unwrap();
    Bytes::from(out.into_inner())
}

/// Encoded heightmap of `width²` samples all equal to `fill`.
pub fn flat_heightmap(name: &str, width: u32, fill: u16) -> HeightImage {
    HeightEncoder::new()
        .encode_blocking(width, vec![fill; (width * width) as usize], name)
        .unwrap()
}

// =============================================================================
// Mock Tile Fetcher
// =============================================================================

/// A tile source serving [`pattern_tile`]s, with configurable failures and
/// delays and full request tracking.
///
/// Clones share tracking state.
#[derive(Clone)]
pub struct MockTileFetcher {
    failing: Arc<HashSet<(u32, u32)>>,
    delays: Arc<HashMap<(u32, u32), Duration>>,
    default_delay: Duration,
    payload: Option<Bytes>,
    requests: Arc<Mutex<Vec<SubTileAddress>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTileFetcher {
    pub fn new() -> Self {
        Self {
            failing: Arc::new(HashSet::new()),
            delays: Arc::new(HashMap::new()),
            default_delay: Duration::ZERO,
            payload: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer 404 for the tile at `(col, row)`.
    pub fn failing_at(mut self, col: u32, row: u32) -> Self {
        Arc::make_mut(&mut self.failing).insert((col, row));
        self
    }

    pub fn with_delay(mut self, col: u32, row: u32, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert((col, row), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Serve `payload` for every tile instead of the pattern.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Make tiles later in row-major order answer first.
    pub fn reversed(mut self, tiles_per_row: u32, step: Duration) -> Self {
        let total = tiles_per_row * tiles_per_row;
        for row in 0..tiles_per_row {
            for col in 0..tiles_per_row {
                let rank = total - (row * tiles_per_row + col);
                self = self.with_delay(col, row, step * rank);
            }
        }
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<SubTileAddress> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockTileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileFetcher for MockTileFetcher {
    async fn fetch(&self, tile: SubTileAddress) -> SubTileResult {
        self.requests.lock().unwrap().push(tile);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .get(&(tile.col, tile.row))
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&(tile.col, tile.row)) {
            return Err(FetchError::HttpStatus {
                code: 404,
                url: format!("mock://{}", tile),
            });
        }

        Ok(self
            .payload
            .clone()
            .unwrap_or_else(|| pattern_tile(tile.col, tile.row)))
    }

    fn identifier(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Counting Store
// =============================================================================

/// In-memory heightmap store that counts calls and can be made to fail.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: Arc<MemoryHeightmapStore>,
    loads: Arc<AtomicUsize>,
    stores: Arc<AtomicUsize>,
    fail_stores: Arc<AtomicBool>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn set_fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryHeightmapStore {
        &self.inner
    }
}

#[async_trait]
impl HeightmapStore for CountingStore {
    async fn load_by_name(&self, name: &str) -> Result<Option<HeightImage>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_by_name(name).await
    }

    async fn store_by_name(&self, name: &str, image: HeightImage) -> Result<(), StoreError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(StoreError::Io("read-only cache".to_string()));
        }
        self.inner.store_by_name(name, image).await
    }
}

// =============================================================================
// Callback Helpers
// =============================================================================

/// Shared log of statuses delivered to completion callbacks.
#[derive(Clone, Default)]
pub struct StatusLog {
    statuses: Arc<Mutex<Vec<DownloadStatus>>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends to this log.
    pub fn callback(&self) -> impl FnOnce(DownloadStatus) + Send + 'static {
        let statuses = Arc::clone(&self.statuses);
        move |status| statuses.lock().unwrap().push(status)
    }

    pub fn len(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> DownloadStatus {
        self.statuses.lock().unwrap()[index].clone()
    }
}

/// Drive `ctx` until `log` holds `count` statuses, failing after 30 seconds.
pub async fn wait_for_statuses(ctx: &mut OwningContext<EarthClip>, log: &StatusLog, count: usize) {
    let log = log.clone();
    ctx.run_until_timeout(Duration::from_secs(30), move |_| log.len() >= count)
        .await
        .expect("timed out waiting for download callbacks");
}

// =============================================================================
// Local Tile Server
// =============================================================================

/// 16-bit grayscale PNG tile with every sample set to `value`.
pub fn flat_tile(value: u16) -> Bytes {
    let pixels: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_pixel(TILE_PIXELS, TILE_PIXELS, Luma([value]));
    encode_png(&pixels)
}

#[derive(Clone)]
struct TileServerState {
    missing: Arc<HashSet<String>>,
    requests: Arc<Mutex<Vec<String>>>,
}

/// Tile server on localhost, built on axum.
///
/// `GET /{z}/{x}/{y}.png` answers a [`flat_tile`] holding `x * 100 + y`.
/// Paths listed as missing answer 404. Every request target is recorded.
pub struct LocalTileServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl LocalTileServer {
    pub async fn start(missing: &[&str]) -> Self {
        let state = TileServerState {
            missing: Arc::new(missing.iter().map(|s| s.to_string()).collect()),
            requests: Arc::default(),
        };
        let requests = Arc::clone(&state.requests);

        // {filename} captures "{y}.png"
        let router = Router::new()
            .route("/{z}/{x}/{filename}", get(tile_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// URL template pointing at this server.
    pub fn url_template(&self) -> String {
        format!("http://{}/{{z}}/{{x}}/{{y}}.png?access_token={{token}}", self.addr)
    }

    /// Request targets seen so far, including query strings.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn tile_handler(
    State(state): State<TileServerState>,
    Path((_zoom, x, filename)): Path<(u32, u32, String)>,
    uri: Uri,
) -> Response {
    let target = uri
        .path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    state.requests.lock().unwrap().push(target);

    if state.missing.contains(uri.path()) {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    match filename.strip_suffix(".png").and_then(|y| y.parse::<u32>().ok()) {
        Some(y) => (
            [(header::CONTENT_TYPE, "image/png")],
            flat_tile((x * 100 + y) as u16),
        )
            .into_response(),
        None => (StatusCode::BAD_REQUEST, "bad path").into_response(),
    }
}

impl Drop for LocalTileServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
