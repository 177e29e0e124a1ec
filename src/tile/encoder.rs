//! 16-bit heightmap encoder.
//!
//! This module turns an assembled sample grid into a [`HeightImage`]: a
//! single-channel 16-bit image plus its PNG encoding, tagged with the name it
//! is cached under.
//!
//! # Design Decisions
//!
//! - **Off the calling task**: building and compressing a 4096² image takes
//!   long enough to stall an async worker, so [`HeightEncoder::encode`] runs
//!   the work on the blocking pool.
//!
//! - **Consumes the samples**: the sample buffer is moved into the image, so
//!   no copy of the (up to 32 MB) grid outlives the encode.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageBuffer, ImageFormat, Luma};
use tracing::debug;

use crate::error::EncodeError;

use super::coordinate::TILE_PIXELS;

/// Single-channel 16-bit image buffer.
pub type HeightBuffer = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Largest width accepted by the encoder (resolution 4096 plus headroom).
pub const MAX_IMAGE_WIDTH: u32 = TILE_PIXELS * 16;

// =============================================================================
// Height Image
// =============================================================================

/// A finished heightmap artifact identified by name.
///
/// Cloning is cheap; the pixel data and PNG bytes are shared.
#[derive(Clone)]
pub struct HeightImage {
    name: Arc<str>,
    pixels: Arc<HeightBuffer>,
    png: Bytes,
}

impl HeightImage {
    /// Decode a PNG previously produced by [`HeightEncoder`].
    pub fn from_png(name: impl Into<Arc<str>>, png: Bytes) -> Result<Self, EncodeError> {
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| EncodeError::Image(e.to_string()))?;

        if image.width() != image.height() {
            return Err(EncodeError::Image(format!(
                "Heightmap must be square, got {}x{}",
                image.width(),
                image.height()
            )));
        }

        Ok(Self {
            name: name.into(),
            pixels: Arc::new(image.into_luma16()),
            png,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width (and height) in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Sample at `(x, y)`, or `None` outside the image.
    pub fn sample(&self, x: u32, y: u32) -> Option<u16> {
        if x < self.pixels.width() && y < self.pixels.height() {
            Some(self.pixels.get_pixel(x, y)[0])
        } else {
            None
        }
    }

    /// All samples in row-major order.
    pub fn samples(&self) -> &[u16] {
        self.pixels.as_raw()
    }

    /// PNG encoding of the image (16-bit grayscale).
    pub fn png(&self) -> &Bytes {
        &self.png
    }

    /// Whether two handles share the same pixel storage.
    pub fn ptr_eq(&self, other: &HeightImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl std::fmt::Debug for HeightImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightImage")
            .field("name", &self.name)
            .field("width", &self.width())
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Builds [`HeightImage`]s from sample grids.
#[derive(Debug, Clone, Copy)]
pub struct HeightEncoder {
    compression: CompressionType,
}

impl Default for HeightEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeightEncoder {
    /// Create an encoder using fast PNG compression.
    pub fn new() -> Self {
        Self {
            compression: CompressionType::Fast,
        }
    }

    /// Create an encoder with a specific PNG compression level.
    pub fn with_compression(compression: CompressionType) -> Self {
        Self { compression }
    }

    /// Encode `samples` as a `width × width` image named `name`.
    ///
    /// The work runs on the blocking thread pool; the returned future resolves
    /// on whichever task awaited it.
    ///
    /// # Errors
    ///
    /// Returns an error if `samples.len() != width²`, if the width is out of
    /// range, or if PNG encoding fails.
    pub async fn encode(
        &self,
        width: u32,
        samples: Vec<u16>,
        name: impl Into<Arc<str>>,
    ) -> Result<HeightImage, EncodeError> {
        let encoder = *self;
        let name = name.into();
        tokio::task::spawn_blocking(move || encoder.encode_blocking(width, samples, name))
            .await
            .map_err(|e| EncodeError::TaskFailed(e.to_string()))?
    }

    /// Synchronous variant of [`encode`](Self::encode).
    pub fn encode_blocking(
        &self,
        width: u32,
        samples: Vec<u16>,
        name: impl Into<Arc<str>>,
    ) -> Result<HeightImage, EncodeError> {
        if width == 0 || width > MAX_IMAGE_WIDTH {
            return Err(EncodeError::InvalidWidth(width));
        }

        let expected = width as usize * width as usize;
        if samples.len() != expected {
            return Err(EncodeError::SampleCountMismatch {
                expected,
                actual: samples.len(),
            });
        }

        let pixels = HeightBuffer::from_raw(width, width, samples).ok_or(
            EncodeError::SampleCountMismatch {
                expected,
                actual: 0,
            },
        )?;

        let mut png = Cursor::new(Vec::new());
        let encoder = PngEncoder::new_with_quality(&mut png, self.compression, FilterType::Adaptive);
        pixels
            .write_with_encoder(encoder)
            .map_err(|e| EncodeError::Image(e.to_string()))?;

        let name = name.into();
        let png = Bytes::from(png.into_inner());
        debug!(name = %name, width, png_bytes = png.len(), "Encoded heightmap");

        Ok(HeightImage {
            name,
            pixels: Arc::new(pixels),
            png,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
