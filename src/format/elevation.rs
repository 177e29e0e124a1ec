//! Elevation tile decoding.
//!
//! Height samples are unsigned 16-bit values with one unit per metre and sea
//! level at [`SEA_LEVEL_SAMPLE`], so both positive and negative heights fit.

use image::{ColorType, DynamicImage, ImageFormat};

use crate::error::FetchError;

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Sample value of 0 m.
pub const SEA_LEVEL_SAMPLE: u16 = 32768;

/// Height of a Terrain-RGB pixel with all channels zero.
const TERRAIN_RGB_BASE_METERS: f64 = -10_000.0;

/// Height step of one Terrain-RGB unit.
const TERRAIN_RGB_STEP_METERS: f64 = 0.1;

/// Pixel encoding of a fetched tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationEncoding {
    TerrainRgb,
    Gray16,
}

/// Check whether the payload starts with the PNG signature.
#[inline]
pub fn is_png_header(bytes: &[u8]) -> bool {
    bytes.len() >= PNG_SIGNATURE.len() && bytes[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

/// Decode a Terrain-RGB pixel into metres.
#[inline]
pub fn terrain_rgb_to_meters(r: u8, g: u8, b: u8) -> f64 {
    let packed = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
    TERRAIN_RGB_BASE_METERS + f64::from(packed) * TERRAIN_RGB_STEP_METERS
}

/// Convert metres to a height sample, clamping to the u16 range.
#[inline]
pub fn meters_to_sample(meters: f64) -> u16 {
    (meters.round() + f64::from(SEA_LEVEL_SAMPLE)).clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Convert a height sample back to metres.
#[inline]
pub fn sample_to_meters(sample: u16) -> f64 {
    f64::from(sample) - f64::from(SEA_LEVEL_SAMPLE)
}

/// Identify how a decoded tile stores heights.
pub fn detect_encoding(image: &DynamicImage) -> Result<ElevationEncoding, FetchError> {
    match image.color() {
        ColorType::L16 => Ok(ElevationEncoding::Gray16),
        ColorType::Rgb8 | ColorType::Rgba8 => Ok(ElevationEncoding::TerrainRgb),
        other => Err(FetchError::Decode(format!(
            "Unsupported elevation pixel format: {:?}",
            other
        ))),
    }
}

/// Decode a fetched tile into `expected_width²` row-major height samples.
///
/// # Errors
///
/// Returns [`FetchError::Decode`] if the payload is not a PNG, uses an
/// unsupported pixel format, or is not `expected_width` pixels square.
pub fn decode_elevation_tile(bytes: &[u8], expected_width: u32) -> Result<Vec<u16>, FetchError> {
    if !is_png_header(bytes) {
        return Err(FetchError::Decode(format!(
            "Payload is not a PNG ({} bytes)",
            bytes.len()
        )));
    }

    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| FetchError::Decode(e.to_string()))?;

    if image.width() != expected_width || image.height() != expected_width {
        return Err(FetchError::Decode(format!(
            "Expected {0}x{0} tile, got {1}x{2}",
            expected_width,
            image.width(),
            image.height()
        )));
    }

    match detect_encoding(&image)? {
        ElevationEncoding::Gray16 => Ok(image.into_luma16().into_raw()),
        ElevationEncoding::TerrainRgb => Ok(image
            .into_rgb8()
            .pixels()
            .map(|p| meters_to_sample(terrain_rgb_to_meters(p[0], p[1], p[2])))
            .collect()),
    }
}
