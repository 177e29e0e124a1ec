//! Payload decoders for fetched elevation tiles.
//!
//! A tile server returns one PNG per tile. Two encodings are understood:
//!
//! - **Terrain-RGB**: 8-bit RGB(A) where each pixel packs a height in
//!   decimetres offset by -10000 m (Mapbox convention)
//! - **Gray16**: 16-bit grayscale where each pixel already is a height sample
//!
//! Use [`decode_elevation_tile`] to turn a payload into row-major samples.

pub mod elevation;

pub use elevation::{
    decode_elevation_tile, detect_encoding, is_png_header, meters_to_sample, sample_to_meters,
    terrain_rgb_to_meters, ElevationEncoding, PNG_SIGNATURE, SEA_LEVEL_SAMPLE,
};
