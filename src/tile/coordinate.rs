//! Tile addressing.
//!
//! A [`TileCoordinate`] names one web-mercator tile by `(x, y, zoom)` plus a
//! zoom-in refinement depth. Refining by `k` levels replaces the tile with a
//! `2^k × 2^k` grid of sub-tiles at `zoom + k`, each [`TILE_PIXELS`] wide, so
//! the stitched result is `512 · 2^k` pixels on a side.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::ParseError;

/// Width and height in pixels of one fetched tile.
pub const TILE_PIXELS: u32 = 512;

/// Deepest supported zoom-in refinement (4096 pixels).
pub const MAX_ZOOM_IN_LEVELS: u8 = 3;

// =============================================================================
// Resolution
// =============================================================================

/// Effective width of the stitched heightmap.
///
/// The discriminant is the zoom-in level it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileResolution {
    #[default]
    Px512 = 0,
    Px1024 = 1,
    Px2048 = 2,
    Px4096 = 3,
}

impl TileResolution {
    /// Map a selector in `0..=3` to a resolution.
    pub fn from_level(level: u32) -> Result<Self, ParseError> {
        match level {
            0 => Ok(Self::Px512),
            1 => Ok(Self::Px1024),
            2 => Ok(Self::Px2048),
            3 => Ok(Self::Px4096),
            other => Err(ParseError::InvalidResolution(other)),
        }
    }

    /// Number of zoom-in levels this resolution requests.
    pub fn zoom_in_levels(self) -> u8 {
        self as u8
    }

    /// Width of the stitched heightmap in pixels.
    pub fn width(self) -> u32 {
        TILE_PIXELS << self.zoom_in_levels()
    }
}

impl FromStr for TileResolution {
    type Err = ParseError;

    /// Accepts either a pixel width (`"2048"`) or a selector (`"2"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidResolution(u32::MAX))?;
        match value {
            512 => Ok(Self::Px512),
            1024 => Ok(Self::Px1024),
            2048 => Ok(Self::Px2048),
            4096 => Ok(Self::Px4096),
            level => Self::from_level(level),
        }
    }
}

impl fmt::Display for TileResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.width())
    }
}

// =============================================================================
// Parse Mode
// =============================================================================

/// How non-numeric coordinate fields are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Non-numeric content parses as its leading integer prefix, or 0.
    #[default]
    Lenient,
    /// Every field must be a complete integer.
    Strict,
}

// =============================================================================
// Tile Coordinate
// =============================================================================

/// A tile address plus zoom-in refinement depth. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinate {
    pub x: i32,
    pub y: i32,
    pub zoom: i32,
    zoom_in_levels: u8,
}

impl TileCoordinate {
    /// Create a coordinate without refinement.
    pub fn new(x: i32, y: i32, zoom: i32) -> Self {
        Self {
            x,
            y,
            zoom,
            zoom_in_levels: 0,
        }
    }

    /// Parse `"X, Y, Zoom"` leniently.
    ///
    /// Empty fields are skipped, so `"1,,2,3"` has three fields. A field
    /// that is not an integer contributes its leading digits, or 0.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        Self::parse_with_mode(raw, ParseMode::Lenient)
    }

    /// Parse `"X, Y, Zoom"` with the given handling of non-numeric fields.
    pub fn parse_with_mode(raw: &str, mode: ParseMode) -> Result<Self, ParseError> {
        let parts: Vec<&str> = raw
            .trim()
            .split(',')
            .filter(|part| !part.is_empty())
            .collect();

        if parts.len() != 3 {
            return Err(ParseError::MalformedInput {
                fields: parts.len(),
            });
        }

        let x = parse_field("x", parts[0], mode)?;
        let y = parse_field("y", parts[1], mode)?;
        let zoom = parse_field("zoom", parts[2], mode)?;

        Ok(Self::new(x, y, zoom))
    }

    /// Return a copy refined by the given resolution.
    pub fn with_resolution(self, resolution: TileResolution) -> Self {
        Self {
            zoom_in_levels: resolution.zoom_in_levels(),
            ..self
        }
    }

    pub fn zoom_in_levels(&self) -> u8 {
        self.zoom_in_levels
    }

    /// Sub-tiles along one edge: `2^zoom_in_levels`.
    pub fn tiles_per_row(&self) -> u32 {
        1 << self.zoom_in_levels
    }

    /// Pixels along one edge of the stitched grid.
    pub fn pixels_per_row(&self) -> u32 {
        TILE_PIXELS * self.tiles_per_row()
    }

    /// Total number of sub-tiles to fetch.
    pub fn total_tiles(&self) -> usize {
        let per_row = self.tiles_per_row() as usize;
        per_row * per_row
    }

    /// Address of the sub-tile at grid position `(col, row)`.
    pub fn sub_tile(&self, col: u32, row: u32) -> SubTileAddress {
        let per_row = i64::from(self.tiles_per_row());
        SubTileAddress {
            col,
            row,
            x: i64::from(self.x) * per_row + i64::from(col),
            y: i64::from(self.y) * per_row + i64::from(row),
            zoom: self.zoom.saturating_add(i32::from(self.zoom_in_levels)),
        }
    }

    /// All sub-tiles in row-major order.
    pub fn sub_tiles(&self) -> impl Iterator<Item = SubTileAddress> + '_ {
        let per_row = self.tiles_per_row();
        (0..per_row).flat_map(move |row| (0..per_row).map(move |col| self.sub_tile(col, row)))
    }
}

impl FromStr for TileCoordinate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.zoom)
    }
}

// =============================================================================
// Sub-tile Address
// =============================================================================

/// One leaf tile of a refined coordinate.
///
/// `col`/`row` locate it inside the stitched grid; `x`/`y`/`zoom` are its
/// address on the tile server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubTileAddress {
    pub col: u32,
    pub row: u32,
    pub x: i64,
    pub y: i64,
    pub zoom: i32,
}

impl fmt::Display for SubTileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

// =============================================================================
// Field Parsing
// =============================================================================

fn parse_field(field: &'static str, raw: &str, mode: ParseMode) -> Result<i32, ParseError> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i32>() {
        return Ok(value);
    }

    match mode {
        ParseMode::Strict => Err(ParseError::InvalidNumber {
            field,
            value: trimmed.to_string(),
        }),
        ParseMode::Lenient => {
            let value = leading_integer(trimmed);
            warn!(field, raw = trimmed, value, "Non-numeric coordinate field");
            Ok(value)
        }
    }
}

/// Integer prefix of `s` (optional sign then digits), saturating at the
/// `i32` bounds. Returns 0 when there is no digit.
fn leading_integer(s: &str) -> i32 {
    let bytes = s.as_bytes();
    let (negative, start) = match bytes.first() {
        Some(b'-') => (true, 1),
        Some(b'+') => (false, 1),
        _ => (false, 0),
    };

    let mut value: i64 = 0;
    for &b in &bytes[start..] {
        if !b.is_ascii_digit() {
            break;
        }
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }

    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

// =============================================================================
// Tests
// =============================================================================
