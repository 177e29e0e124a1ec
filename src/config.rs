//! Configuration management for earth-heightmap.
//!
//! Options come from the command line via clap, with every option also
//! readable from an environment variable with the `EHM_` prefix.
//!
//! # Example
//!
//! ```
//! use clap::Parser;
//! use earth_heightmap::config::{Cli, Command};
//!
//! let cli = Cli::parse_from(["earth-heightmap", "download", "3, 5, 4", "--resolution", "2048"]);
//! match cli.command {
//!     Command::Download(config) => assert_eq!(config.resolution.width(), 2048),
//!     Command::Reload(_) => unreachable!(),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `EHM_RESOLUTION` - Output width: 512, 1024, 2048 or 4096 (default: 512)
//! - `EHM_NAME` - Name the heightmap is cached under (default: earth-clip)
//! - `EHM_CACHE_DIR` - Heightmap cache directory (default: .heightmaps)
//! - `EHM_URL_TEMPLATE` - Tile URL with `{z}`, `{x}`, `{y}` and `{token}` placeholders
//! - `EHM_ACCESS_TOKEN` - Value substituted for `{token}`
//! - `EHM_MAX_CONCURRENT_FETCHES` - Concurrent tile requests (default: 16)
//! - `EHM_REQUEST_TIMEOUT` - Per-request timeout in seconds (default: 30)
//! - `EHM_STRICT_COORDINATES` - Reject non-numeric coordinate fields
//! - `EHM_OUTPUT` - Also write the heightmap PNG to this path

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::io::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_URL_TEMPLATE};
use crate::tile::{ParseMode, TileResolution, DEFAULT_CACHE_DIR, DEFAULT_MAX_CONCURRENT_FETCHES};

// =============================================================================
// Default Values
// =============================================================================

/// Default name heightmaps are cached under.
pub const DEFAULT_CLIP_NAME: &str = "earth-clip";

// =============================================================================
// CLI Arguments
// =============================================================================

/// earth-heightmap - Build 16-bit heightmaps from web elevation tiles.
///
/// Downloads the sub-tiles of one map tile, stitches them into a single
/// square heightmap and caches it by name.
#[derive(Parser, Debug, Clone)]
#[command(name = "earth-heightmap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download a tile set and build its heightmap.
    Download(DownloadConfig),

    /// Load a previously cached heightmap.
    Reload(ReloadConfig),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Download(config) => config.verbose,
            Command::Reload(config) => config.verbose,
        }
    }
}

/// How the download summary is printed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadConfig {
    /// Tile to download as "X, Y, Zoom".
    #[arg(allow_hyphen_values = true)]
    pub tile: String,

    // =========================================================================
    // Output
    // =========================================================================
    /// Heightmap width in pixels (512, 1024, 2048 or 4096).
    #[arg(short, long, default_value = "512", env = "EHM_RESOLUTION")]
    pub resolution: TileResolution,

    /// Name the heightmap is cached under.
    #[arg(long, default_value = DEFAULT_CLIP_NAME, env = "EHM_NAME")]
    pub name: String,

    /// Directory holding cached heightmaps.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "EHM_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Also write the heightmap PNG to this path.
    #[arg(short, long, env = "EHM_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Summary format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    // =========================================================================
    // Tile Source
    // =========================================================================
    /// Tile URL template with {z}, {x}, {y} and {token} placeholders.
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE, env = "EHM_URL_TEMPLATE")]
    pub url_template: String,

    /// Access token substituted for {token}.
    #[arg(long, env = "EHM_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Maximum number of tile requests in flight.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES, env = "EHM_MAX_CONCURRENT_FETCHES")]
    pub max_concurrent_fetches: usize,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "EHM_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Reject coordinates with non-numeric fields instead of reading their
    /// leading digits.
    #[arg(long, default_value_t = false, env = "EHM_STRICT_COORDINATES")]
    pub strict_coordinates: bool,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl DownloadConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)?;

        if self.max_concurrent_fetches == 0 {
            return Err("max_concurrent_fetches must be greater than 0".to_string());
        }
        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }

        for placeholder in ["{x}", "{y}", "{z}"] {
            if !self.url_template.contains(placeholder) {
                return Err(format!(
                    "url_template must contain {}. Set --url-template or EHM_URL_TEMPLATE",
                    placeholder
                ));
            }
        }

        if self.url_template.contains("{token}") && self.access_token.is_none() {
            return Err(
                "url_template uses {token} but no access token provided. \
                 Set --access-token or EHM_ACCESS_TOKEN"
                    .to_string(),
            );
        }

        Ok(())
    }

    pub fn parse_mode(&self) -> ParseMode {
        if self.strict_coordinates {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReloadConfig {
    /// Name the heightmap was cached under.
    #[arg(long, default_value = DEFAULT_CLIP_NAME, env = "EHM_NAME")]
    pub name: String,

    /// Directory holding cached heightmaps.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "EHM_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Write the cached heightmap PNG to this path.
    #[arg(short, long, env = "EHM_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ReloadConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name must not be empty. Set --name or EHM_NAME".to_string());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
