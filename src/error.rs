use thiserror::Error;

/// Errors produced while parsing a tile coordinate or resolution selector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The coordinate string did not contain exactly three fields
    #[error("Invalid TileInfo string: expected \"X, Y, Zoom\", got {fields} field(s)")]
    MalformedInput { fields: usize },

    /// A field was not an integer (strict parse mode only)
    #[error("Invalid {field} value: {value:?} is not an integer")]
    InvalidNumber { field: &'static str, value: String },

    /// Resolution selector outside 0-3
    #[error("Invalid resolution level {0}: expected 0-3 (512, 1024, 2048 or 4096 pixels)")]
    InvalidResolution(u32),
}

/// Failures of a single sub-tile fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("HTTP {code} from {url}")]
    HttpStatus { code: u16, url: String },

    /// Payload could not be decoded into height samples
    #[error("Decode error: {0}")]
    Decode(String),

    /// The URL template produced an unusable URL
    #[error("Invalid tile URL: {0}")]
    InvalidUrl(String),

    /// The fetch task was aborted or panicked
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}

/// Errors that can occur when building a height image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Sample buffer length does not equal width squared
    #[error("Sample count mismatch: expected {expected} samples, got {actual}")]
    SampleCountMismatch { expected: usize, actual: usize },

    /// Width is zero or too large to address
    #[error("Invalid image width: {0}")]
    InvalidWidth(u32),

    /// Error from the image codec
    #[error("Image error: {0}")]
    Image(String),

    /// The blocking encode task was aborted or panicked
    #[error("Encode task failed: {0}")]
    TaskFailed(String),
}

/// Errors from a heightmap store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// A stored artifact could not be decoded
    #[error("Stored heightmap is corrupt: {0}")]
    Decode(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Terminal error of one orchestrated download
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// The coordinate string could not be parsed
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A sub-tile failed; the whole set is discarded
    #[error("Tile ({col}, {row}) failed: {source}")]
    Fetch {
        col: u32,
        row: u32,
        #[source]
        source: FetchError,
    },

    /// A fetch task panicked or was aborted before reporting its tile
    #[error("Tile fetch task failed: {0}")]
    TaskFailed(String),

    /// The assembled grid could not be encoded
    #[error("Failed to build heightmap: {0}")]
    Encode(#[from] EncodeError),
}
