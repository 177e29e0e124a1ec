mod fetcher;
mod http_fetcher;

pub use fetcher::{SubTileResult, TileFetcher};
pub use http_fetcher::{
    HttpTileFetcher, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_URL_TEMPLATE, USER_AGENT,
};
