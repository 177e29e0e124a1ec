use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;
use url::Url;

use super::{SubTileResult, TileFetcher};
use crate::error::FetchError;
use crate::tile::SubTileAddress;

/// Mapbox Terrain-RGB endpoint. `@2x` selects 512×512 tiles.
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://api.mapbox.com/v4/mapbox.terrain-rgb/{z}/{x}/{y}@2x.pngraw?access_token={token}";

/// Default per-request timeout applied by the HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with every tile request.
pub const USER_AGENT: &str = concat!("earth-heightmap/", env!("CARGO_PKG_VERSION"));

/// HTTP-backed implementation of [`TileFetcher`].
///
/// Tile URLs are produced from a template by substituting `{z}`, `{x}`, `{y}`
/// and `{token}`. Each fetch is a single GET with no retry; any non-2xx
/// status is reported as [`FetchError::HttpStatus`].
#[derive(Clone)]
pub struct HttpTileFetcher {
    client: reqwest::Client,
    url_template: String,
    access_token: String,
}

impl HttpTileFetcher {
    /// Create a fetcher for the given URL template.
    pub fn new(
        url_template: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, url_template, access_token))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(
        client: reqwest::Client,
        url_template: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            url_template: url_template.into(),
            access_token: access_token.unwrap_or_default(),
        }
    }

    /// Build the request URL for a sub-tile.
    pub fn tile_url(&self, tile: &SubTileAddress) -> Result<Url, FetchError> {
        let raw = self
            .url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{token}", &self.access_token);

        Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, tile: SubTileAddress) -> SubTileResult {
        let url = self.tile_url(&tile)?;
        trace!(%tile, "Fetching tile");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Keep the token out of error messages
            let mut url = url;
            url.set_query(None);
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read response: {}", e)))
    }

    fn identifier(&self) -> &str {
        &self.url_template
    }
}
