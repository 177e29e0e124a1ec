//! HTTP tile fetching integration tests.
//!
//! Tests verify, against a local tile server:
//! - URL template substitution and token handling
//! - Non-success statuses become fetch errors with the token stripped
//! - A full download through the HTTP fetcher

use std::time::Duration;

use tokio::runtime::Handle;

use earth_heightmap::clip::{DownloadOrchestrator, EarthClip, OwningContext};
use earth_heightmap::error::FetchError;
use earth_heightmap::io::{HttpTileFetcher, TileFetcher};
use earth_heightmap::tile::{TileCoordinate, TileResolution, TileSetAssembler};

use super::test_utils::{wait_for_statuses, CountingStore, LocalTileServer, StatusLog};

fn fetcher(server: &LocalTileServer) -> HttpTileFetcher {
    HttpTileFetcher::new(
        server.url_template(),
        Some("secret-token".to_string()),
        Duration::from_secs(10),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_substitutes_template() {
    let server = LocalTileServer::start(&[]).await;
    let fetcher = fetcher(&server);

    let tile = TileCoordinate::new(3, 5, 4).sub_tile(0, 0);
    let bytes = fetcher.fetch(tile).await.unwrap();

    assert!(earth_heightmap::format::is_png_header(&bytes));
    assert_eq!(server.requests(), vec!["/4/3/5.png?access_token=secret-token".to_string()]);
}

#[tokio::test]
async fn test_missing_tile_is_http_status_error() {
    let server = LocalTileServer::start(&["/1/0/1.png"]).await;
    let fetcher = fetcher(&server);

    let tile = TileCoordinate::new(0, 0, 0)
        .with_resolution(TileResolution::Px1024)
        .sub_tile(0, 1);

    match fetcher.fetch(tile).await {
        Err(FetchError::HttpStatus { code, url }) => {
            assert_eq!(code, 404);
            assert!(url.ends_with("/1/0/1.png"), "{}", url);
            assert!(!url.contains("secret-token"));
        }
        other => panic!("Expected 404, got {:?}", other),
    }
}

#[tokio::test]
async fn test_download_through_http() {
    let server = LocalTileServer::start(&[]).await;
    let store = CountingStore::new();
    let mut ctx = OwningContext::new(EarthClip::new("http-clip"));
    let orch = DownloadOrchestrator::new(
        TileSetAssembler::new(fetcher(&server)),
        store.clone(),
        ctx.handle(),
        Handle::current(),
    );
    let log = StatusLog::new();

    orch.download_tile(ctx.state_mut(), "2, 3, 7", TileResolution::Px1024, log.callback());
    wait_for_statuses(&mut ctx, &log, 1).await;

    assert!(!log.get(0).is_error, "{}", log.get(0).error_message);
    assert_eq!(server.requests().len(), 4);

    // Sub-tiles at zoom 8 cover x in 4..6 and y in 6..8
    let map = ctx.state().height_map().unwrap();
    assert_eq!(map.width(), 1024);
    assert_eq!(map.sample(0, 0), Some(406));
    assert_eq!(map.sample(600, 0), Some(506));
    assert_eq!(map.sample(0, 600), Some(407));
    assert_eq!(map.sample(1000, 1000), Some(507));
    assert_eq!(store.store_count(), 1);
}

#[tokio::test]
async fn test_http_failure_fails_download() {
    let server = LocalTileServer::start(&["/8/5/7.png"]).await;
    let mut ctx = OwningContext::new(EarthClip::new("http-clip"));
    let orch = DownloadOrchestrator::new(
        TileSetAssembler::new(fetcher(&server)),
        CountingStore::new(),
        ctx.handle(),
        Handle::current(),
    );
    let log = StatusLog::new();

    orch.download_tile(ctx.state_mut(), "2, 3, 7", TileResolution::Px1024, log.callback());
    wait_for_statuses(&mut ctx, &log, 1).await;

    let status = log.get(0);
    assert!(status.is_error);
    assert!(status.error_message.contains("Tile (1, 1) failed"), "{}", status.error_message);
    assert!(status.error_message.contains("HTTP 404"));
    assert!(ctx.state().height_map().is_none());
    assert_eq!(ctx.state().tile_download_progress(), "Completed: 4/4");
}
