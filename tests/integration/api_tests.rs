//! API integration tests for raster reads and error handling.
//!
//! Tests verify:
//! - Pixel responses and their `X-Raster-*` headers
//! - Pyramid descriptions
//! - Mosaic reads
//! - HTTP response codes and JSON error bodies

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use raster_streamer::{create_router, RouterConfig};

use super::test_utils::{sample_store, service_for};

fn router() -> Router {
    create_router(
        service_for(sample_store()),
        RouterConfig::new().with_tracing(false),
    )
}

async fn get(router: Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health and Description
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = get(router(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_pyramid_description() {
    let response = get(router(), "/rasters/dem/pyramid").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["raster_id"], "dem");
    assert_eq!(json["crs"], "EPSG:3857");

    let levels = json["levels"].as_array().unwrap();
    assert_eq!(levels.len(), 3);
    assert_eq!(levels[0]["width"], 1000);
    assert_eq!(levels[1]["width"], 500);
    assert_eq!(levels[2]["width"], 250);
    assert_eq!(levels[0]["tiles_x"], 4);
    assert_eq!(json["bands"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Pixel Reads
// =============================================================================

#[tokio::test]
async fn test_read_returns_pixels_and_headers() {
    let response = get(
        router(),
        "/rasters/dem/read?bbox=10,734,266,990&crs=EPSG:3857&width=256&height=256",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "application/octet-stream");
    assert_eq!(header(&response, "cache-control"), "public, max-age=3600");
    assert_eq!(header(&response, "x-raster-envelope"), "10,734,266,990");
    assert_eq!(header(&response, "x-raster-crs"), "EPSG:3857");
    assert_eq!(header(&response, "x-raster-width"), "256");
    assert_eq!(header(&response, "x-raster-height"), "256");
    assert_eq!(header(&response, "x-raster-bands"), "1");
    assert_eq!(header(&response, "x-raster-bits-per-sample"), "8");
    assert_eq!(header(&response, "x-raster-level"), "0");
    assert_eq!(header(&response, "x-raster-no-data"), "false");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 256 * 256);
    assert_eq!(body[0], 20);
    assert_eq!(body[256 * 256 - 1], 30);
}

#[tokio::test]
async fn test_read_outside_returns_fill() {
    let response = get(
        router(),
        "/rasters/dem/read?bbox=2000,2000,3000,3000&crs=EPSG:3857&width=16&height=8&fill=7",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-raster-no-data"), "true");
    assert_eq!(header(&response, "x-raster-width"), "16");
    assert_eq!(header(&response, "x-raster-height"), "8");
    assert!(response.headers().get("x-raster-level").is_none());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 16 * 8);
    assert!(body.iter().all(|&b| b == 7));
}

#[tokio::test]
async fn test_read_with_colormap() {
    let response = get(
        router(),
        "/rasters/landcover/read?bbox=0,0,64,64&crs=EPSG:3857&width=64&height=64&colormap=true",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-raster-bands"), "4");
    assert_eq!(header(&response, "x-raster-bits-per-sample"), "8");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 64 * 64 * 4);
}

#[tokio::test]
async fn test_cache_max_age_is_configurable() {
    let router = create_router(
        service_for(sample_store()),
        RouterConfig::new().with_tracing(false).with_cache_max_age(60),
    );
    let response = get(
        router,
        "/rasters/dem/read?bbox=0,0,100,100&crs=EPSG:3857&width=100&height=100",
    )
    .await;

    assert_eq!(header(&response, "cache-control"), "public, max-age=60");
}

#[tokio::test]
async fn test_mosaic_endpoint() {
    let response = get(
        router(),
        "/mosaic?rasters=west,east&bbox=0,0,150,100&crs=EPSG:3857&width=150&height=100",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-raster-width"), "150");
    assert_eq!(header(&response, "x-raster-height"), "100");
    assert_eq!(header(&response, "x-raster-envelope"), "0,0,150,100");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 150 * 100);
    // Row 50: west only, then the overlap where east wins.
    assert_eq!(body[50 * 150 + 25], 10);
    assert_eq!(body[50 * 150 + 75], 20);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_unknown_raster_is_404() {
    let response = get(
        router(),
        "/rasters/nope/read?bbox=0,0,10,10&crs=EPSG:3857&width=10&height=10",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);

    let response = get(router(), "/rasters/nope/pyramid").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_bbox_is_400() {
    for bbox in ["1,2,3", "a,b,c,d"] {
        let uri = format!(
            "/rasters/dem/read?bbox={}&crs=EPSG:3857&width=10&height=10",
            bbox
        );
        let response = get(router(), &uri).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "invalid_request");
    }
}

#[tokio::test]
async fn test_crs_mismatch_is_400() {
    let response = get(
        router(),
        "/rasters/dem/read?bbox=0,0,10,10&crs=EPSG:4326&width=10&height=10",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "crs_mismatch");
}

#[tokio::test]
async fn test_zero_width_is_400() {
    let response = get(
        router(),
        "/rasters/dem/read?bbox=0,0,10,10&crs=EPSG:3857&width=0&height=10",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_dimensions");
}

#[tokio::test]
async fn test_bad_band_is_400() {
    let response = get(
        router(),
        "/rasters/dem/read?bbox=0,0,10,10&crs=EPSG:3857&width=10&height=10&bands=2",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_band");
}

#[tokio::test]
async fn test_repeated_band_is_400() {
    let response = get(
        router(),
        "/rasters/dem/read?bbox=0,0,10,10&crs=EPSG:3857&width=10&height=10&bands=0,0",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_band");
}

#[tokio::test]
async fn test_huge_bbox_reads_whole_raster() {
    let response = get(
        router(),
        "/rasters/dem/read?bbox=-1e20,-1e20,1e20,1e20&crs=EPSG:3857&width=256&height=256",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-raster-level"), "2");
    assert_eq!(header(&response, "x-raster-width"), "250");
    assert_eq!(header(&response, "x-raster-envelope"), "0,0,1000,1000");
}

#[tokio::test]
async fn test_incompatible_mosaic_is_400() {
    let response = get(
        router(),
        "/mosaic?rasters=west,landcover&bbox=0,0,64,64&crs=EPSG:3857&width=64&height=64",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "incompatible_mosaic");
}

#[tokio::test]
async fn test_empty_mosaic_list_is_400() {
    let response = get(
        router(),
        "/mosaic?rasters=&bbox=0,0,64,64&crs=EPSG:3857&width=64&height=64",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_query_is_400() {
    let response = get(router(), "/rasters/dem/read?crs=EPSG:3857").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corrupt_tile_is_500() {
    use raster_streamer::source::{level_key, MemoryObjectSource};

    use super::test_utils::TestRaster;

    let objects = MemoryObjectSource::new();
    let raster = TestRaster::new([0.0, 0.0, 32.0, 32.0], 32, 32).tile_size(32);
    let value = |_: usize, _: u32, _: u32| 1u64;
    raster.write(&objects, "broken", value);

    let mut builder = raster.level_builder(0, &value);
    builder.set_tile(0, 0, 0, vec![0u8; 10], None);
    objects.insert(level_key("broken", 0), builder.build());

    let router = create_router(service_for(objects), RouterConfig::new().with_tracing(false));
    let response = get(
        router,
        "/rasters/broken/read?bbox=0,0,32,32&crs=EPSG:3857&width=32&height=32",
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "corrupt_tile");
}

#[tokio::test]
async fn test_vanished_level_file_is_500() {
    use raster_streamer::source::level_key;

    let objects = sample_store();
    let service = service_for(objects.clone());
    service.describe_pyramid("dem").await.unwrap();
    objects.remove(&level_key("dem", 0));

    let router = create_router(service, RouterConfig::new().with_tracing(false));
    let response = get(
        router,
        "/rasters/dem/read?bbox=0,0,100,100&crs=EPSG:3857&width=100&height=100",
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "tile_fetch_error");
}
