//! Mosaic reads over overlapping rasters.
//!
//! `west` covers [0, 100] and `east` covers [50, 150] along X, both at one
//! map unit per pixel, so they overlap on [50, 100].

use raster_streamer::geo::{Crs, Envelope};
use raster_streamer::service::{MosaicRequest, RasterImage, ReadResult};
use raster_streamer::RasterError;

use super::test_utils::{sample_store, service_for, CRS};

fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
    Envelope::new(min_x, min_y, max_x, max_y, Crs::new(CRS))
}

fn request(rasters: &[&str], envelope: Envelope, width: u32, height: u32) -> MosaicRequest {
    MosaicRequest {
        raster_ids: rasters.iter().map(|r| r.to_string()).collect(),
        envelope,
        width,
        height,
        bands: None,
        fill: 0,
    }
}

fn image(result: ReadResult) -> RasterImage {
    match result {
        ReadResult::Image(image) => image,
        ReadResult::NoData { .. } => panic!("expected pixels, got no data"),
    }
}

#[tokio::test]
async fn test_later_rasters_win_in_overlap() {
    let service = service_for(sample_store());

    let mosaic = request(&["west", "east"], env(0.0, 0.0, 150.0, 100.0), 150, 100);
    let image = image(service.read_mosaic(&mosaic).await.unwrap());

    assert_eq!((image.buffer.width(), image.buffer.height()), (150, 100));
    assert_eq!(image.buffer.sample(0, 25, 50), 10);
    assert_eq!(image.buffer.sample(0, 75, 50), 20);
    assert_eq!(image.buffer.sample(0, 125, 50), 20);

    assert!((image.envelope.min_x - 0.0).abs() < 1e-6);
    assert!((image.envelope.max_x - 150.0).abs() < 1e-6);
    assert!((image.envelope.max_y - 100.0).abs() < 1e-6);
    assert_eq!(image.level, 0);
}

#[tokio::test]
async fn test_request_order_decides_overlap() {
    let service = service_for(sample_store());

    let mosaic = request(&["east", "west"], env(0.0, 0.0, 150.0, 100.0), 150, 100);
    let image = image(service.read_mosaic(&mosaic).await.unwrap());

    assert_eq!(image.buffer.sample(0, 25, 50), 10);
    assert_eq!(image.buffer.sample(0, 75, 50), 10);
    assert_eq!(image.buffer.sample(0, 125, 50), 20);
}

#[tokio::test]
async fn test_fill_valued_samples_do_not_overwrite() {
    let service = service_for(sample_store());

    // With fill 20 every `east` sample counts as empty.
    let mut mosaic = request(&["west", "east"], env(0.0, 0.0, 150.0, 100.0), 150, 100);
    mosaic.fill = 20;
    let image = image(service.read_mosaic(&mosaic).await.unwrap());

    assert_eq!(image.buffer.sample(0, 75, 50), 10);
    assert_eq!(image.buffer.sample(0, 125, 50), 20);
}

#[tokio::test]
async fn test_single_raster_mosaic_matches_read() {
    let service = service_for(sample_store());

    let mosaic = request(&["west"], env(0.0, 0.0, 100.0, 100.0), 100, 100);
    let image = image(service.read_mosaic(&mosaic).await.unwrap());

    assert_eq!((image.buffer.width(), image.buffer.height()), (100, 100));
    assert!(image.buffer.as_bytes().iter().all(|&b| b == 10));
}

#[tokio::test]
async fn test_mosaic_outside_every_raster() {
    let service = service_for(sample_store());

    let outside = env(5000.0, 5000.0, 6000.0, 6000.0);
    let mosaic = request(&["west", "east"], outside.clone(), 10, 10);
    let result = service.read_mosaic(&mosaic).await.unwrap();

    assert!(result.is_no_data());
    assert_eq!(result.envelope(), &outside);
}

#[tokio::test]
async fn test_mixed_encodings_are_rejected() {
    let objects = sample_store();
    let service = service_for(objects.clone());

    // Warm the metadata cache so only tile reads are counted.
    service.describe_pyramid("west").await.unwrap();
    service.describe_pyramid("landcover").await.unwrap();
    let readers_before = objects.readers_created();

    let mosaic = request(&["west", "landcover"], env(0.0, 0.0, 64.0, 64.0), 64, 64);
    let err = service.read_mosaic(&mosaic).await.unwrap_err();

    assert!(matches!(err, RasterError::IncompatibleMosaic(_)));
    assert!(err.is_caller_error());
    assert_eq!(objects.readers_created(), readers_before);
}

#[tokio::test]
async fn test_empty_mosaic_is_rejected() {
    let service = service_for(sample_store());

    let mosaic = request(&[], env(0.0, 0.0, 10.0, 10.0), 10, 10);
    let err = service.read_mosaic(&mosaic).await.unwrap_err();

    assert!(matches!(err, RasterError::IncompatibleMosaic(_)));
}

#[tokio::test]
async fn test_unknown_raster_in_mosaic() {
    let service = service_for(sample_store());

    let mosaic = request(&["west", "nope"], env(0.0, 0.0, 10.0, 10.0), 10, 10);
    let err = service.read_mosaic(&mosaic).await.unwrap_err();

    assert!(matches!(err, RasterError::RasterNotFound { .. }));
}
