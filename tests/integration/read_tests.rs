//! Window reads through the service against in-memory tile stores.
//!
//! Tests verify:
//! - Pixels across tile boundaries and at coarser levels
//! - Requests outside or partially outside the raster
//! - 1-bit rasters with and without their colormap
//! - Validity masks and fill values
//! - Corrupt and vanished tile data
//! - Range requests issued per read

use bytes::Bytes;

use raster_streamer::geo::{Crs, Envelope};
use raster_streamer::raster::CellEncoding;
use raster_streamer::service::{ReadRequest, ReadResult, RasterImage};
use raster_streamer::source::{level_key, LevelFileBuilder, MemoryObjectSource};
use raster_streamer::{IoError, RasterError};

use super::test_utils::{dem_value, sample_store, service_for, TestRaster, CRS};

fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
    Envelope::new(min_x, min_y, max_x, max_y, Crs::new(CRS))
}

fn image(result: ReadResult) -> RasterImage {
    match result {
        ReadResult::Image(image) => image,
        ReadResult::NoData { .. } => panic!("expected pixels, got no data"),
    }
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
}

// =============================================================================
// Basic Reads
// =============================================================================

#[tokio::test]
async fn test_read_across_tile_boundaries() {
    let service = service_for(sample_store());

    let request = ReadRequest::new("dem", env(10.0, 734.0, 266.0, 990.0), 256, 256);
    let image = image(service.read(&request).await.unwrap());

    assert_eq!(image.level, 0);
    assert_eq!(image.buffer.width(), 256);
    assert_eq!(image.buffer.height(), 256);
    assert_eq!(image.buffer.bands(), 1);
    assert_eq!(image.buffer.encoding(), CellEncoding::UInt8);
    assert_eq!(image.plan.tile_count(), 4);

    // Output pixel (x, y) is level pixel (x + 10, y + 10).
    for (x, y) in [(0, 0), (245, 0), (246, 0), (0, 246), (200, 123), (255, 255)] {
        assert_eq!(
            image.buffer.sample(0, x, y),
            dem_value(0, x + 10, y + 10),
            "pixel ({}, {})",
            x,
            y
        );
    }
    assert_eq!(image.buffer.sample(0, 0, 0), 20);
    assert_eq!(image.buffer.sample(0, 255, 255), 30);

    assert_close(image.envelope.min_x, 10.0);
    assert_close(image.envelope.min_y, 734.0);
    assert_close(image.envelope.max_x, 266.0);
    assert_close(image.envelope.max_y, 990.0);
}

#[tokio::test]
async fn test_coarse_reads_use_overview_levels() {
    let service = service_for(sample_store());
    let full = env(0.0, 0.0, 1000.0, 1000.0);

    let quarter = image(service.read(&ReadRequest::new("dem", full.clone(), 250, 250)).await.unwrap());
    assert_eq!(quarter.level, 2);
    assert_eq!((quarter.buffer.width(), quarter.buffer.height()), (250, 250));
    assert_eq!(quarter.buffer.sample(0, 0, 0), 100);
    assert_eq!(quarter.buffer.sample(0, 249, 249), dem_value(2, 249, 249));

    let half = image(service.read(&ReadRequest::new("dem", full, 300, 300)).await.unwrap());
    assert_eq!(half.level, 1);
    assert_eq!((half.buffer.width(), half.buffer.height()), (500, 500));
    assert_eq!(half.buffer.sample(0, 499, 0), dem_value(1, 499, 0));
}

#[tokio::test]
async fn test_partial_overlap_is_clipped() {
    let service = service_for(sample_store());

    let request = ReadRequest::new("dem", env(900.0, -100.0, 1100.0, 100.0), 200, 200);
    let image = image(service.read(&request).await.unwrap());

    assert_eq!((image.buffer.width(), image.buffer.height()), (100, 100));
    assert_eq!(image.buffer.sample(0, 0, 0), dem_value(0, 900, 900));
    assert_eq!(image.buffer.sample(0, 99, 99), dem_value(0, 999, 999));

    assert_close(image.envelope.min_x, 900.0);
    assert_close(image.envelope.min_y, 0.0);
    assert_close(image.envelope.max_x, 1000.0);
    assert_close(image.envelope.max_y, 100.0);
}

#[tokio::test]
async fn test_outside_read_is_no_data() {
    let objects = sample_store();
    let service = service_for(objects.clone());

    service.describe_pyramid("dem").await.unwrap();
    let readers_before = objects.readers_created();

    let outside = env(2000.0, 2000.0, 3000.0, 3000.0);
    let result = service
        .read(&ReadRequest::new("dem", outside.clone(), 64, 32))
        .await
        .unwrap();

    assert!(result.is_no_data());
    assert_eq!(result.envelope(), &outside);
    // No level file was opened.
    assert_eq!(objects.readers_created(), readers_before);

    let blank = result.into_buffer(CellEncoding::UInt8, 1, 9);
    assert_eq!((blank.width(), blank.height()), (64, 32));
    assert!(blank.as_bytes().iter().all(|&b| b == 9));
}

#[tokio::test]
async fn test_range_reads_per_window() {
    let objects = sample_store();
    let service = service_for(objects.clone());

    service.describe_pyramid("dem").await.unwrap();
    let before = objects.range_reads();

    let request = ReadRequest::new("dem", env(10.0, 734.0, 266.0, 990.0), 256, 256);
    service.read(&request).await.unwrap();

    // Header, one index row per tile row, one request per tile.
    assert_eq!(objects.range_reads() - before, 1 + 2 + 4);
}

// =============================================================================
// 1-bit Rasters
// =============================================================================

#[tokio::test]
async fn test_one_bit_raw_samples() {
    let service = service_for(sample_store());

    let request = ReadRequest::new("landcover", env(0.0, 0.0, 64.0, 64.0), 64, 64);
    let image = image(service.read(&request).await.unwrap());

    assert_eq!(image.buffer.encoding(), CellEncoding::Bit1);
    assert_eq!(image.buffer.sample(0, 0, 0), 0);
    assert_eq!(image.buffer.sample(0, 8, 0), 1);
    assert_eq!(image.buffer.sample(0, 8, 8), 0);
    assert_eq!(image.buffer.sample(0, 40, 0), 1);
    assert_eq!(image.buffer.sample(0, 63, 63), 0);
}

#[tokio::test]
async fn test_one_bit_through_colormap() {
    let service = service_for(sample_store());

    let request =
        ReadRequest::new("landcover", env(0.0, 0.0, 64.0, 64.0), 64, 64).with_colormap(true);
    let image = image(service.read(&request).await.unwrap());

    assert_eq!(image.buffer.bands(), 4);
    assert_eq!(image.buffer.encoding(), CellEncoding::UInt8);

    // Class 1 is opaque green, class 0 opaque black.
    let rgba = |x, y| -> Vec<u64> { (0..4).map(|b| image.buffer.sample(b, x, y)).collect() };
    assert_eq!(rgba(8, 0), vec![0, 255, 0, 255]);
    assert_eq!(rgba(0, 0), vec![0, 0, 0, 255]);

    assert_eq!(
        service.output_format("landcover", None, true).await.unwrap(),
        (CellEncoding::UInt8, 4)
    );
    assert_eq!(
        service.output_format("landcover", None, false).await.unwrap(),
        (CellEncoding::Bit1, 1)
    );
}

#[tokio::test]
async fn test_colormap_ignored_without_one() {
    let service = service_for(sample_store());

    let request = ReadRequest::new("dem", env(0.0, 0.0, 100.0, 100.0), 100, 100).with_colormap(true);
    let image = image(service.read(&request).await.unwrap());

    assert_eq!(image.buffer.bands(), 1);
    assert_eq!(image.buffer.encoding(), CellEncoding::UInt8);
}

// =============================================================================
// Masks and Fill
// =============================================================================

#[tokio::test]
async fn test_mask_marks_invalid_pixels_as_fill() {
    let objects = MemoryObjectSource::new();
    let raster = TestRaster::new([0.0, 0.0, 32.0, 32.0], 32, 32).tile_size(32);
    let value = |_: usize, _: u32, _: u32| 7u64;
    raster.write(&objects, "masked", value);

    // Left half valid, right half invalid, on every row.
    let mask: Vec<u8> = [0xFF, 0xFF, 0x00, 0x00].repeat(32);
    let mut builder = raster.level_builder(0, &value);
    builder.set_tile(0, 0, 0, raster.tile_data(0, 0, 0, &value), Some(Bytes::from(mask)));
    objects.insert(level_key("masked", 0), builder.build());

    let service = service_for(objects);
    let request = ReadRequest::new("masked", env(0.0, 0.0, 32.0, 32.0), 32, 32).with_fill(9);
    let image = image(service.read(&request).await.unwrap());

    for y in [0, 15, 31] {
        assert_eq!(image.buffer.sample(0, 0, y), 7);
        assert_eq!(image.buffer.sample(0, 15, y), 7);
        assert_eq!(image.buffer.sample(0, 16, y), 9);
        assert_eq!(image.buffer.sample(0, 20, y), 9);
        assert_eq!(image.buffer.sample(0, 31, y), 9);
    }
}

#[tokio::test]
async fn test_missing_tiles_become_fill() {
    let objects = MemoryObjectSource::new();
    let raster = TestRaster::new([0.0, 0.0, 64.0, 32.0], 64, 32).tile_size(32);
    let value = |_: usize, _: u32, _: u32| 5u64;
    raster.write(&objects, "sparse", value);

    // Only the left tile is stored.
    let mut builder = LevelFileBuilder::new(2, 1, 1);
    builder.set_tile(0, 0, 0, raster.tile_data(0, 0, 0, &value), None);
    objects.insert(level_key("sparse", 0), builder.build());

    let service = service_for(objects);
    let request = ReadRequest::new("sparse", env(0.0, 0.0, 64.0, 32.0), 64, 32).with_fill(255);
    let image = image(service.read(&request).await.unwrap());

    assert_eq!(image.buffer.sample(0, 31, 10), 5);
    assert_eq!(image.buffer.sample(0, 32, 10), 255);
    assert_eq!(image.buffer.sample(0, 63, 31), 255);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_corrupt_tile() {
    let objects = MemoryObjectSource::new();
    let raster = TestRaster::new([0.0, 0.0, 32.0, 32.0], 32, 32).tile_size(32);
    let value = |_: usize, _: u32, _: u32| 1u64;
    raster.write(&objects, "broken", value);

    let mut builder = raster.level_builder(0, &value);
    builder.set_tile(0, 0, 0, vec![1u8; 10], None);
    objects.insert(level_key("broken", 0), builder.build());

    let service = service_for(objects);
    let err = service
        .read(&ReadRequest::new("broken", env(0.0, 0.0, 32.0, 32.0), 32, 32))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RasterError::CorruptTileData {
            expected: 1024,
            actual: 10,
            ..
        }
    ));
    assert!(!err.is_caller_error());
}

#[tokio::test]
async fn test_vanished_level_file() {
    let objects = sample_store();
    let service = service_for(objects.clone());

    service.describe_pyramid("dem").await.unwrap();
    objects.remove(&level_key("dem", 0));

    let err = service
        .read(&ReadRequest::new("dem", env(0.0, 0.0, 100.0, 100.0), 100, 100))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RasterError::TileFetch {
            level: 0,
            source: IoError::NotFound(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_raster() {
    let service = service_for(sample_store());

    let err = service
        .read(&ReadRequest::new("nope", env(0.0, 0.0, 10.0, 10.0), 10, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, RasterError::RasterNotFound { .. }));
}

#[tokio::test]
async fn test_band_out_of_range() {
    let service = service_for(sample_store());

    let request =
        ReadRequest::new("dem", env(0.0, 0.0, 10.0, 10.0), 10, 10).with_bands(vec![3]);
    let err = service.read(&request).await.unwrap_err();

    assert!(matches!(err, RasterError::BandOutOfRange { band: 3, bands: 1 }));
    assert!(err.is_caller_error());
}

#[tokio::test]
async fn test_repeated_band_is_rejected() {
    let objects = sample_store();
    let service = service_for(objects.clone());

    service.describe_pyramid("dem").await.unwrap();
    let readers_before = objects.readers_created();

    let request =
        ReadRequest::new("dem", env(0.0, 0.0, 10.0, 10.0), 10, 10).with_bands(vec![0, 0]);
    let err = service.read(&request).await.unwrap_err();

    assert!(matches!(err, RasterError::DuplicateBand { band: 0 }));
    assert!(err.is_caller_error());
    assert_eq!(objects.readers_created(), readers_before);
}

#[tokio::test]
async fn test_huge_envelope_reads_coarsest_level() {
    let service = service_for(sample_store());

    let request = ReadRequest::new("dem", env(-1e20, -1e20, 1e20, 1e20), 256, 256);
    let image = image(service.read(&request).await.unwrap());

    assert_eq!(image.level, 2);
    assert_eq!((image.buffer.width(), image.buffer.height()), (250, 250));
    assert_close(image.envelope.min_x, 0.0);
    assert_close(image.envelope.max_x, 1000.0);
}

#[tokio::test]
async fn test_crs_mismatch() {
    let service = service_for(sample_store());

    let envelope = Envelope::new(0.0, 0.0, 10.0, 10.0, Crs::new("EPSG:4326"));
    let err = service
        .read(&ReadRequest::new("dem", envelope, 10, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, RasterError::CrsMismatch { .. }));
}
