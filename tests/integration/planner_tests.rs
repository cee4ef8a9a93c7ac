//! Query planning properties over a real pyramid description.
//!
//! Tests verify:
//! - Level selection for coarse and fine requests
//! - Plans stay inside the chosen level and their tiles cover the overlap
//! - Non-overlapping requests give empty plans
//! - Request validation errors

use raster_streamer::geo::{Crs, Envelope, PixelRect};
use raster_streamer::query::{QueryPlan, QueryPlanner};
use raster_streamer::raster::{Pyramid, RasterInfo};
use raster_streamer::RasterError;

use super::test_utils::{dem_raster, CRS};

fn pyramid() -> Pyramid {
    RasterInfo::from_metadata("dem", dem_raster().metadata())
        .unwrap()
        .pyramid
}

fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
    Envelope::new(min_x, min_y, max_x, max_y, Crs::new(CRS))
}

fn plan(envelope: &Envelope, width: u32, height: u32) -> QueryPlan {
    QueryPlanner::new()
        .plan(envelope, width, height, &pyramid())
        .unwrap()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
}

// =============================================================================
// Level Selection
// =============================================================================

#[test]
fn test_level_choice_follows_requested_resolution() {
    let full = env(0.0, 0.0, 1000.0, 1000.0);

    assert_eq!(plan(&full, 250, 250).level, 2);
    assert_eq!(plan(&full, 300, 300).level, 1);
    assert_eq!(plan(&full, 500, 500).level, 1);
    assert_eq!(plan(&full, 1000, 1000).level, 0);
    // Finer than the base level still reads the base level.
    assert_eq!(plan(&full, 2000, 2000).level, 0);
}

#[test]
fn test_level_is_monotonic_in_output_size() {
    let full = env(0.0, 0.0, 1000.0, 1000.0);

    let mut previous = usize::MAX;
    for size in [10, 100, 249, 250, 251, 400, 499, 500, 501, 999, 1000, 4000] {
        let level = plan(&full, size, size).level;
        assert!(
            level <= previous,
            "level {} at size {} after level {}",
            level,
            size,
            previous
        );
        previous = level;
    }
}

#[test]
fn test_coarse_read_output_size() {
    let full = env(0.0, 0.0, 1000.0, 1000.0);

    assert_eq!(plan(&full, 250, 250).output_size(), (250, 250));
    assert_eq!(plan(&full, 300, 300).output_size(), (500, 500));
}

// =============================================================================
// Coverage
// =============================================================================

#[test]
fn test_window_inside_one_level() {
    let result = plan(&env(10.0, 734.0, 266.0, 990.0), 256, 256);

    assert_eq!(result.level, 0);
    assert_eq!(result.pixel_overlap, PixelRect::new(10, 10, 256, 256));
    assert_eq!(result.tile_range, PixelRect::from_corners(0, 0, 2, 2));
    assert_eq!(result.tile_count(), 4);
    assert_eq!(result.result_window, PixelRect::new(10, 10, 256, 256));

    let envelope = &result.result_envelope;
    assert_close(envelope.min_x, 10.0);
    assert_close(envelope.min_y, 734.0);
    assert_close(envelope.max_x, 266.0);
    assert_close(envelope.max_y, 990.0);
}

#[test]
fn test_partial_overlap_is_clipped() {
    let result = plan(&env(900.0, -100.0, 1100.0, 100.0), 200, 200);

    assert_eq!(result.level, 0);
    assert_eq!(result.pixel_overlap, PixelRect::new(900, 900, 100, 100));
    assert_eq!(result.tile_range, PixelRect::from_corners(3, 3, 4, 4));
    assert_eq!(result.result_window, PixelRect::new(132, 132, 100, 100));

    let envelope = &result.result_envelope;
    assert_close(envelope.min_x, 900.0);
    assert_close(envelope.min_y, 0.0);
    assert_close(envelope.max_x, 1000.0);
    assert_close(envelope.max_y, 100.0);
}

#[test]
fn test_plans_stay_inside_level_and_tiles_cover_overlap() {
    let pyramid = pyramid();
    let planner = QueryPlanner::new();

    let requests = [
        (env(0.0, 0.0, 1000.0, 1000.0), 250, 250),
        (env(-50.0, -50.0, 300.0, 300.0), 350, 350),
        (env(123.4, 567.8, 901.2, 999.9), 100, 60),
        (env(999.0, 999.0, 1500.0, 1500.0), 10, 10),
        (env(333.3, 0.5, 334.1, 1.7), 1, 1),
    ];

    for (envelope, width, height) in requests {
        let result = planner.plan(&envelope, width, height, &pyramid).unwrap();
        assert!(!result.is_empty(), "{} should overlap", envelope);

        let level = pyramid.get_level(result.level).unwrap();
        let overlap = result.pixel_overlap;
        assert!(level.pixel_rect().contains(&overlap));

        let (tw, th) = (level.tile_width as i64, level.tile_height as i64);
        let tiles = result.tile_range;
        assert!(tiles.x * tw <= overlap.x && tiles.max_x() * tw >= overlap.max_x());
        assert!(tiles.y * th <= overlap.y && tiles.max_y() * th >= overlap.max_y());
        assert!(tiles.x >= 0 && tiles.max_x() <= level.tiles_x as i64);
        assert!(tiles.y >= 0 && tiles.max_y() <= level.tiles_y as i64);

        assert_eq!(result.result_window.width, overlap.width);
        assert_eq!(result.result_window.height, overlap.height);
        assert!(level.envelope.contains(&result.result_envelope));
    }
}

#[test]
fn test_result_envelope_round_trips_to_overlap() {
    let pyramid = pyramid();
    let result = plan(&env(123.4, 567.8, 901.2, 999.9), 100, 60);

    let level = pyramid.get_level(result.level).unwrap();
    let transform = level.transform().unwrap();
    let back = transform
        .geo_to_pixel(&result.result_envelope)
        .to_nearest_rect();

    assert_eq!(back, result.pixel_overlap);
}

#[test]
fn test_planning_is_idempotent() {
    let envelope = env(-50.0, -50.0, 300.0, 300.0);
    assert_eq!(plan(&envelope, 350, 350), plan(&envelope, 350, 350));
}

// =============================================================================
// Empty Plans and Validation
// =============================================================================

#[test]
fn test_outside_request_gives_empty_plan() {
    for envelope in [
        env(2000.0, 2000.0, 3000.0, 3000.0),
        env(-500.0, 0.0, -100.0, 1000.0),
        env(0.0, 1500.0, 1000.0, 2500.0),
    ] {
        let result = plan(&envelope, 100, 100);
        assert!(result.is_empty());
        assert_eq!(result.output_size(), (0, 0));
        assert_eq!(result.tile_count(), 0);
        assert!(result.result_envelope.is_empty());
    }
}

#[test]
fn test_crs_mismatch() {
    let envelope = Envelope::new(0.0, 0.0, 10.0, 10.0, Crs::new("EPSG:4326"));
    let err = QueryPlanner::new()
        .plan(&envelope, 10, 10, &pyramid())
        .unwrap_err();

    assert!(matches!(err, RasterError::CrsMismatch { .. }));
    assert!(err.is_caller_error());
}

#[test]
fn test_zero_dimensions() {
    let err = QueryPlanner::new()
        .plan(&env(0.0, 0.0, 10.0, 10.0), 0, 10, &pyramid())
        .unwrap_err();

    assert!(matches!(
        err,
        RasterError::InvalidRequestDimensions {
            width: 0,
            height: 10
        }
    ));
}

#[test]
fn test_inverted_envelope() {
    let err = QueryPlanner::new()
        .plan(&env(10.0, 0.0, 0.0, 10.0), 10, 10, &pyramid())
        .unwrap_err();

    assert!(matches!(err, RasterError::InvalidEnvelope(_)));
}
