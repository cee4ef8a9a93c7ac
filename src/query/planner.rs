//! Geographic request to pixel/tile plan.
//!
//! # Planning Steps
//!
//! ```text
//!   envelope, width x height
//!        │
//!        ▼
//!   pick_level ──► level transform ──► covering pixel rect
//!                                           │
//!                          clip to level (1-pixel tolerance)
//!                                           │
//!                                           ▼
//!                 pixel_overlap ──► tile_range ──► result_window
//!                       │
//!                       └──► result_envelope = pixel_to_geo(pixel_overlap)
//! ```
//!
//! Planning is pure and performs no I/O. All request validation happens
//! here, so a request that fails validation never opens a tile session.

use serde::Serialize;
use tracing::debug;

use crate::error::RasterError;
use crate::geo::{Envelope, PixelRect};
use crate::raster::Pyramid;

/// Result of planning one read.
///
/// All pixel rectangles are in the level's tile-grid pixel space except
/// `result_window`, which is relative to the upper-left pixel of
/// `tile_range`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub requested_envelope: Envelope,
    pub requested_width: u32,
    pub requested_height: u32,

    /// Chosen pyramid level
    pub level: usize,

    /// Level pixels covered by the request
    pub pixel_overlap: PixelRect,

    /// Tile indices covering `pixel_overlap` (exclusive far edge)
    pub tile_range: PixelRect,

    /// Geographic extent of exactly the pixels in `pixel_overlap`
    pub result_envelope: Envelope,

    /// `pixel_overlap` relative to the tile-aligned origin of `tile_range`
    pub result_window: PixelRect,
}

impl QueryPlan {
    fn empty(envelope: &Envelope, width: u32, height: u32, level: usize) -> Self {
        Self {
            requested_envelope: envelope.clone(),
            requested_width: width,
            requested_height: height,
            level,
            pixel_overlap: PixelRect::EMPTY,
            tile_range: PixelRect::EMPTY,
            result_envelope: Envelope::empty(envelope.crs.clone()),
            result_window: PixelRect::EMPTY,
        }
    }

    /// True when the request does not overlap the raster.
    pub fn is_empty(&self) -> bool {
        self.pixel_overlap.is_empty()
    }

    /// Output size of the assembled image `(width, height)`.
    pub fn output_size(&self) -> (u32, u32) {
        if self.is_empty() {
            (0, 0)
        } else {
            (
                self.pixel_overlap.width as u32,
                self.pixel_overlap.height as u32,
            )
        }
    }

    /// Number of tiles per band the plan touches.
    pub fn tile_count(&self) -> i64 {
        self.tile_range.area()
    }
}

/// Stateless planner. Construct once and reuse.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan a read of `envelope` at `width` x `height` output pixels.
    pub fn plan(
        &self,
        envelope: &Envelope,
        width: u32,
        height: u32,
        pyramid: &Pyramid,
    ) -> Result<QueryPlan, RasterError> {
        if !envelope.is_valid() {
            return Err(RasterError::InvalidEnvelope(envelope.to_string()));
        }
        if &envelope.crs != pyramid.crs() {
            return Err(RasterError::CrsMismatch {
                expected: pyramid.crs().clone(),
                actual: envelope.crs.clone(),
            });
        }

        let level_index = pyramid.pick_level(envelope, width, height)?;
        let level = pyramid.get_level(level_index)?;

        if !envelope.intersects(&level.envelope) {
            debug!(
                envelope = %envelope,
                level = level_index,
                "Request outside level envelope"
            );
            return Ok(QueryPlan::empty(envelope, width, height, level_index));
        }

        let transform = level.transform()?;
        let level_rect = level.pixel_rect();
        let requested = transform
            .geo_to_pixel(envelope)
            .clamp_to(&level_rect.expand(1))
            .to_covering_rect();

        if !requested.intersects(&level_rect.expand(1)) {
            debug!(
                requested = %requested,
                level_rect = %level_rect,
                "Requested pixels miss the level"
            );
            return Ok(QueryPlan::empty(envelope, width, height, level_index));
        }

        let mut overlap = requested.intersection(&level_rect);
        if overlap.width <= 0 {
            overlap.x = overlap.x.min(level_rect.max_x() - 1).max(level_rect.x);
            overlap.width = 1;
        }
        if overlap.height <= 0 {
            overlap.y = overlap.y.min(level_rect.max_y() - 1).max(level_rect.y);
            overlap.height = 1;
        }

        let tile_w = level.tile_width as i64;
        let tile_h = level.tile_height as i64;
        let tile_range = PixelRect::from_corners(
            overlap.x.div_euclid(tile_w),
            overlap.y.div_euclid(tile_h),
            (overlap.max_x() + tile_w - 1).div_euclid(tile_w),
            (overlap.max_y() + tile_h - 1).div_euclid(tile_h),
        );
        let result_window = overlap.translate(-tile_range.x * tile_w, -tile_range.y * tile_h);
        let result_envelope = transform.pixel_to_geo(&overlap);

        debug!(
            level = level_index,
            overlap = %overlap,
            tiles = %tile_range,
            "Planned raster read"
        );

        Ok(QueryPlan {
            requested_envelope: envelope.clone(),
            requested_width: width,
            requested_height: height,
            level: level_index,
            pixel_overlap: overlap,
            tile_range,
            result_envelope,
            result_window,
        })
    }
}
