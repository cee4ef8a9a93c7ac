//! A single resolution level of a raster pyramid.

use crate::error::RasterError;
use crate::geo::{Crs, Envelope, GridRange, PixelRect, RasterToModelTransform};

use super::metadata::LevelMetadata;

/// One level of the pyramid.
///
/// Level pixels live inside a tile grid of `tiles_x` x `tiles_y` tiles whose
/// origin is pixel (0, 0). The level's own pixels start at
/// (`x_offset`, `y_offset`) in that grid, so a level may be padded on the
/// upper-left as well as on the lower-right.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidLevel {
    /// Level index (0 = highest resolution)
    pub index: usize,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    /// Geographic extent of the level's pixels
    pub envelope: Envelope,

    /// Geographic units per pixel along X
    pub x_res: f64,

    /// Geographic units per pixel along Y
    pub y_res: f64,

    /// Pixel offset of the first level pixel inside the tile grid
    pub x_offset: u32,
    pub y_offset: u32,
}

impl PyramidLevel {
    /// Build a level from its metadata, checking sizes and tile-grid coverage.
    pub fn from_metadata(
        meta: &LevelMetadata,
        tile_width: u32,
        tile_height: u32,
        crs: &Crs,
    ) -> Result<Self, RasterError> {
        if meta.width == 0 || meta.height == 0 {
            return Err(RasterError::InvalidMetadata(format!(
                "level {} has size {}x{}",
                meta.index, meta.width, meta.height
            )));
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(RasterError::InvalidMetadata(format!(
                "tile size {}x{} is empty",
                tile_width, tile_height
            )));
        }

        let [min_x, min_y, max_x, max_y] = meta.bounds;
        let envelope = Envelope::new(min_x, min_y, max_x, max_y, crs.clone());
        if !envelope.is_valid() || envelope.width() <= 0.0 || envelope.height() <= 0.0 {
            return Err(RasterError::InvalidMetadata(format!(
                "level {} has degenerate envelope {}",
                meta.index, envelope
            )));
        }

        let needed_x = (meta.x_offset as u64 + meta.width as u64).div_ceil(tile_width as u64);
        let needed_y = (meta.y_offset as u64 + meta.height as u64).div_ceil(tile_height as u64);
        let tiles_x = meta.tiles_x.unwrap_or(needed_x as u32);
        let tiles_y = meta.tiles_y.unwrap_or(needed_y as u32);

        if (tiles_x as u64) < needed_x || (tiles_y as u64) < needed_y {
            return Err(RasterError::InvalidMetadata(format!(
                "level {} tile grid {}x{} does not cover {}x{} pixels at offset ({}, {})",
                meta.index,
                tiles_x,
                tiles_y,
                meta.width,
                meta.height,
                meta.x_offset,
                meta.y_offset
            )));
        }

        Ok(Self {
            index: meta.index,
            width: meta.width,
            height: meta.height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            x_res: envelope.width() / meta.width as f64,
            y_res: envelope.height() / meta.height as f64,
            envelope,
            x_offset: meta.x_offset,
            y_offset: meta.y_offset,
        })
    }

    /// The level's pixels in tile-grid pixel space.
    pub fn pixel_rect(&self) -> PixelRect {
        PixelRect::new(
            self.x_offset as i64,
            self.y_offset as i64,
            self.width as i64,
            self.height as i64,
        )
    }

    pub fn grid_range(&self) -> GridRange {
        GridRange::new(
            self.x_offset as i64,
            self.y_offset as i64,
            self.width as i64,
            self.height as i64,
        )
    }

    /// Pixel-to-geographic transform for this level.
    pub fn transform(&self) -> Result<RasterToModelTransform, RasterError> {
        RasterToModelTransform::new(&self.grid_range(), &self.envelope)
    }

    /// Get the tile index for a given tile coordinate.
    ///
    /// Returns None if the coordinates are out of bounds.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }

    /// Full pixel rectangle of a tile in tile-grid pixel space.
    ///
    /// Edge tiles extend past the level's pixels; intersect with
    /// [`pixel_rect`](Self::pixel_rect) for the valid part.
    pub fn tile_rect(&self, tile_x: u32, tile_y: u32) -> Option<PixelRect> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(PixelRect::new(
            tile_x as i64 * self.tile_width as i64,
            tile_y as i64 * self.tile_height as i64,
            self.tile_width as i64,
            self.tile_height as i64,
        ))
    }

    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }
}
