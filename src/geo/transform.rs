//! Raster-to-model (pixel-to-geographic) transform.
//!
//! The transform is an axis-aligned affine map anchored at pixel corners:
//! the upper-left corner of the first grid pixel maps to the upper-left
//! corner of the envelope (`min_x`, `max_y`), and pixel rows grow southward.
//!
//! ```text
//!   geo_x = scale_x * px + translate_x
//!   geo_y = scale_y * py + translate_y      (scale_y < 0)
//! ```
//!
//! The geo-to-pixel direction uses coefficients obtained by inverting the
//! forward map, so `geo_to_pixel(pixel_to_geo(r))` reproduces `r` up to
//! floating-point rounding.

use crate::error::RasterError;

use super::envelope::{Crs, Envelope};
use super::rect::{PixelBounds, PixelRect};

// =============================================================================
// GridRange
// =============================================================================

/// Inclusive pixel grid range (`high` is the last valid pixel index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub low_x: i64,
    pub low_y: i64,
    pub high_x: i64,
    pub high_y: i64,
}

impl GridRange {
    /// Grid range of a `width` x `height` image whose first pixel sits at
    /// (`x_offset`, `y_offset`).
    pub fn new(x_offset: i64, y_offset: i64, width: i64, height: i64) -> Self {
        Self {
            low_x: x_offset,
            low_y: y_offset,
            high_x: x_offset + width - 1,
            high_y: y_offset + height - 1,
        }
    }

    /// Number of pixels along x (`high - low + 1`).
    pub fn span_x(&self) -> i64 {
        self.high_x - self.low_x + 1
    }

    /// Number of pixels along y (`high - low + 1`).
    pub fn span_y(&self) -> i64 {
        self.high_y - self.low_y + 1
    }

    /// The equivalent half-open pixel rectangle.
    pub fn to_rect(&self) -> PixelRect {
        PixelRect::new(self.low_x, self.low_y, self.span_x(), self.span_y())
    }
}

// =============================================================================
// RasterToModelTransform
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Axis {
    scale: f64,
    translate: f64,
}

impl Axis {
    fn apply(&self, value: f64) -> f64 {
        self.scale * value + self.translate
    }

    fn inverse(&self) -> Axis {
        Axis {
            scale: 1.0 / self.scale,
            translate: -self.translate / self.scale,
        }
    }
}

/// Corner-anchored mapping between a level's pixel grid and its envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterToModelTransform {
    forward_x: Axis,
    forward_y: Axis,
    inverse_x: Axis,
    inverse_y: Axis,
    crs: Crs,
}

impl RasterToModelTransform {
    /// Build the transform mapping `grid` onto `envelope`.
    pub fn new(grid: &GridRange, envelope: &Envelope) -> Result<Self, RasterError> {
        let span_x = grid.span_x();
        let span_y = grid.span_y();
        if span_x <= 0 || span_y <= 0 {
            return Err(RasterError::InvalidMetadata(format!(
                "grid range {}x{} has no pixels",
                span_x, span_y
            )));
        }
        if !envelope.is_valid() || envelope.width() <= 0.0 || envelope.height() <= 0.0 {
            return Err(RasterError::InvalidMetadata(format!(
                "envelope {} has no area",
                envelope
            )));
        }

        let x_res = envelope.width() / span_x as f64;
        let y_res = envelope.height() / span_y as f64;

        let forward_x = Axis {
            scale: x_res,
            translate: envelope.min_x - x_res * grid.low_x as f64,
        };
        let forward_y = Axis {
            scale: -y_res,
            translate: envelope.max_y + y_res * grid.low_y as f64,
        };

        Ok(Self::from_axes(forward_x, forward_y, envelope.crs.clone()))
    }

    /// Build a transform whose pixel (0, 0) corner sits at (`origin_x`,
    /// `origin_y`), the upper-left geographic corner, with the given
    /// resolutions.
    pub fn from_origin(
        origin_x: f64,
        origin_y: f64,
        x_res: f64,
        y_res: f64,
        crs: Crs,
    ) -> Result<Self, RasterError> {
        if !(x_res.is_finite() && y_res.is_finite() && x_res > 0.0 && y_res > 0.0) {
            return Err(RasterError::InvalidMetadata(format!(
                "resolution {} x {} must be positive",
                x_res, y_res
            )));
        }
        let forward_x = Axis {
            scale: x_res,
            translate: origin_x,
        };
        let forward_y = Axis {
            scale: -y_res,
            translate: origin_y,
        };
        Ok(Self::from_axes(forward_x, forward_y, crs))
    }

    fn from_axes(forward_x: Axis, forward_y: Axis, crs: Crs) -> Self {
        let inverse_x = forward_x.inverse();
        let inverse_y = forward_y.inverse();
        Self {
            forward_x,
            forward_y,
            inverse_x,
            inverse_y,
            crs,
        }
    }

    /// Geographic units per pixel along x.
    pub fn x_res(&self) -> f64 {
        self.forward_x.scale
    }

    /// Geographic units per pixel along y (positive).
    pub fn y_res(&self) -> f64 {
        -self.forward_y.scale
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Map a pixel corner to geographic coordinates.
    pub fn pixel_to_geo_point(&self, px: f64, py: f64) -> (f64, f64) {
        (self.forward_x.apply(px), self.forward_y.apply(py))
    }

    /// Map a geographic point to (fractional) pixel coordinates.
    pub fn geo_to_pixel_point(&self, x: f64, y: f64) -> (f64, f64) {
        (self.inverse_x.apply(x), self.inverse_y.apply(y))
    }

    /// Envelope covered by a pixel rectangle.
    pub fn pixel_to_geo(&self, rect: &PixelRect) -> Envelope {
        let (x0, y0) = self.pixel_to_geo_point(rect.x as f64, rect.y as f64);
        let (x1, y1) = self.pixel_to_geo_point(rect.max_x() as f64, rect.max_y() as f64);
        Envelope::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1), self.crs.clone())
    }

    /// Fractional pixel bounds of an envelope.
    pub fn geo_to_pixel(&self, envelope: &Envelope) -> PixelBounds {
        let (x0, y0) = self.geo_to_pixel_point(envelope.min_x, envelope.max_y);
        let (x1, y1) = self.geo_to_pixel_point(envelope.max_x, envelope.min_y);
        PixelBounds::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}
