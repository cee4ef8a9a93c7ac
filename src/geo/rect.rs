//! Integer pixel rectangles and their floating-point precursors.

use std::fmt;

use serde::Serialize;

/// Relative tolerance for treating a pixel coordinate as an exact integer
/// before flooring/ceiling.
const SNAP_EPSILON: f64 = 1e-9;

// =============================================================================
// PixelRect
// =============================================================================

/// An integer rectangle in pixel (or tile-index) space.
///
/// `x`/`y` is the upper-left corner; the far edge (`x + width`,
/// `y + height`) is exclusive. [`PixelRect::EMPTY`] (width and height -1) is
/// the "no overlap" sentinel carried by empty query plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub const EMPTY: PixelRect = PixelRect {
        x: 0,
        y: 0,
        width: -1,
        height: -1,
    };

    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from an inclusive min corner and an exclusive max corner.
    pub const fn from_corners(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self::new(
            min_x,
            min_y,
            max_x.saturating_sub(min_x),
            max_y.saturating_sub(min_y),
        )
    }

    pub const fn max_x(&self) -> i64 {
        self.x + self.width
    }

    pub const fn max_y(&self) -> i64 {
        self.y + self.height
    }

    /// Zero or negative extent in either axis.
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width * self.height
        }
    }

    /// Grow by `by` pixels on every side.
    pub const fn expand(&self, by: i64) -> Self {
        Self::new(
            self.x - by,
            self.y - by,
            self.width + 2 * by,
            self.height + 2 * by,
        )
    }

    pub const fn translate(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Half-open overlap test on the corners. A zero-extent rectangle lying
    /// strictly inside `other` still counts as intersecting.
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.width >= 0
            && self.height >= 0
            && other.width >= 0
            && other.height >= 0
            && self.x < other.max_x()
            && other.x < self.max_x().max(self.x + 1)
            && self.y < other.max_y()
            && other.y < self.max_y().max(self.y + 1)
    }

    /// The clipped rectangle. The result may have zero or negative extent
    /// when the inputs only touch or do not overlap.
    pub fn intersection(&self, other: &PixelRect) -> PixelRect {
        PixelRect::from_corners(
            self.x.max(other.x),
            self.y.max(other.y),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        )
    }

    pub fn contains(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        PixelRect::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }
}

impl fmt::Display for PixelRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]-[{}, {}]",
            self.x,
            self.y,
            self.max_x(),
            self.max_y()
        )
    }
}

// =============================================================================
// PixelBounds
// =============================================================================

/// Un-rounded pixel-space rectangle, as produced by geo-to-pixel mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl PixelBounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Integer rectangle covering these bounds: the min corner is floored and
    /// the max corner ceiled, so no partially covered pixel is lost.
    pub fn to_covering_rect(&self) -> PixelRect {
        PixelRect::from_corners(
            snap(self.min_x).floor() as i64,
            snap(self.min_y).floor() as i64,
            snap(self.max_x).ceil() as i64,
            snap(self.max_y).ceil() as i64,
        )
    }

    /// Bounds limited to `rect`, so far-off coordinates convert to integer
    /// pixels without overflow.
    pub fn clamp_to(&self, rect: &PixelRect) -> PixelBounds {
        let (x0, x1) = (rect.x as f64, rect.max_x() as f64);
        let (y0, y1) = (rect.y as f64, rect.max_y() as f64);
        PixelBounds::new(
            self.min_x.clamp(x0, x1),
            self.min_y.clamp(y0, y1),
            self.max_x.clamp(x0, x1),
            self.max_y.clamp(y0, y1),
        )
    }

    /// Integer rectangle with every corner rounded to the nearest pixel.
    pub fn to_nearest_rect(&self) -> PixelRect {
        PixelRect::from_corners(
            self.min_x.round() as i64,
            self.min_y.round() as i64,
            self.max_x.round() as i64,
            self.max_y.round() as i64,
        )
    }
}

/// Pull values within floating-point noise of an integer onto it.
fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() <= SNAP_EPSILON * value.abs().max(1.0) {
        rounded
    } else {
        value
    }
}
