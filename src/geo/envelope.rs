//! Geographic envelopes and coordinate reference system codes.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Crs
// =============================================================================

/// Coordinate reference system code (e.g. `EPSG:4326`).
///
/// CRS codes are compared by exact string equality. Reprojection is the
/// caller's job; this crate only checks that a request and a raster agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    /// Create a CRS from its code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The CRS code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Crs {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// A closed geographic bounding box in a given CRS.
///
/// `Envelope::empty` produces a negative-area sentinel (`max < min`) used by
/// query plans that do not overlap the raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub crs: Crs,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Crs) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs,
        }
    }

    /// The negative-area "no coverage" envelope.
    pub fn empty(crs: Crs) -> Self {
        Self::new(0.0, 0.0, -1.0, -1.0, crs)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True for the negative-area sentinel (or any inverted envelope).
    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    /// All coordinates are finite and the corners are ordered.
    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && !self.is_empty()
    }

    /// Closed intersection test: envelopes that only share an edge intersect.
    pub fn intersects(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    /// Smallest envelope covering both. Empty operands are ignored.
    pub fn union(&self, other: &Envelope) -> Envelope {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Envelope::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
            self.crs.clone(),
        )
    }

    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        Some(Envelope::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
            self.crs.clone(),
        ))
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]-[{}, {}] ({})",
            self.min_x, self.min_y, self.max_x, self.max_y, self.crs
        )
    }
}
