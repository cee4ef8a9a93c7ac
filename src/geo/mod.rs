//! Geometry primitives: envelopes, pixel rectangles and the affine transform
//! between them.

mod envelope;
mod rect;
mod transform;

pub use envelope::{Crs, Envelope};
pub use rect::{PixelBounds, PixelRect};
pub use transform::{GridRange, RasterToModelTransform};
