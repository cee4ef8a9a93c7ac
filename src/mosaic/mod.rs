//! Output assembly: tiles into images, images into mosaics.

mod buffer;
mod compositor;

pub use buffer::PixelBuffer;
pub use compositor::{MosaicCompositor, MosaicLayout, TileAssembler};
