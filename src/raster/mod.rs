//! Raster structure: pyramid levels, level selection and band descriptions.

mod info;
pub(crate) mod level;
mod metadata;
mod pyramid;

pub use info::{
    BandStatistics, CellEncoding, ColorMap, Compression, RasterBandInfo, RasterInfo,
};
pub use level::PyramidLevel;
pub use metadata::{BandMetadata, LevelMetadata, RasterMetadata};
pub use pyramid::{LevelDescription, Pyramid};
