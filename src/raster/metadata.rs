//! Raw raster metadata as returned by a metadata provider.
//!
//! This is the serialized form (`raster.json` in the tile store). It carries
//! no invariants of its own; [`RasterInfo::from_metadata`] validates it and
//! builds the pyramid.
//!
//! [`RasterInfo::from_metadata`]: super::RasterInfo::from_metadata

use serde::{Deserialize, Serialize};

use crate::geo::Crs;

use super::info::{BandStatistics, CellEncoding, ColorMap, Compression};

/// Description of a whole raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub crs: Crs,
    pub tile_width: u32,
    pub tile_height: u32,
    pub levels: Vec<LevelMetadata>,
    pub bands: Vec<BandMetadata>,
}

/// One pyramid level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelMetadata {
    pub index: usize,
    pub width: u32,
    pub height: u32,

    /// Tile grid size; derived from the pixel size and offsets when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles_x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles_y: Option<u32>,

    /// Position of the level's first pixel inside its tile grid.
    #[serde(default)]
    pub x_offset: u32,
    #[serde(default)]
    pub y_offset: u32,

    /// `[min_x, min_y, max_x, max_y]` in the raster CRS.
    pub bounds: [f64; 4],
}

/// One band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandMetadata {
    pub encoding: CellEncoding,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormap: Option<ColorMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<BandStatistics>,
}
