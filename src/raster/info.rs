//! Raster and band descriptions.

use serde::{Deserialize, Serialize};

use crate::error::RasterError;
use crate::geo::{Crs, Envelope, GridRange};

use super::metadata::RasterMetadata;
use super::level::PyramidLevel;
use super::pyramid::Pyramid;

// =============================================================================
// Cell encodings
// =============================================================================

/// Storage type of one band sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellEncoding {
    Bit1,
    Bit2,
    Bit4,
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl CellEncoding {
    pub fn bits_per_sample(&self) -> u32 {
        match self {
            CellEncoding::Bit1 => 1,
            CellEncoding::Bit2 => 2,
            CellEncoding::Bit4 => 4,
            CellEncoding::UInt8 | CellEncoding::Int8 => 8,
            CellEncoding::UInt16 | CellEncoding::Int16 => 16,
            CellEncoding::UInt32 | CellEncoding::Int32 | CellEncoding::Float32 => 32,
            CellEncoding::Float64 => 64,
        }
    }

    /// Samples narrower than a byte, stored packed MSB-first.
    pub fn is_packed(&self) -> bool {
        self.bits_per_sample() < 8
    }

    /// Bytes per sample for byte-aligned encodings, 0 for packed ones.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample() / 8) as usize
    }

    /// Bytes needed for `count` samples.
    pub fn byte_len(&self, count: usize) -> usize {
        (count * self.bits_per_sample() as usize).div_ceil(8)
    }
}

/// Tile compression as recorded in the raster's metadata. Tiles reach this
/// crate already decompressed; the value is descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    None,
    Lz77,
    Jpeg,
    Jpeg2000,
}

/// Palette of RGBA entries indexed by sample value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorMap {
    pub entries: Vec<[u8; 4]>,
}

impl ColorMap {
    pub fn lookup(&self, value: u64) -> Option<[u8; 4]> {
        usize::try_from(value)
            .ok()
            .and_then(|i| self.entries.get(i).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

// =============================================================================
// RasterBandInfo
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterBandInfo {
    pub band: usize,
    pub encoding: CellEncoding,
    pub compression: Compression,
    pub tile_width: u32,
    pub tile_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colormap: Option<ColorMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<BandStatistics>,
}

impl RasterBandInfo {
    pub fn has_colormap(&self) -> bool {
        self.colormap.is_some()
    }

    pub fn has_statistics(&self) -> bool {
        self.statistics.is_some()
    }

    pub fn min(&self) -> Option<f64> {
        self.statistics.map(|s| s.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.statistics.map(|s| s.max)
    }
}

// =============================================================================
// RasterInfo
// =============================================================================

/// Everything needed to plan reads against one raster. Immutable once built
/// and shared between requests through the metadata cache.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub raster_id: String,
    pub crs: Crs,
    /// Extent of the base level
    pub envelope: Envelope,
    /// Pixel grid of the base level
    pub grid_range: GridRange,
    pub bands: Vec<RasterBandInfo>,
    pub pyramid: Pyramid,
}

impl RasterInfo {
    /// Validate raw metadata and build the pyramid.
    pub fn from_metadata(
        raster_id: impl Into<String>,
        metadata: RasterMetadata,
    ) -> Result<Self, RasterError> {
        let raster_id = raster_id.into();

        if metadata.levels.is_empty() {
            return Err(RasterError::MetadataUnavailable {
                raster_id,
                reason: "raster has no pyramid levels".to_string(),
            });
        }
        if metadata.bands.is_empty() {
            return Err(RasterError::InvalidMetadata(format!(
                "raster {} has no bands",
                raster_id
            )));
        }

        let levels = metadata
            .levels
            .iter()
            .map(|l| {
                PyramidLevel::from_metadata(
                    l,
                    metadata.tile_width,
                    metadata.tile_height,
                    &metadata.crs,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pyramid = Pyramid::new(levels)?;

        let bands = metadata
            .bands
            .into_iter()
            .enumerate()
            .map(|(band, b)| RasterBandInfo {
                band,
                encoding: b.encoding,
                compression: b.compression,
                tile_width: metadata.tile_width,
                tile_height: metadata.tile_height,
                colormap: b.colormap,
                statistics: b.statistics,
            })
            .collect();

        let base = pyramid.base_level();
        Ok(Self {
            raster_id,
            crs: metadata.crs,
            envelope: base.envelope.clone(),
            grid_range: base.grid_range(),
            bands,
            pyramid,
        })
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, band: usize) -> Result<&RasterBandInfo, RasterError> {
        self.bands.get(band).ok_or(RasterError::BandOutOfRange {
            band,
            bands: self.bands.len(),
        })
    }

    /// Every band index, in order.
    pub fn all_bands(&self) -> Vec<usize> {
        (0..self.bands.len()).collect()
    }

    /// The single encoding shared by `bands`. Each band may be selected once.
    pub fn encoding_for(&self, bands: &[usize]) -> Result<CellEncoding, RasterError> {
        let mut encoding = None;
        for (i, &band) in bands.iter().enumerate() {
            let info = self.band(band)?;
            if bands[..i].contains(&band) {
                return Err(RasterError::DuplicateBand { band });
            }
            match encoding {
                None => encoding = Some(info.encoding),
                Some(e) if e != info.encoding => return Err(RasterError::MixedBandEncodings),
                Some(_) => {}
            }
        }
        encoding.ok_or_else(|| RasterError::BandOutOfRange {
            band: 0,
            bands: self.bands.len(),
        })
    }
}
