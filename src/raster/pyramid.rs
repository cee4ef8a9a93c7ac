//! Multi-resolution pyramid and level selection.
//!
//! # Level Selection
//!
//! For a request of `width` x `height` output pixels over an envelope, the
//! requested resolution is `envelope.width / width` by
//! `envelope.height / height`. The chosen level is the coarsest one whose
//! resolution is still at least as fine as the request on both axes, so the
//! caller never receives fewer pixels than asked for. When every level is
//! coarser than the request, level 0 is used.

use serde::Serialize;

use crate::error::RasterError;
use crate::geo::{Crs, Envelope};

use super::level::PyramidLevel;

/// Relative tolerance on resolution comparisons.
const RESOLUTION_EPSILON: f64 = 1e-9;

/// Immutable, validated list of pyramid levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    /// Build a pyramid, sorting levels by index.
    ///
    /// Fails with `InvalidMetadata` unless indices are contiguous from 0,
    /// all levels share the tile size and CRS, and resolution never gets
    /// finer as the index grows.
    pub fn new(mut levels: Vec<PyramidLevel>) -> Result<Self, RasterError> {
        if levels.is_empty() {
            return Err(RasterError::InvalidMetadata(
                "pyramid has no levels".to_string(),
            ));
        }
        levels.sort_by_key(|l| l.index);

        let base = &levels[0];
        for (position, level) in levels.iter().enumerate() {
            if level.index != position {
                return Err(RasterError::InvalidMetadata(format!(
                    "level indices are not contiguous: expected {}, found {}",
                    position, level.index
                )));
            }
            if (level.tile_width, level.tile_height) != (base.tile_width, base.tile_height) {
                return Err(RasterError::InvalidMetadata(format!(
                    "level {} tile size {}x{} differs from {}x{}",
                    level.index,
                    level.tile_width,
                    level.tile_height,
                    base.tile_width,
                    base.tile_height
                )));
            }
            if level.envelope.crs != base.envelope.crs {
                return Err(RasterError::InvalidMetadata(format!(
                    "level {} CRS {} differs from {}",
                    level.index, level.envelope.crs, base.envelope.crs
                )));
            }
        }

        for pair in levels.windows(2) {
            let (finer, coarser) = (&pair[0], &pair[1]);
            if coarser.x_res < finer.x_res * (1.0 - RESOLUTION_EPSILON)
                || coarser.y_res < finer.y_res * (1.0 - RESOLUTION_EPSILON)
            {
                return Err(RasterError::InvalidMetadata(format!(
                    "level {} is finer than level {}",
                    coarser.index, finer.index
                )));
            }
        }

        Ok(Self { levels })
    }

    /// Get the number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    /// Get a pyramid level by index.
    pub fn get_level(&self, index: usize) -> Result<&PyramidLevel, RasterError> {
        self.levels
            .get(index)
            .ok_or(RasterError::LevelIndexOutOfRange {
                index,
                levels: self.levels.len(),
            })
    }

    /// Get the base (highest resolution) level.
    pub fn base_level(&self) -> &PyramidLevel {
        &self.levels[0]
    }

    pub fn crs(&self) -> &Crs {
        &self.base_level().envelope.crs
    }

    /// Shared tile size `(width, height)`.
    pub fn tile_size(&self) -> (u32, u32) {
        let base = self.base_level();
        (base.tile_width, base.tile_height)
    }

    /// Pick the level that best serves `width` x `height` output pixels over
    /// `envelope`.
    pub fn pick_level(
        &self,
        envelope: &Envelope,
        width: u32,
        height: u32,
    ) -> Result<usize, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidRequestDimensions { width, height });
        }

        let req_x_res = envelope.width() / width as f64;
        let req_y_res = envelope.height() / height as f64;

        let chosen = self
            .levels
            .iter()
            .rev()
            .find(|l| {
                req_x_res >= l.x_res * (1.0 - RESOLUTION_EPSILON)
                    && req_y_res >= l.y_res * (1.0 - RESOLUTION_EPSILON)
            })
            .map_or(0, |l| l.index);

        Ok(chosen)
    }

    /// Per-level summary for diagnostics.
    pub fn describe(&self) -> Vec<LevelDescription> {
        self.levels.iter().map(LevelDescription::from).collect()
    }
}

/// Serializable summary of one level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelDescription {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub x_res: f64,
    pub y_res: f64,
    pub envelope: Envelope,
}

impl From<&PyramidLevel> for LevelDescription {
    fn from(level: &PyramidLevel) -> Self {
        Self {
            index: level.index,
            width: level.width,
            height: level.height,
            tile_width: level.tile_width,
            tile_height: level.tile_height,
            tiles_x: level.tiles_x,
            tiles_y: level.tiles_y,
            x_offset: level.x_offset,
            y_offset: level.y_offset,
            x_res: level.x_res,
            y_res: level.y_res,
            envelope: level.envelope.clone(),
        }
    }
}
