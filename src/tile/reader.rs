//! Bit-depth aware tile decoding over a tile session.
//!
//! # Payload Layout
//!
//! ```text
//!   ┌───────────────────────────────┬──────────────────────┐
//!   │ samples: ceil(tw*th*bits / 8) │ mask: ceil(tw*th/8)  │  (mask optional)
//!   └───────────────────────────────┴──────────────────────┘
//! ```
//!
//! The sample segment is cut at the length the cell encoding requires. A
//! trailing segment of exactly the mask length becomes a 1-bit validity
//! mask (1 = valid); any other trailing length is dropped.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::RasterError;
use crate::raster::CellEncoding;

use super::packed::{read_sample, PackedSamples};
use super::session::{RawTile, SessionGuard, TileFetch, TileSession};

/// Decoded sample data of one tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileData {
    /// Byte-aligned samples, little-endian, row-major
    Bytes(Bytes),
    /// Packed 1, 2 or 4-bit samples
    Packed(PackedSamples),
    /// The store has no data for this tile
    Missing,
}

/// One decoded tile of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTile {
    pub band: usize,
    pub column: u32,
    pub row: u32,
    pub data: TileData,
    /// 1-bit validity mask, 1 = valid
    pub mask: Option<PackedSamples>,
}

impl DecodedTile {
    pub fn is_missing(&self) -> bool {
        matches!(self.data, TileData::Missing)
    }

    /// Whether pixel (`x`, `y`) of the tile holds data.
    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        !self.is_missing() && self.mask.as_ref().map_or(true, |m| m.sample(x, y) != 0)
    }

    /// Raw sample bits at (`x`, `y`) within a tile `tile_width` pixels wide.
    pub fn sample(&self, encoding: CellEncoding, tile_width: u32, x: u32, y: u32) -> Option<u64> {
        match &self.data {
            TileData::Bytes(data) => {
                let index = y as usize * tile_width as usize + x as usize;
                Some(read_sample(data, encoding, index))
            }
            TileData::Packed(packed) => Some(packed.sample(x, y) as u64),
            TileData::Missing => None,
        }
    }
}

/// Reads and validates the tiles of one fetch, in session order.
///
/// The session is closed when the reader is dropped or [`finish`](Self::finish)ed.
pub struct TileReader<S: TileSession> {
    guard: SessionGuard<S>,
    fetch: TileFetch,
    encoding: CellEncoding,
    tile_width: u32,
    tile_height: u32,
    received: usize,
}

impl<S: TileSession> TileReader<S> {
    pub fn new(
        session: S,
        fetch: TileFetch,
        encoding: CellEncoding,
        tile_width: u32,
        tile_height: u32,
    ) -> Self {
        Self {
            guard: SessionGuard::new(session),
            fetch,
            encoding,
            tile_width,
            tile_height,
            received: 0,
        }
    }

    pub fn fetch(&self) -> &TileFetch {
        &self.fetch
    }

    pub fn encoding(&self) -> CellEncoding {
        self.encoding
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    /// Bytes of sample data in a full tile.
    pub fn expected_len(&self) -> usize {
        self.encoding
            .byte_len(self.tile_width as usize * self.tile_height as usize)
    }

    /// Bytes of a trailing validity mask.
    pub fn mask_len(&self) -> usize {
        (self.tile_width as usize * self.tile_height as usize).div_ceil(8)
    }

    /// Next decoded tile, or `None` when the session is exhausted.
    pub async fn next_tile(&mut self) -> Result<Option<DecodedTile>, RasterError> {
        let raw = match self.guard.next_tile().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(
                    raster_id = %self.fetch.raster_id,
                    level = self.fetch.level,
                    tiles = self.received,
                    "Tile session exhausted"
                );
                return Ok(None);
            }
            Err(source) => {
                return Err(RasterError::TileFetch {
                    raster_id: self.fetch.raster_id.clone(),
                    level: self.fetch.level,
                    tiles: self.fetch.tiles,
                    source,
                })
            }
        };
        self.received += 1;
        self.decode(raw).map(Some)
    }

    /// Close the session.
    pub fn finish(mut self) {
        self.guard.close();
    }

    fn decode(&self, raw: RawTile) -> Result<DecodedTile, RasterError> {
        if !self.fetch.covers(raw.band, raw.column, raw.row) {
            return Err(RasterError::UnexpectedTile {
                level: self.fetch.level,
                band: raw.band,
                column: raw.column,
                row: raw.row,
            });
        }

        let Some(bytes) = raw.bytes else {
            return Ok(DecodedTile {
                band: raw.band,
                column: raw.column,
                row: raw.row,
                data: TileData::Missing,
                mask: None,
            });
        };

        let expected = self.expected_len();
        let corrupt = |actual: usize| RasterError::CorruptTileData {
            level: self.fetch.level,
            band: raw.band,
            column: raw.column,
            row: raw.row,
            expected,
            actual,
        };

        if let Some(declared) = raw.declared_len {
            if declared != expected {
                return Err(corrupt(declared));
            }
        }
        if bytes.len() < expected {
            return Err(corrupt(bytes.len()));
        }

        let trailing = bytes.len() - expected;
        let mask = if trailing == 0 {
            None
        } else if trailing == self.mask_len() {
            PackedSamples::new(bytes.slice(expected..), 1, self.tile_width, self.tile_height)
        } else {
            warn!(
                level = self.fetch.level,
                band = raw.band,
                column = raw.column,
                row = raw.row,
                trailing,
                "Dropping trailing bytes that are not a validity mask"
            );
            None
        };

        let samples = bytes.slice(..expected);
        let data = if self.encoding.is_packed() {
            match PackedSamples::new(
                samples,
                self.encoding.bits_per_sample(),
                self.tile_width,
                self.tile_height,
            ) {
                Some(packed) => TileData::Packed(packed),
                None => return Err(corrupt(expected)),
            }
        } else {
            TileData::Bytes(samples)
        };

        Ok(DecodedTile {
            band: raw.band,
            column: raw.column,
            row: raw.row,
            data,
            mask,
        })
    }
}
