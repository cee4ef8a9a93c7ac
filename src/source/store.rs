//! Tile store: rasters laid out as plain objects.
//!
//! # Layout
//!
//! ```text
//!   {raster_id}/raster.json        RasterMetadata (JSON)
//!   {raster_id}/level_{n}.tiles    one file per pyramid level
//! ```
//!
//! # Level File Format (little-endian)
//!
//! ```text
//!   0   magic "RTIL"
//!   4   version (u32) = 1
//!   8   tiles_x (u32)
//!   12  tiles_y (u32)
//!   16  band_count (u32)
//!   20  reserved (u32)
//!   24  index: band_count * tiles_y * tiles_x entries, band-major then
//!       row-major, 16 bytes each:
//!         offset (u64), data_len (u32), mask_len (u32)
//!   ..  tile blobs: data followed by an optional validity mask
//! ```
//!
//! A zero `data_len` marks a tile the store has no data for.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::IoError;
use crate::io::{read_u32_le, read_u64_le, RangeReader};
use crate::raster::RasterMetadata;
use crate::tile::{RawTile, TileFetch, TileSession};

use super::{MetadataProvider, ObjectSource, TileSource};

pub const LEVEL_MAGIC: &[u8; 4] = b"RTIL";
pub const LEVEL_VERSION: u32 = 1;
pub const LEVEL_HEADER_SIZE: usize = 24;
pub const INDEX_ENTRY_SIZE: usize = 16;

/// Object key of a raster's metadata document.
pub fn metadata_key(raster_id: &str) -> String {
    format!("{}/raster.json", raster_id)
}

/// Object key of one level file.
pub fn level_key(raster_id: &str, level: usize) -> String {
    format!("{}/level_{}.tiles", raster_id, level)
}

// =============================================================================
// Level header and index
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelHeader {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub band_count: u32,
}

impl LevelHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, IoError> {
        if bytes.len() < LEVEL_HEADER_SIZE {
            return Err(IoError::Malformed(format!(
                "level header is {} bytes, need {}",
                bytes.len(),
                LEVEL_HEADER_SIZE
            )));
        }
        if &bytes[0..4] != LEVEL_MAGIC {
            return Err(IoError::Malformed("bad level file magic".to_string()));
        }
        let version = read_u32_le(&bytes[4..8]);
        if version != LEVEL_VERSION {
            return Err(IoError::Malformed(format!(
                "unsupported level file version {}",
                version
            )));
        }
        Ok(Self {
            tiles_x: read_u32_le(&bytes[8..12]),
            tiles_y: read_u32_le(&bytes[12..16]),
            band_count: read_u32_le(&bytes[16..20]),
        })
    }

    pub fn to_bytes(&self) -> [u8; LEVEL_HEADER_SIZE] {
        let mut out = [0u8; LEVEL_HEADER_SIZE];
        out[0..4].copy_from_slice(LEVEL_MAGIC);
        out[4..8].copy_from_slice(&LEVEL_VERSION.to_le_bytes());
        out[8..12].copy_from_slice(&self.tiles_x.to_le_bytes());
        out[12..16].copy_from_slice(&self.tiles_y.to_le_bytes());
        out[16..20].copy_from_slice(&self.band_count.to_le_bytes());
        out
    }

    /// Entry number of a tile in the index.
    fn entry_index(&self, band: usize, column: u32, row: u32) -> u64 {
        (band as u64 * self.tiles_y as u64 + row as u64) * self.tiles_x as u64 + column as u64
    }

    /// Only valid for tiles inside a header whose `index_end` fits the file.
    fn entry_offset(&self, band: usize, column: u32, row: u32) -> u64 {
        LEVEL_HEADER_SIZE as u64 + self.entry_index(band, column, row) * INDEX_ENTRY_SIZE as u64
    }

    /// Index size in bytes, `None` if it does not fit in a u64.
    fn index_len(&self) -> Option<u64> {
        (self.band_count as u64)
            .checked_mul(self.tiles_y as u64)?
            .checked_mul(self.tiles_x as u64)?
            .checked_mul(INDEX_ENTRY_SIZE as u64)
    }

    /// Byte offset where the tile blobs start.
    fn index_end(&self) -> Option<u64> {
        self.index_len()?.checked_add(LEVEL_HEADER_SIZE as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexEntry {
    offset: u64,
    data_len: u32,
    mask_len: u32,
}

impl IndexEntry {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            offset: read_u64_le(&bytes[0..8]),
            data_len: read_u32_le(&bytes[8..12]),
            mask_len: read_u32_le(&bytes[12..16]),
        }
    }
}

// =============================================================================
// TileStore
// =============================================================================

/// Raster source backed by an object store.
pub struct TileStore<O: ObjectSource> {
    objects: O,
}

impl<O: ObjectSource> TileStore<O> {
    pub fn new(objects: O) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }
}

#[async_trait]
impl<O: ObjectSource> MetadataProvider for TileStore<O> {
    async fn load_metadata(&self, raster_id: &str) -> Result<RasterMetadata, IoError> {
        let reader = self.objects.create_reader(&metadata_key(raster_id)).await?;
        let bytes = reader.read_exact_at(0, reader.size() as usize).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            IoError::Malformed(format!("{}: {}", reader.identifier(), e))
        })
    }
}

#[async_trait]
impl<O: ObjectSource> TileSource for TileStore<O> {
    type Session = StoreSession<O::Reader>;

    async fn open_session(&self, fetch: &TileFetch) -> Result<Self::Session, IoError> {
        let reader = self
            .objects
            .create_reader(&level_key(&fetch.raster_id, fetch.level))
            .await?;
        let header = LevelHeader::parse(&reader.read_exact_at(0, LEVEL_HEADER_SIZE).await?)?;

        if header.index_end().map_or(true, |end| end > reader.size()) {
            return Err(IoError::Malformed(format!(
                "{}: index of {}x{}x{} tiles exceeds file size {}",
                reader.identifier(),
                header.band_count,
                header.tiles_x,
                header.tiles_y,
                reader.size()
            )));
        }
        if let Some(&band) = fetch.bands.iter().find(|&&b| b >= header.band_count as usize) {
            return Err(IoError::Malformed(format!(
                "{}: band {} not in file with {} bands",
                reader.identifier(),
                band,
                header.band_count
            )));
        }
        let tiles = fetch.tiles;
        if !tiles.is_empty()
            && (tiles.x < 0
                || tiles.y < 0
                || tiles.max_x() > header.tiles_x as i64
                || tiles.max_y() > header.tiles_y as i64)
        {
            return Err(IoError::Malformed(format!(
                "{}: tiles {} outside {}x{} grid",
                reader.identifier(),
                tiles,
                header.tiles_x,
                header.tiles_y
            )));
        }

        debug!(
            object = reader.identifier(),
            tiles = %tiles,
            bands = fetch.bands.len(),
            "Opened tile session"
        );

        Ok(StoreSession {
            reader: Some(reader),
            header,
            fetch: fetch.clone(),
            row: tiles.y,
            column: tiles.x,
            band_slot: 0,
            row_entries: Vec::new(),
        })
    }
}

// =============================================================================
// StoreSession
// =============================================================================

/// Streams tiles from one level file.
///
/// The index entries for a band-row are fetched with one range request when
/// the session reaches that row; each tile is one more request.
pub struct StoreSession<R: RangeReader> {
    reader: Option<R>,
    header: LevelHeader,
    fetch: TileFetch,
    row: i64,
    column: i64,
    band_slot: usize,
    /// Index entries of the current row, one vector per fetched band
    row_entries: Vec<Vec<IndexEntry>>,
}

impl<R: RangeReader> StoreSession<R> {
    async fn load_row(&mut self, reader: &R) -> Result<(), IoError> {
        let tiles = self.fetch.tiles;
        let count = tiles.width as usize;
        let mut entries = Vec::with_capacity(self.fetch.bands.len());

        for &band in &self.fetch.bands {
            let offset = self
                .header
                .entry_offset(band, tiles.x as u32, self.row as u32);
            let bytes = reader
                .read_exact_at(offset, count * INDEX_ENTRY_SIZE)
                .await?;
            entries.push(
                bytes
                    .chunks_exact(INDEX_ENTRY_SIZE)
                    .map(IndexEntry::parse)
                    .collect(),
            );
        }

        self.row_entries = entries;
        Ok(())
    }

    fn advance(&mut self) {
        self.band_slot += 1;
        if self.band_slot < self.fetch.bands.len() {
            return;
        }
        self.band_slot = 0;
        self.column += 1;
        if self.column < self.fetch.tiles.max_x() {
            return;
        }
        self.column = self.fetch.tiles.x;
        self.row += 1;
        self.row_entries.clear();
    }
}

#[async_trait]
impl<R: RangeReader> TileSession for StoreSession<R> {
    async fn next_tile(&mut self) -> Result<Option<RawTile>, IoError> {
        // Take the reader out so `load_row` can borrow `self` mutably.
        let Some(reader) = self.reader.take() else {
            return Ok(None);
        };
        let result = self.read_next(&reader).await;
        self.reader = Some(reader);
        result
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            debug!(object = reader.identifier(), "Closed tile session");
        }
    }
}

impl<R: RangeReader> StoreSession<R> {
    async fn read_next(&mut self, reader: &R) -> Result<Option<RawTile>, IoError> {
        let tiles = self.fetch.tiles;
        if tiles.is_empty() || self.fetch.bands.is_empty() || self.row >= tiles.max_y() {
            return Ok(None);
        }
        if self.row_entries.is_empty() {
            self.load_row(reader).await?;
        }

        let band = self.fetch.bands[self.band_slot];
        let column = self.column as u32;
        let row = self.row as u32;
        let entry = self.row_entries[self.band_slot][(self.column - tiles.x) as usize];

        let tile = if entry.data_len == 0 {
            RawTile::missing(band, column, row)
        } else {
            let len = entry.data_len as usize + entry.mask_len as usize;
            let bytes = reader.read_exact_at(entry.offset, len).await?;
            RawTile {
                band,
                column,
                row,
                bytes: Some(bytes),
                declared_len: Some(entry.data_len as usize),
            }
        };

        self.advance();
        Ok(Some(tile))
    }
}

// =============================================================================
// LevelFileBuilder
// =============================================================================

/// Writes level files.
#[derive(Debug, Clone)]
pub struct LevelFileBuilder {
    header: LevelHeader,
    tiles: HashMap<(usize, u32, u32), (Bytes, Option<Bytes>)>,
}

impl LevelFileBuilder {
    pub fn new(tiles_x: u32, tiles_y: u32, band_count: u32) -> Self {
        Self {
            header: LevelHeader {
                tiles_x,
                tiles_y,
                band_count,
            },
            tiles: HashMap::new(),
        }
    }

    /// Set the data (and optional validity mask) of one tile. Tiles never set
    /// are written as missing.
    pub fn set_tile(
        &mut self,
        band: usize,
        column: u32,
        row: u32,
        data: impl Into<Bytes>,
        mask: Option<Bytes>,
    ) -> &mut Self {
        self.tiles.insert((band, column, row), (data.into(), mask));
        self
    }

    pub fn build(&self) -> Bytes {
        let header = self.header;
        let index_len = header
            .index_len()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(usize::MAX);
        let mut index = vec![0u8; index_len];
        let mut blobs = Vec::new();
        let base = (LEVEL_HEADER_SIZE + index_len) as u64;

        for band in 0..header.band_count as usize {
            for row in 0..header.tiles_y {
                for column in 0..header.tiles_x {
                    let Some((data, mask)) = self.tiles.get(&(band, column, row)) else {
                        continue;
                    };
                    let at = header.entry_index(band, column, row) as usize * INDEX_ENTRY_SIZE;
                    let offset = base + blobs.len() as u64;
                    let mask_len = mask.as_ref().map_or(0, |m| m.len());

                    index[at..at + 8].copy_from_slice(&offset.to_le_bytes());
                    index[at + 8..at + 12].copy_from_slice(&(data.len() as u32).to_le_bytes());
                    index[at + 12..at + 16].copy_from_slice(&(mask_len as u32).to_le_bytes());

                    blobs.extend_from_slice(data);
                    if let Some(mask) = mask {
                        blobs.extend_from_slice(mask);
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(LEVEL_HEADER_SIZE + index.len() + blobs.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&index);
        out.extend_from_slice(&blobs);
        Bytes::from(out)
    }
}
