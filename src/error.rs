use thiserror::Error;

use crate::geo::{Crs, PixelRect};

/// I/O errors that can occur when reading from remote storage
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Stored object could not be interpreted (bad header, truncated index,
    /// unparseable metadata document)
    #[error("Malformed object: {0}")]
    Malformed(String),
}

/// Errors raised while planning, reading and compositing raster requests.
///
/// The first group are caller errors: they are raised before any I/O and map
/// to HTTP 4xx. The rest report problems with stored data or the transport.
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// Request envelope CRS does not match the raster
    #[error("CRS mismatch: raster is {expected}, request is {actual}")]
    CrsMismatch { expected: Crs, actual: Crs },

    /// Requested output size has a zero dimension
    #[error("Invalid request dimensions {width}x{height}: both must be positive")]
    InvalidRequestDimensions { width: u32, height: u32 },

    /// Request envelope is non-finite or inverted
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Pyramid level index does not exist
    #[error("Level {index} out of range: raster has {levels} levels")]
    LevelIndexOutOfRange { index: usize, levels: usize },

    /// Band index does not exist
    #[error("Band {band} out of range: raster has {bands} bands")]
    BandOutOfRange { band: usize, bands: usize },

    /// A band is selected more than once
    #[error("Band {band} selected more than once")]
    DuplicateBand { band: usize },

    /// Selected bands do not share one cell encoding
    #[error("Selected bands use different cell encodings")]
    MixedBandEncodings,

    /// Rasters cannot be mosaicked together
    #[error("Incompatible mosaic: {0}")]
    IncompatibleMosaic(String),

    /// Tile payload is shorter than its encoding requires, or disagrees
    /// with the length declared by the transport
    #[error(
        "Corrupt tile data at level {level}, band {band}, tile ({column}, {row}): \
         expected {expected} bytes, got {actual}"
    )]
    CorruptTileData {
        level: usize,
        band: usize,
        column: u32,
        row: u32,
        expected: usize,
        actual: usize,
    },

    /// Transport returned a tile that was not requested
    #[error("Unexpected tile at level {level}, band {band}, tile ({column}, {row})")]
    UnexpectedTile {
        level: usize,
        band: usize,
        column: u32,
        row: u32,
    },

    /// Raster does not exist in the backing store
    #[error("Raster not found: {raster_id}")]
    RasterNotFound { raster_id: String },

    /// Raster metadata could not be loaded
    #[error("Metadata unavailable for {raster_id}: {reason}")]
    MetadataUnavailable { raster_id: String, reason: String },

    /// Raster metadata violates a structural invariant
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Tile transport failed
    #[error("Tile fetch failed for {raster_id} level {level} tiles {tiles}: {source}")]
    TileFetch {
        raster_id: String,
        level: usize,
        tiles: PixelRect,
        #[source]
        source: IoError,
    },
}

impl RasterError {
    /// True for errors caused by the request rather than the stored data.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RasterError::CrsMismatch { .. }
                | RasterError::InvalidRequestDimensions { .. }
                | RasterError::InvalidEnvelope(_)
                | RasterError::LevelIndexOutOfRange { .. }
                | RasterError::BandOutOfRange { .. }
                | RasterError::DuplicateBand { .. }
                | RasterError::MixedBandEncodings
                | RasterError::IncompatibleMosaic(_)
        )
    }
}
