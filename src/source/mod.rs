//! Raster sources: where metadata and tiles come from.
//!
//! The core only needs two small interfaces:
//!
//! - [`MetadataProvider`] loads the raw description of a raster
//! - [`TileSource`] opens a [`TileSession`] for one [`TileFetch`]
//!
//! Anything implementing both is a [`RasterSource`]. [`TileStore`] is the
//! bundled implementation, laid out over any [`ObjectSource`] (S3 via
//! [`S3ObjectSource`], or memory via [`MemoryObjectSource`]).
//! [`RasterRegistry`] caches the validated [`RasterInfo`](crate::raster::RasterInfo)
//! built from a provider's metadata.

mod memory;
mod registry;
mod s3_source;
mod store;

use async_trait::async_trait;

use crate::error::IoError;
use crate::io::RangeReader;
use crate::raster::RasterMetadata;
use crate::tile::{TileFetch, TileSession};

pub use memory::{MemoryObjectSource, MemoryReader};
pub use registry::{RasterRegistry, DEFAULT_RASTER_CACHE_CAPACITY};
pub use s3_source::S3ObjectSource;
pub use store::{
    level_key, metadata_key, LevelFileBuilder, LevelHeader, StoreSession, TileStore,
    INDEX_ENTRY_SIZE, LEVEL_HEADER_SIZE, LEVEL_MAGIC, LEVEL_VERSION,
};

// =============================================================================
// Raster-level traits
// =============================================================================

/// Loads raw raster metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Load the metadata of `raster_id`. A missing raster is reported as
    /// [`IoError::NotFound`].
    async fn load_metadata(&self, raster_id: &str) -> Result<RasterMetadata, IoError>;
}

/// Opens tile-fetch sessions.
#[async_trait]
pub trait TileSource: Send + Sync {
    type Session: TileSession + 'static;

    async fn open_session(&self, fetch: &TileFetch) -> Result<Self::Session, IoError>;
}

/// A complete backing store for rasters.
pub trait RasterSource: MetadataProvider + TileSource {}

impl<T: MetadataProvider + TileSource> RasterSource for T {}

// =============================================================================
// Object storage
// =============================================================================

/// Trait for creating range readers from object keys.
///
/// This abstraction allows the tile store to work with different storage
/// backends (S3, memory, etc.) without being tied to a specific implementation.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// The type of range reader this source creates.
    type Reader: RangeReader + 'static;

    /// Create a range reader for the object at `key`.
    async fn create_reader(&self, key: &str) -> Result<Self::Reader, IoError>;
}
