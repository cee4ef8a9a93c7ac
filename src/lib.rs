//! # Raster Streamer
//!
//! Multi-resolution raster access over object storage.
//!
//! Given a tiled raster pyramid and a request of the form "this geographic
//! box at this output size", the library picks the pyramid level that best
//! matches the requested resolution, maps the box to pixels and tiles at
//! that level, streams only those tiles, and stitches them into a buffer
//! whose envelope is exactly the geographic extent of its pixels. Several
//! rasters can be mosaicked into one output.
//!
//! ## Features
//!
//! - **Level selection**: coarsest level still at least as fine as the request
//! - **Exact envelopes**: output extent is the pixel-to-geo mapping of its pixels
//! - **Cell encodings**: 1, 2 and 4-bit packed through 64-bit samples, masks
//! - **Mosaics**: shared basis grid, later rasters paint over earlier ones
//! - **Cached metadata**: LRU raster cache with singleflight loading
//!
//! ## Architecture
//!
//! - [`geo`] - envelopes, pixel rectangles and the pixel/geo transform
//! - [`raster`] - pyramid levels, bands and raster metadata
//! - [`query`] - request planning
//! - [`tile`] - tile sessions and tile decoding
//! - [`mosaic`] - output buffers, tile assembly and mosaicking
//! - [`source`] - metadata/tile sources, the tile store and the registry
//! - [`io`] - range readers over S3
//! - [`service`] - the read pipeline
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use raster_streamer::{
//!     Crs, Envelope, MemoryObjectSource, RasterRegistry, RasterService, ReadRequest, TileStore,
//! };
//!
//! # async fn run() -> Result<(), raster_streamer::RasterError> {
//! let store = TileStore::new(MemoryObjectSource::new());
//! let service = RasterService::new(RasterRegistry::new(store));
//!
//! let envelope = Envelope::new(0.0, 0.0, 1000.0, 1000.0, Crs::new("EPSG:3857"));
//! let result = service.read(&ReadRequest::new("dem", envelope, 256, 256)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod io;
pub mod mosaic;
pub mod query;
pub mod raster;
pub mod server;
pub mod service;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{IoError, RasterError};
pub use geo::{Crs, Envelope, GridRange, PixelBounds, PixelRect, RasterToModelTransform};
pub use io::{create_s3_client, RangeReader, S3RangeReader};
pub use mosaic::{MosaicCompositor, MosaicLayout, PixelBuffer, TileAssembler};
pub use query::{QueryPlan, QueryPlanner};
pub use raster::{
    BandMetadata, BandStatistics, CellEncoding, ColorMap, Compression, LevelDescription,
    LevelMetadata, Pyramid, PyramidLevel, RasterBandInfo, RasterInfo, RasterMetadata,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use service::{
    MosaicRequest, PyramidDescription, RasterImage, RasterService, ReadRequest, ReadResult,
};
pub use source::{
    LevelFileBuilder, MemoryObjectSource, MetadataProvider, ObjectSource, RasterRegistry,
    RasterSource, S3ObjectSource, TileSource, TileStore,
};
pub use tile::{
    DecodedTile, PackedSamples, RawTile, TileData, TileFetch, TileReader, TileSession,
};
