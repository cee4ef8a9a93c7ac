//! HTTP server layer for the raster service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   GET /rasters/{raster_id}/read   GET /mosaic   GET .../pyramid │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (params, error mapping)  │  │ (router, CORS, tracing)     │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, mosaic_handler, parse_bands, parse_bbox, pyramid_handler, read_handler,
    AppState, ErrorResponse, HandlerError, HealthResponse, MosaicQueryParams, ReadQueryParams,
};
pub use routes::{create_router, RouterConfig};
