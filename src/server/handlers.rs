//! HTTP request handlers for the raster API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check endpoint
//! - `GET /rasters/{raster_id}/pyramid` - Raster and pyramid description
//! - `GET /rasters/{raster_id}/read` - Read pixels from one raster
//! - `GET /mosaic` - Read pixels from several rasters, composited

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{IoError, RasterError};
use crate::geo::{Crs, Envelope};
use crate::mosaic::PixelBuffer;
use crate::raster::CellEncoding;
use crate::service::{MosaicRequest, PyramidDescription, RasterService, ReadRequest, ReadResult};
use crate::source::RasterSource;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the raster service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: RasterSource> {
    pub raster_service: Arc<RasterService<S>>,

    /// Cache-Control max-age in seconds for pixel responses
    pub cache_max_age: u32,
}

impl<S: RasterSource> AppState<S> {
    pub fn new(raster_service: RasterService<S>) -> Self {
        Self::with_cache_max_age(raster_service, 3600)
    }

    pub fn with_cache_max_age(raster_service: RasterService<S>, cache_max_age: u32) -> Self {
        Self {
            raster_service: Arc::new(raster_service),
            cache_max_age,
        }
    }
}

impl<S: RasterSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            raster_service: Arc::clone(&self.raster_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for single-raster reads.
///
/// `bbox` is `minx,miny,maxx,maxy` in `crs`; `bands` is a comma-separated
/// list of band indices (all bands when absent).
#[derive(Debug, Deserialize)]
pub struct ReadQueryParams {
    pub bbox: String,
    pub crs: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub bands: Option<String>,
    #[serde(default)]
    pub fill: u64,
    /// Expand a single colormapped band to RGBA
    #[serde(default)]
    pub colormap: bool,
}

/// Query parameters for mosaic reads. `rasters` is a comma-separated list in
/// paint order.
#[derive(Debug, Deserialize)]
pub struct MosaicQueryParams {
    pub rasters: String,
    pub bbox: String,
    pub crs: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub bands: Option<String>,
    #[serde(default)]
    pub fill: u64,
}

/// Parse `minx,miny,maxx,maxy`.
pub fn parse_bbox(bbox: &str, crs: &str) -> Result<Envelope, HandlerError> {
    let values = bbox
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| HandlerError::BadRequest(format!("bbox is not numeric: {}", bbox)))?;

    match values.as_slice() {
        &[min_x, min_y, max_x, max_y] => Ok(Envelope::new(min_x, min_y, max_x, max_y, Crs::new(crs))),
        _ => Err(HandlerError::BadRequest(format!(
            "bbox needs 4 values, got {}",
            values.len()
        ))),
    }
}

/// Parse a comma-separated band list. An absent or blank list means all bands.
pub fn parse_bands(bands: Option<&str>) -> Result<Option<Vec<usize>>, HandlerError> {
    let Some(bands) = bands.map(str::trim).filter(|b| !b.is_empty()) else {
        return Ok(None);
    };
    bands
        .split(',')
        .map(|b| b.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|_| HandlerError::BadRequest(format!("invalid band list: {}", bands)))
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "crs_mismatch")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Status code and error type for a raster error.
fn classify(err: &RasterError) -> (StatusCode, &'static str) {
    match err {
        RasterError::RasterNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),

        RasterError::CrsMismatch { .. } => (StatusCode::BAD_REQUEST, "crs_mismatch"),
        RasterError::InvalidRequestDimensions { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_dimensions")
        }
        RasterError::InvalidEnvelope(_) => (StatusCode::BAD_REQUEST, "invalid_envelope"),
        RasterError::LevelIndexOutOfRange { .. } => (StatusCode::BAD_REQUEST, "invalid_level"),
        RasterError::BandOutOfRange { .. } | RasterError::DuplicateBand { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_band")
        }
        RasterError::MixedBandEncodings => (StatusCode::BAD_REQUEST, "mixed_encodings"),
        RasterError::IncompatibleMosaic(_) => (StatusCode::BAD_REQUEST, "incompatible_mosaic"),

        RasterError::MetadataUnavailable { .. } => {
            (StatusCode::BAD_GATEWAY, "metadata_unavailable")
        }
        RasterError::InvalidMetadata(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_metadata"),
        RasterError::CorruptTileData { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_tile"),
        RasterError::UnexpectedTile { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_tile")
        }
        RasterError::TileFetch { source, .. } => match source {
            IoError::Connection(_) => (StatusCode::BAD_GATEWAY, "connection_error"),
            IoError::S3(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "tile_fetch_error"),
        },
    }
}

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    // Log errors based on severity
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

/// Convert RasterError to HTTP response.
///
/// 5xx errors are logged at ERROR, 404 at DEBUG, other 4xx at WARN.
impl IntoResponse for RasterError {
    fn into_response(self) -> Response {
        let (status, error_type) = classify(&self);
        error_response(status, error_type, self.to_string())
    }
}

/// Handler failure: a malformed request or a failed read.
#[derive(Debug)]
pub enum HandlerError {
    BadRequest(String),
    Raster(RasterError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::BadRequest(message) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_request", message)
            }
            HandlerError::Raster(err) => err.into_response(),
        }
    }
}

impl From<RasterError> for HandlerError {
    fn from(err: RasterError) -> Self {
        HandlerError::Raster(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle pyramid description requests.
///
/// `GET /rasters/{raster_id}/pyramid`
///
/// # Response
///
/// - `200 OK`: JSON [`PyramidDescription`]
/// - `404 Not Found`: Raster not found
/// - `502 Bad Gateway`: Metadata could not be loaded
pub async fn pyramid_handler<S: RasterSource>(
    State(state): State<AppState<S>>,
    Path(raster_id): Path<String>,
) -> Result<Json<PyramidDescription>, HandlerError> {
    let description = state.raster_service.describe_pyramid(&raster_id).await?;
    Ok(Json(description))
}

/// Handle single-raster reads.
///
/// `GET /rasters/{raster_id}/read?bbox=..&crs=..&width=..&height=..`
///
/// # Response
///
/// `200 OK` with the band-sequential pixel buffer as
/// `application/octet-stream`. A request outside the raster returns a
/// fill-valued buffer of the requested size with `X-Raster-No-Data: true`.
///
/// # Headers
///
/// - `X-Raster-Envelope`: `minx,miny,maxx,maxy` of the returned pixels
/// - `X-Raster-Crs`, `X-Raster-Width`, `X-Raster-Height`, `X-Raster-Bands`
/// - `X-Raster-Bits-Per-Sample`
/// - `X-Raster-Level`: pyramid level read (absent for no-data responses)
/// - `X-Raster-No-Data`: `true|false`
pub async fn read_handler<S: RasterSource>(
    State(state): State<AppState<S>>,
    Path(raster_id): Path<String>,
    Query(query): Query<ReadQueryParams>,
) -> Result<Response, HandlerError> {
    let envelope = parse_bbox(&query.bbox, &query.crs)?;
    let bands = parse_bands(query.bands.as_deref())?;

    let mut request = ReadRequest::new(&raster_id, envelope, query.width, query.height)
        .with_fill(query.fill)
        .with_colormap(query.colormap);
    request.bands = bands;

    let service = &state.raster_service;
    let result = service.read(&request).await?;
    let (encoding, band_count) = service
        .output_format(&raster_id, request.bands.as_deref(), request.apply_colormap)
        .await?;

    Ok(pixel_response(result, encoding, band_count, query.fill, state.cache_max_age))
}

/// Handle mosaic reads.
///
/// `GET /mosaic?rasters=a,b&bbox=..&crs=..&width=..&height=..`
///
/// Same response shape as [`read_handler`].
pub async fn mosaic_handler<S: RasterSource>(
    State(state): State<AppState<S>>,
    Query(query): Query<MosaicQueryParams>,
) -> Result<Response, HandlerError> {
    let raster_ids: Vec<String> = query
        .rasters
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    let Some(first) = raster_ids.first().cloned() else {
        return Err(HandlerError::BadRequest("rasters must not be empty".to_string()));
    };

    let request = MosaicRequest {
        raster_ids,
        envelope: parse_bbox(&query.bbox, &query.crs)?,
        width: query.width,
        height: query.height,
        bands: parse_bands(query.bands.as_deref())?,
        fill: query.fill,
    };

    let service = &state.raster_service;
    let result = service.read_mosaic(&request).await?;
    let (encoding, band_count) = service
        .output_format(&first, request.bands.as_deref(), false)
        .await?;

    Ok(pixel_response(result, encoding, band_count, query.fill, state.cache_max_age))
}

fn pixel_response(
    result: ReadResult,
    encoding: CellEncoding,
    band_count: usize,
    fill: u64,
    cache_max_age: u32,
) -> Response {
    let envelope = result.envelope().clone();
    let level = match &result {
        ReadResult::Image(image) => Some(image.level),
        ReadResult::NoData { .. } => None,
    };
    let no_data = result.is_no_data();
    let buffer: PixelBuffer = result.into_buffer(encoding, band_count, fill);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    insert_header(
        &mut headers,
        header::CACHE_CONTROL,
        format!("public, max-age={}", cache_max_age),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-raster-envelope"),
        format!(
            "{},{},{},{}",
            envelope.min_x, envelope.min_y, envelope.max_x, envelope.max_y
        ),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-raster-crs"),
        envelope.crs.to_string(),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-raster-width"),
        buffer.width().to_string(),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-raster-height"),
        buffer.height().to_string(),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-raster-bands"),
        buffer.bands().to_string(),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-raster-bits-per-sample"),
        buffer.encoding().bits_per_sample().to_string(),
    );
    if let Some(level) = level {
        insert_header(
            &mut headers,
            HeaderName::from_static("x-raster-level"),
            level.to_string(),
        );
    }
    insert_header(
        &mut headers,
        HeaderName::from_static("x-raster-no-data"),
        no_data.to_string(),
    );

    (StatusCode::OK, headers, buffer.into_bytes()).into_response()
}

/// Insert a header, skipping values that are not valid header text.
fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: String) {
    match HeaderValue::from_str(&value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => debug!(header = %name, "Skipping invalid header value"),
    }
}
