//! Raster service: the read pipeline end to end.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          RasterService                           │
//! │  read()                                                          │
//! │   1. RasterInfo from registry      4. Open tile session          │
//! │   2. Resolve bands + encoding      5. Stream tiles into buffer   │
//! │   3. Plan (level, pixels, tiles)   6. Optional colormap          │
//! │                                                                  │
//! │  read_mosaic(): steps 1-5 per raster, then MosaicCompositor      │
//! │           │                 │                     │              │
//! │           ▼                 ▼                     ▼              │
//! │  ┌────────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │ RasterRegistry │  │ QueryPlanner │  │ TileReader + Assembler│ │
//! │  └────────────────┘  └──────────────┘  └───────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A read that misses the raster entirely is not an error: it yields
//! [`ReadResult::NoData`], which callers may turn into a blank buffer.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::RasterError;
use crate::geo::{Crs, Envelope};
use crate::mosaic::{MosaicCompositor, PixelBuffer, TileAssembler};
use crate::query::{QueryPlan, QueryPlanner};
use crate::raster::{CellEncoding, ColorMap, LevelDescription, RasterBandInfo, RasterInfo};
use crate::source::{RasterRegistry, RasterSource};
use crate::tile::{TileFetch, TileReader};

// =============================================================================
// Requests
// =============================================================================

/// A read of one raster.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub raster_id: String,
    pub envelope: Envelope,
    /// Requested output size; drives level selection
    pub width: u32,
    pub height: u32,
    /// Bands to read, in output order. `None` reads every band.
    pub bands: Option<Vec<usize>>,
    /// Value for pixels no tile covers
    pub fill: u64,
    /// Expand a single colormapped band to RGBA
    pub apply_colormap: bool,
}

impl ReadRequest {
    pub fn new(raster_id: impl Into<String>, envelope: Envelope, width: u32, height: u32) -> Self {
        Self {
            raster_id: raster_id.into(),
            envelope,
            width,
            height,
            bands: None,
            fill: 0,
            apply_colormap: false,
        }
    }

    pub fn with_bands(mut self, bands: Vec<usize>) -> Self {
        self.bands = Some(bands);
        self
    }

    pub fn with_fill(mut self, fill: u64) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_colormap(mut self, apply: bool) -> Self {
        self.apply_colormap = apply;
        self
    }
}

/// A read of several rasters into one image.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicRequest {
    /// Rasters in paint order; later rasters cover earlier ones
    pub raster_ids: Vec<String>,
    pub envelope: Envelope,
    pub width: u32,
    pub height: u32,
    pub bands: Option<Vec<usize>>,
    pub fill: u64,
}

// =============================================================================
// Results
// =============================================================================

/// Pixels read from one raster (or mosaicked from several).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub buffer: PixelBuffer,
    /// Geographic extent of exactly the pixels in `buffer`
    pub envelope: Envelope,
    pub level: usize,
    /// For mosaics, the plan whose resolution set the shared grid
    pub plan: QueryPlan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    Image(RasterImage),
    /// The request does not overlap the raster
    NoData {
        envelope: Envelope,
        width: u32,
        height: u32,
    },
}

impl ReadResult {
    pub fn is_no_data(&self) -> bool {
        matches!(self, ReadResult::NoData { .. })
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            ReadResult::Image(image) => &image.envelope,
            ReadResult::NoData { envelope, .. } => envelope,
        }
    }

    /// The pixels, or a fill-valued buffer of the requested size.
    pub fn into_buffer(self, encoding: CellEncoding, bands: usize, fill: u64) -> PixelBuffer {
        match self {
            ReadResult::Image(image) => image.buffer,
            ReadResult::NoData { width, height, .. } => {
                PixelBuffer::new(width, height, bands, encoding, fill)
            }
        }
    }
}

/// Serializable description of a raster and its pyramid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PyramidDescription {
    pub raster_id: String,
    pub crs: Crs,
    pub envelope: Envelope,
    pub bands: Vec<RasterBandInfo>,
    pub levels: Vec<LevelDescription>,
}

// =============================================================================
// RasterService
// =============================================================================

/// Entry point for reads.
///
/// # Example
///
/// ```ignore
/// use raster_streamer::{Crs, Envelope, RasterRegistry, RasterService, ReadRequest};
///
/// let service = RasterService::new(RasterRegistry::new(store));
/// let envelope = Envelope::new(0.0, 0.0, 1000.0, 1000.0, Crs::new("EPSG:3857"));
/// let result = service.read(&ReadRequest::new("dem", envelope, 256, 256)).await?;
/// ```
pub struct RasterService<S: RasterSource> {
    registry: Arc<RasterRegistry<S>>,
    planner: QueryPlanner,
    compositor: MosaicCompositor,
}

impl<S: RasterSource> RasterService<S> {
    pub fn new(registry: RasterRegistry<S>) -> Self {
        Self::with_shared_registry(Arc::new(registry))
    }

    /// Create a service over a registry shared with other components.
    pub fn with_shared_registry(registry: Arc<RasterRegistry<S>>) -> Self {
        Self {
            registry,
            planner: QueryPlanner::new(),
            compositor: MosaicCompositor::new(),
        }
    }

    pub fn registry(&self) -> &Arc<RasterRegistry<S>> {
        &self.registry
    }

    /// Plan a read without fetching anything.
    pub async fn plan(
        &self,
        raster_id: &str,
        envelope: &Envelope,
        width: u32,
        height: u32,
    ) -> Result<QueryPlan, RasterError> {
        let info = self.registry.get_raster(raster_id).await?;
        self.planner.plan(envelope, width, height, &info.pyramid)
    }

    pub async fn describe_pyramid(&self, raster_id: &str) -> Result<PyramidDescription, RasterError> {
        let info = self.registry.get_raster(raster_id).await?;
        Ok(PyramidDescription {
            raster_id: info.raster_id.clone(),
            crs: info.crs.clone(),
            envelope: info.envelope.clone(),
            bands: info.bands.clone(),
            levels: info.pyramid.describe(),
        })
    }

    /// Encoding and band count a read of `bands` produces, for callers that
    /// need to shape a blank buffer for [`ReadResult::NoData`].
    pub async fn output_format(
        &self,
        raster_id: &str,
        bands: Option<&[usize]>,
        apply_colormap: bool,
    ) -> Result<(CellEncoding, usize), RasterError> {
        let info = self.registry.get_raster(raster_id).await?;
        let bands = resolve_bands(&info, bands);
        let encoding = info.encoding_for(&bands)?;
        if apply_colormap && colormap_for(&info, &bands).is_some() {
            return Ok((CellEncoding::UInt8, 4));
        }
        Ok((encoding, bands.len()))
    }

    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResult, RasterError> {
        let info = self.registry.get_raster(&request.raster_id).await?;
        let bands = resolve_bands(&info, request.bands.as_deref());
        let encoding = info.encoding_for(&bands)?;

        let plan = self.planner.plan(
            &request.envelope,
            request.width,
            request.height,
            &info.pyramid,
        )?;
        if plan.is_empty() {
            debug!(raster_id = %request.raster_id, "Read outside raster");
            return Ok(ReadResult::NoData {
                envelope: request.envelope.clone(),
                width: request.width,
                height: request.height,
            });
        }

        let mut buffer = self
            .read_plan(&request.raster_id, &info, &plan, bands.clone(), encoding, request.fill)
            .await?;

        if request.apply_colormap {
            match colormap_for(&info, &bands) {
                Some(colormap) => buffer = buffer.apply_colormap(0, colormap),
                None => debug!(
                    raster_id = %request.raster_id,
                    "No colormap for requested bands, returning raw samples"
                ),
            }
        }

        Ok(ReadResult::Image(RasterImage {
            buffer,
            envelope: plan.result_envelope.clone(),
            level: plan.level,
            plan,
        }))
    }

    /// Read several rasters and composite them in request order.
    pub async fn read_mosaic(&self, request: &MosaicRequest) -> Result<ReadResult, RasterError> {
        if request.raster_ids.is_empty() {
            return Err(RasterError::IncompatibleMosaic(
                "mosaic needs at least one raster".to_string(),
            ));
        }

        let mut sources = Vec::with_capacity(request.raster_ids.len());
        for raster_id in &request.raster_ids {
            let info = self.registry.get_raster(raster_id).await?;
            let bands = resolve_bands(&info, request.bands.as_deref());
            let encoding = info.encoding_for(&bands)?;
            let plan =
                self.planner
                    .plan(&request.envelope, request.width, request.height, &info.pyramid)?;
            sources.push((raster_id, info, bands, encoding, plan));
        }

        // Check compatibility before any tile is fetched.
        let mut shape = None;
        for (raster_id, _, bands, encoding, plan) in &sources {
            if plan.is_empty() {
                continue;
            }
            match shape {
                None => shape = Some((*encoding, bands.len())),
                Some(s) if s != (*encoding, bands.len()) => {
                    return Err(RasterError::IncompatibleMosaic(format!(
                        "{} has {} bands of {:?}, expected {} bands of {:?}",
                        raster_id,
                        bands.len(),
                        encoding,
                        s.1,
                        s.0
                    )));
                }
                Some(_) => {}
            }
        }

        let plans: Vec<QueryPlan> = sources.iter().map(|s| s.4.clone()).collect();
        let Some(layout) = self.compositor.layout(&plans)? else {
            debug!(rasters = request.raster_ids.len(), "Mosaic outside every raster");
            return Ok(ReadResult::NoData {
                envelope: request.envelope.clone(),
                width: request.width,
                height: request.height,
            });
        };

        let mut images = Vec::with_capacity(sources.len());
        for (raster_id, info, bands, encoding, plan) in sources {
            if plan.is_empty() {
                images.push(None);
                continue;
            }
            let image = self
                .read_plan(raster_id, &info, &plan, bands, encoding, request.fill)
                .await?;
            images.push(Some(image));
        }

        let buffer = self.compositor.compose(&layout, &images, request.fill)?;
        let basis = plans
            .into_iter()
            .find(|p| !p.is_empty())
            .ok_or_else(|| RasterError::IncompatibleMosaic("no plan to compose".to_string()))?;

        Ok(ReadResult::Image(RasterImage {
            buffer,
            envelope: layout.envelope,
            level: basis.level,
            plan: basis,
        }))
    }

    /// Fetch and assemble the tiles of a non-empty plan.
    async fn read_plan(
        &self,
        raster_id: &str,
        info: &RasterInfo,
        plan: &QueryPlan,
        bands: Vec<usize>,
        encoding: CellEncoding,
        fill: u64,
    ) -> Result<PixelBuffer, RasterError> {
        let level = info.pyramid.get_level(plan.level)?;
        let fetch = TileFetch {
            raster_id: raster_id.to_string(),
            level: plan.level,
            bands,
            tiles: plan.tile_range,
        };

        debug!(
            raster_id,
            level = plan.level,
            tiles = %plan.tile_range,
            bands = fetch.bands.len(),
            "Opening tile session"
        );

        let session = self
            .registry
            .source()
            .open_session(&fetch)
            .await
            .map_err(|source| RasterError::TileFetch {
                raster_id: raster_id.to_string(),
                level: plan.level,
                tiles: plan.tile_range,
                source,
            })?;

        let reader = TileReader::new(session, fetch, encoding, level.tile_width, level.tile_height);
        TileAssembler::new(fill).assemble(plan, level, reader).await
    }
}

fn resolve_bands(info: &RasterInfo, bands: Option<&[usize]>) -> Vec<usize> {
    match bands {
        Some(bands) => bands.to_vec(),
        None => info.all_bands(),
    }
}

/// Colormap to expand, if the read is of a single colormapped band.
fn colormap_for<'a>(info: &'a RasterInfo, bands: &[usize]) -> Option<&'a ColorMap> {
    match bands {
        [band] => info.bands.get(*band).and_then(|b| b.colormap.as_ref()),
        _ => None,
    }
}
