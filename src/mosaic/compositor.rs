//! Stitching decoded tiles into one image, and mosaicking several images.
//!
//! # Mosaic Layout
//!
//! All images are placed on one basis grid: the resolution of the first
//! non-empty plan, anchored at the upper-left corner of the union of the
//! plans' result envelopes. Each image is then written into its placement
//! in plan order, so later rasters cover earlier ones wherever they hold
//! non-fill samples.

use tracing::debug;

use crate::error::RasterError;
use crate::geo::{Envelope, PixelRect, RasterToModelTransform};
use crate::query::QueryPlan;
use crate::raster::PyramidLevel;
use crate::tile::{TileData, TileReader, TileSession};

use super::buffer::PixelBuffer;

// =============================================================================
// TileAssembler
// =============================================================================

/// Writes the tiles of one plan into an overlap-sized buffer.
#[derive(Debug, Clone, Copy)]
pub struct TileAssembler {
    fill: u64,
}

impl TileAssembler {
    pub fn new(fill: u64) -> Self {
        Self { fill }
    }

    /// Drain `reader` into a `pixel_overlap`-sized buffer with one band per
    /// fetched band, in fetch order. Missing tiles and masked pixels keep the
    /// fill value. The session is closed before returning.
    pub async fn assemble<S: TileSession>(
        &self,
        plan: &QueryPlan,
        level: &PyramidLevel,
        mut reader: TileReader<S>,
    ) -> Result<PixelBuffer, RasterError> {
        let overlap = plan.pixel_overlap;
        let encoding = reader.encoding();
        let (tile_width, _) = reader.tile_size();
        let bands = reader.fetch().bands.clone();

        let mut buffer = PixelBuffer::new(
            overlap.width as u32,
            overlap.height as u32,
            bands.len(),
            encoding,
            self.fill,
        );

        let mut written = 0usize;
        let mut missing = 0usize;

        while let Some(tile) = reader.next_tile().await? {
            let unexpected = || RasterError::UnexpectedTile {
                level: level.index,
                band: tile.band,
                column: tile.column,
                row: tile.row,
            };
            let slot = bands
                .iter()
                .position(|&b| b == tile.band)
                .ok_or_else(unexpected)?;
            let tile_rect = level
                .tile_rect(tile.column, tile.row)
                .ok_or_else(unexpected)?;

            if tile.is_missing() {
                missing += 1;
                continue;
            }

            let area = tile_rect.intersection(&overlap);
            if area.is_empty() {
                continue;
            }

            for y in area.y..area.max_y() {
                let ty = (y - tile_rect.y) as u32;
                let oy = (y - overlap.y) as u32;
                let tx0 = (area.x - tile_rect.x) as u32;
                let ox0 = (area.x - overlap.x) as u32;

                match (&tile.data, &tile.mask) {
                    (TileData::Bytes(data), None) => {
                        let size = encoding.bytes_per_sample();
                        let start = (ty as usize * tile_width as usize + tx0 as usize) * size;
                        buffer.copy_row(slot, ox0, oy, &data[start..], area.width as usize);
                    }
                    _ => {
                        for dx in 0..area.width as u32 {
                            let tx = tx0 + dx;
                            if !tile.is_valid(tx, ty) {
                                continue;
                            }
                            if let Some(value) = tile.sample(encoding, tile_width, tx, ty) {
                                buffer.set_sample(slot, ox0 + dx, oy, value);
                            }
                        }
                    }
                }
            }
            written += 1;
        }

        reader.finish();

        debug!(
            level = level.index,
            overlap = %overlap,
            written,
            missing,
            "Assembled tiles"
        );

        Ok(buffer)
    }
}

// =============================================================================
// MosaicCompositor
// =============================================================================

/// Where each plan's image lands in the mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicLayout {
    /// Geographic extent of the mosaic pixels
    pub envelope: Envelope,
    pub width: u32,
    pub height: u32,
    pub transform: RasterToModelTransform,
    /// One entry per plan; `None` for empty plans
    pub placements: Vec<Option<PixelRect>>,
}

/// Combines per-raster images into one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MosaicCompositor;

impl MosaicCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Lay out `plans` on a shared grid. Returns `None` when every plan is
    /// empty.
    pub fn layout(&self, plans: &[QueryPlan]) -> Result<Option<MosaicLayout>, RasterError> {
        let mut non_empty = plans.iter().filter(|p| !p.is_empty());
        let Some(first) = non_empty.next() else {
            return Ok(None);
        };

        let crs = &first.result_envelope.crs;
        let mut union = first.result_envelope.clone();
        for plan in non_empty {
            if &plan.result_envelope.crs != crs {
                return Err(RasterError::IncompatibleMosaic(format!(
                    "CRS {} differs from {}",
                    plan.result_envelope.crs, crs
                )));
            }
            union = union.union(&plan.result_envelope);
        }

        let x_res = first.result_envelope.width() / first.pixel_overlap.width as f64;
        let y_res = first.result_envelope.height() / first.pixel_overlap.height as f64;
        let transform =
            RasterToModelTransform::from_origin(union.min_x, union.max_y, x_res, y_res, crs.clone())?;

        let width = ((union.width() / x_res).round() as u32).max(1);
        let height = ((union.height() / y_res).round() as u32).max(1);
        let envelope = transform.pixel_to_geo(&PixelRect::new(0, 0, width as i64, height as i64));

        let placements = plans
            .iter()
            .map(|plan| {
                (!plan.is_empty()).then(|| {
                    transform
                        .geo_to_pixel(&plan.result_envelope)
                        .to_nearest_rect()
                })
            })
            .collect();

        debug!(
            envelope = %envelope,
            width,
            height,
            plans = plans.len(),
            "Mosaic layout"
        );

        Ok(Some(MosaicLayout {
            envelope,
            width,
            height,
            transform,
            placements,
        }))
    }

    /// Write `images` (one per plan, `None` for empty plans) into a
    /// layout-sized buffer. Samples equal to `fill` are transparent.
    pub fn compose(
        &self,
        layout: &MosaicLayout,
        images: &[Option<PixelBuffer>],
        fill: u64,
    ) -> Result<PixelBuffer, RasterError> {
        if images.len() != layout.placements.len() {
            return Err(RasterError::IncompatibleMosaic(format!(
                "{} images for {} placements",
                images.len(),
                layout.placements.len()
            )));
        }

        let mut present = images.iter().flatten();
        let Some(first) = present.next() else {
            return Err(RasterError::IncompatibleMosaic(
                "no images to compose".to_string(),
            ));
        };
        let (encoding, bands) = (first.encoding(), first.bands());
        if let Some(other) = present.find(|i| i.encoding() != encoding || i.bands() != bands) {
            return Err(RasterError::IncompatibleMosaic(format!(
                "{} bands of {:?} do not match {} bands of {:?}",
                other.bands(),
                other.encoding(),
                bands,
                encoding
            )));
        }

        let mut out = PixelBuffer::new(layout.width, layout.height, bands, encoding, fill);
        let canvas = PixelRect::new(0, 0, layout.width as i64, layout.height as i64);

        for (placement, image) in layout.placements.iter().zip(images) {
            let (Some(placement), Some(image)) = (placement, image) else {
                continue;
            };
            if placement.is_empty() {
                continue;
            }

            let resampled;
            let source = if (image.width() as i64, image.height() as i64)
                == (placement.width, placement.height)
            {
                image
            } else {
                resampled = image.resample(placement.width as u32, placement.height as u32);
                &resampled
            };

            let visible = placement.intersection(&canvas);
            if visible.is_empty() {
                continue;
            }
            for band in 0..bands {
                for y in visible.y..visible.max_y() {
                    for x in visible.x..visible.max_x() {
                        let value = source.sample(
                            band,
                            (x - placement.x) as u32,
                            (y - placement.y) as u32,
                        );
                        if value != fill {
                            out.set_sample(band, x as u32, y as u32, value);
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}
