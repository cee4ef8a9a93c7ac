//! Tile-fetch sessions.
//!
//! A session streams the raw tiles of one [`TileFetch`] in a fixed order:
//! row-major over the tile rectangle, and for each tile the requested bands in
//! request order. Sessions are single-use and must be closed on every exit
//! path; [`SessionGuard`] does that on drop.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::IoError;
use crate::geo::PixelRect;

/// What to fetch: a rectangle of tile indices at one level, for some bands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFetch {
    pub raster_id: String,
    pub level: usize,
    pub bands: Vec<usize>,

    /// Tile indices (column = x, row = y), exclusive far edge
    pub tiles: PixelRect,
}

impl TileFetch {
    /// Whether the session may deliver this tile.
    pub fn covers(&self, band: usize, column: u32, row: u32) -> bool {
        let (column, row) = (column as i64, row as i64);
        self.bands.contains(&band)
            && column >= self.tiles.x
            && column < self.tiles.max_x()
            && row >= self.tiles.y
            && row < self.tiles.max_y()
    }

    /// Total number of raw tiles a complete session yields.
    pub fn tile_count(&self) -> usize {
        self.tiles.area() as usize * self.bands.len()
    }

    /// Tiles in delivery order: `(band, column, row)`.
    pub fn delivery_order(&self) -> impl Iterator<Item = (usize, u32, u32)> + '_ {
        let tiles = self.tiles;
        (tiles.y..tiles.max_y()).flat_map(move |row| {
            (tiles.x..tiles.max_x()).flat_map(move |column| {
                self.bands
                    .iter()
                    .map(move |&band| (band, column as u32, row as u32))
            })
        })
    }
}

/// One tile as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTile {
    pub band: usize,
    pub column: u32,
    pub row: u32,

    /// Payload: sample data, optionally followed by a 1-bit validity mask.
    /// `None` when the store has no data for this tile.
    pub bytes: Option<Bytes>,

    /// Length of the sample data as declared by the transport, when known
    pub declared_len: Option<usize>,
}

impl RawTile {
    /// A tile the store has no data for.
    pub fn missing(band: usize, column: u32, row: u32) -> Self {
        Self {
            band,
            column,
            row,
            bytes: None,
            declared_len: None,
        }
    }
}

/// A sequential stream of raw tiles.
#[async_trait]
pub trait TileSession: Send {
    /// Next tile, or `None` once the fetch is exhausted.
    async fn next_tile(&mut self) -> Result<Option<RawTile>, IoError>;

    /// Release transport resources. Called exactly once.
    fn close(&mut self);
}

/// Owns a session and closes it when dropped.
pub struct SessionGuard<S: TileSession> {
    session: S,
    closed: bool,
}

impl<S: TileSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub async fn next_tile(&mut self) -> Result<Option<RawTile>, IoError> {
        if self.closed {
            return Ok(None);
        }
        self.session.next_tile().await
    }

    /// Close now rather than at drop.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.session.close();
            debug!("Tile session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: TileSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.close();
    }
}
