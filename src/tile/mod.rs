//! Tile transport and decoding.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              TileAssembler              │
//! └────────────────────┬────────────────────┘
//!                      │ DecodedTile
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileReader                │
//! │  length checks, mask split, bit depth   │
//! └────────────────────┬────────────────────┘
//!                      │ RawTile
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        TileSession (SessionGuard)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileFetch`]: the tile rectangle, level and bands one session delivers
//! - [`TileSession`]: sequential transport of [`RawTile`]s
//! - [`SessionGuard`]: closes a session on every exit path
//! - [`TileReader`]: validates payload lengths and splits off validity masks
//! - [`PackedSamples`]: per-sample access to 1, 2 and 4-bit tiles

mod packed;
mod reader;
mod session;

pub use packed::{read_packed, read_sample, write_packed, write_sample, PackedSamples};
pub use reader::{DecodedTile, TileData, TileReader};
pub use session::{RawTile, SessionGuard, TileFetch, TileSession};
