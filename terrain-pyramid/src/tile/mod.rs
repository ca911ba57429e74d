//! Tiles and tile identity.
//!
//! A tile is one cell of a level's grid for one channel. Its identity is the
//! `(level, x, y)` grid position plus the world bounding box, and its file
//! name is derived purely from that bbox (see [`tile_id`]).

mod naming;

pub use naming::{parse_tile_id, same_tile, tile_id, TileIdError};

use serde::{Deserialize, Serialize};

use crate::extent::{BBox, Extent};
use crate::raster::{Grid, HeightStats, Sample};

/// Grid position of a tile within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// East neighbour position.
    pub fn east(&self) -> TileKey {
        TileKey::new(self.level, self.x + 1, self.y)
    }

    /// South neighbour position.
    pub fn south(&self) -> TileKey {
        TileKey::new(self.level, self.x, self.y + 1)
    }
}

/// One extracted tile.
#[derive(Debug, Clone)]
pub struct Tile<T> {
    pub key: TileKey,
    /// World-space bounds shared by every channel at this grid position.
    pub extent: Extent,
    pub pixels: Grid<T>,
}

impl<T: Sample> Tile<T> {
    pub fn bbox(&self) -> BBox {
        self.extent.to_bbox()
    }

    /// File stem for this tile.
    pub fn id(&self) -> String {
        tile_id(&self.bbox())
    }
}

/// What the builder knows about a written elevation tile.
///
/// Joined with the files found on disk when the manifest is emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSummary {
    pub key: TileKey,
    pub bbox: BBox,
    /// Statistics in world heights; `None` for placeholder tiles.
    pub stats: Option<HeightStats>,
    /// False when the tile had no valid samples and holds a placeholder.
    pub valid: bool,
}
