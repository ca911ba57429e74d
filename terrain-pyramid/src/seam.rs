//! Edge reconciliation between neighbouring elevation tiles.
//!
//! Each tile's rightmost columns are copied onto its east neighbour's leftmost
//! columns, and its bottom rows onto its south neighbour's top rows. Tiles are
//! visited in row-major order, so a tile has already received its north and
//! west edges before it propagates its own. After patching, adjacent tiles
//! share identical edge samples and the renderer sees no cracks.
//!
//! Color tiles are never patched.

use std::collections::HashMap;

use tracing::debug;

use crate::tile::{Tile, TileKey};

/// Outcome of patching one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeamStats {
    /// East edges copied.
    pub east_edges: usize,
    /// South edges copied.
    pub south_edges: usize,
    /// Neighbour lookups that found no tile.
    pub missing_neighbours: usize,
}

/// Make neighbouring tiles of one level share their edges.
///
/// `overlap_px` columns/rows are copied per edge, clamped to the tile size.
/// Missing neighbours (partial grids) are skipped.
pub fn patch_borders(tiles: &mut [Tile<f32>], overlap_px: u32) -> SeamStats {
    let mut stats = SeamStats::default();
    if overlap_px == 0 || tiles.is_empty() {
        return stats;
    }

    let index: HashMap<TileKey, usize> = tiles
        .iter()
        .enumerate()
        .map(|(i, tile)| (tile.key, i))
        .collect();

    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.sort_by_key(|&i| (tiles[i].key.y, tiles[i].key.x));

    for i in order {
        let key = tiles[i].key;

        match index.get(&key.east()) {
            Some(&east) => {
                let src = &tiles[i].pixels;
                let overlap = overlap_px.min(src.width());
                let columns: Vec<Vec<f32>> = (src.width() - overlap..src.width())
                    .map(|x| src.column(x))
                    .collect();
                let dst = &mut tiles[east].pixels;
                for (offset, column) in columns.iter().enumerate() {
                    if (offset as u32) < dst.width() {
                        dst.set_column(offset as u32, column);
                    }
                }
                stats.east_edges += 1;
            }
            None => stats.missing_neighbours += 1,
        }

        match index.get(&key.south()) {
            Some(&south) => {
                let src = &tiles[i].pixels;
                let overlap = overlap_px.min(src.height());
                let rows: Vec<Vec<f32>> = (src.height() - overlap..src.height())
                    .map(|y| src.row(y).to_vec())
                    .collect();
                let dst = &mut tiles[south].pixels;
                for (offset, row) in rows.iter().enumerate() {
                    if (offset as u32) < dst.height() {
                        dst.set_row(offset as u32, row);
                    }
                }
                stats.south_edges += 1;
            }
            None => stats.missing_neighbours += 1,
        }
    }

    debug!(
        east_edges = stats.east_edges,
        south_edges = stats.south_edges,
        missing = stats.missing_neighbours,
        "Patched tile seams"
    );
    stats
}
