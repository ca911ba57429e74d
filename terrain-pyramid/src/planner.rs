//! Pyramid depth and crop planning.
//!
//! The pyramid is a quadtree: level 0 is a single notional root tile covering
//! the whole cropped square, and every finer level doubles the tiles per axis.
//! For the grid to be exact at every level the cropped side must be a
//! multiple of `tile_px × 2^(levels-1)`.
//!
//! ```text
//! level 0 (root, never written)   1×1
//! level 1                         2×2
//! level 2                         4×4
//! ...
//! level levels-1 (finest)         2^(levels-1) × 2^(levels-1), tile_px windows
//! ```

use std::ops::Range;

use crate::error::{PyramidError, PyramidResult};

/// Deepest pyramid this planner will produce.
///
/// 2^31 tiles per axis is far beyond any raster that fits in memory; the cap
/// keeps the shift arithmetic in range.
pub const MAX_LEVELS: u32 = 31;

/// Number of levels such that the coarsest level is exactly one tile.
///
/// `levels = floor(log2(min(width, height) / tile_px)) + 1`
///
/// # Errors
///
/// Returns a configuration error if `tile_px` is zero or the mosaic is smaller
/// than one tile.
pub fn decide_pyramid_depth(width_px: u32, height_px: u32, tile_px: u32) -> PyramidResult<u32> {
    if tile_px == 0 {
        return Err(PyramidError::config("tile size must be greater than zero"));
    }
    let min_side = width_px.min(height_px);
    if min_side < tile_px {
        return Err(PyramidError::config(format!(
            "mosaic {}x{} px is smaller than one {} px tile",
            width_px, height_px, tile_px
        )));
    }
    // Integer floor(log2(min_side / tile_px)), exact for every input.
    let tiles = min_side / tile_px;
    Ok(tiles.ilog2() + 1)
}

/// Side of the largest square, anchored top-left, that divides evenly into
/// the tile grid at every level.
///
/// # Errors
///
/// Returns a configuration error if `levels` is zero or out of range, or if
/// cropping collapses either dimension to zero.
pub fn crop_size(levels: u32, tile_px: u32, width_px: u32, height_px: u32) -> PyramidResult<u32> {
    if levels == 0 {
        return Err(PyramidError::config("pyramid must have at least one level"));
    }
    if levels > MAX_LEVELS {
        return Err(PyramidError::config(format!(
            "{} levels exceeds the maximum of {}",
            levels, MAX_LEVELS
        )));
    }
    let base = (tile_px as u64) << (levels - 1);
    if base == 0 {
        return Err(PyramidError::config("tile size must be greater than zero"));
    }
    let width_crop = (width_px as u64 / base) * base;
    let height_crop = (height_px as u64 / base) * base;
    if width_crop == 0 || height_crop == 0 {
        return Err(PyramidError::config(format!(
            "cropping {}x{} px to multiples of {} px leaves nothing; reduce levels or tile size",
            width_px, height_px, base
        )));
    }
    // base <= u32 dimensions here, so the minimum fits in u32.
    Ok(width_crop.min(height_crop) as u32)
}

/// Geometry of one pyramid level over the cropped square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGeometry {
    /// Level index counted from the root.
    pub level: u32,
    /// Tiles along each axis (`2^level`).
    pub tiles_per_axis: u32,
    /// Side of each tile's window in cropped-mosaic pixels.
    pub window_px: u32,
}

impl LevelGeometry {
    /// Total number of tiles at this level.
    pub fn tile_count(&self) -> u64 {
        self.tiles_per_axis as u64 * self.tiles_per_axis as u64
    }

    /// Iterate grid positions in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.tiles_per_axis;
        (0..n).flat_map(move |y| (0..n).map(move |x| (x, y)))
    }
}

/// Resolved pyramid plan for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidPlan {
    /// Pyramid depth including the unmaterialized root.
    pub levels: u32,
    /// Canonical on-disk tile size in pixels.
    pub tile_px: u32,
    /// Side of the cropped square in elevation pixels.
    pub side_px: u32,
}

impl PyramidPlan {
    /// Plan a pyramid for a mosaic of `width_px × height_px`.
    ///
    /// `max_levels` replaces the computed depth when set.
    pub fn new(
        width_px: u32,
        height_px: u32,
        tile_px: u32,
        max_levels: Option<u32>,
    ) -> PyramidResult<Self> {
        let levels = match max_levels {
            Some(0) => return Err(PyramidError::config("level override must be at least 1")),
            Some(levels) => levels,
            None => decide_pyramid_depth(width_px, height_px, tile_px)?,
        };
        let side_px = crop_size(levels, tile_px, width_px, height_px)?;
        Ok(Self {
            levels,
            tile_px,
            side_px,
        })
    }

    /// Levels that produce tile files. Level 0 is the quadtree root and is
    /// never written.
    pub fn materialized_levels(&self) -> Range<u32> {
        1..self.levels
    }

    /// Geometry of `level`.
    pub fn level(&self, level: u32) -> LevelGeometry {
        let tiles_per_axis = 1u32 << level;
        LevelGeometry {
            level,
            tiles_per_axis,
            window_px: self.side_px / tiles_per_axis,
        }
    }
}
